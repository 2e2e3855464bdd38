//! `stockvision`: terminal front-end for the StockVision screener API.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use screener_client::format;
use screener_client::{
    HttpScreenerApi, LoadStatus, PresetData, PresetStore, ScreenerController, ScreenerView,
};
use screener_core::query::{normalize_sector, QueryParams};
use screener_core::{HistoryRange, SortBy, SortDir, SECTORS};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stockvision", about = "StockVision stock screener")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the screener and print one page.
    Screen {
        /// Substring matched against symbol and company name.
        #[arg(long)]
        search: Option<String>,

        /// Sector name, or "all".
        #[arg(long)]
        sector: Option<String>,

        #[arg(long)]
        min_market_cap: Option<f64>,

        #[arg(long)]
        max_market_cap: Option<f64>,

        #[arg(long)]
        min_pe: Option<f64>,

        #[arg(long)]
        max_pe: Option<f64>,

        /// symbol, companyName, price, marketCap, pe, roeTTM or debtToEquityTTM.
        #[arg(long, value_parser = parse_sort_by)]
        sort_by: Option<SortBy>,

        /// asc or desc.
        #[arg(long)]
        sort_dir: Option<String>,

        #[arg(long)]
        page: Option<u32>,

        /// One of 10, 20, 30, 50.
        #[arg(long)]
        page_size: Option<u32>,

        /// Start from a saved preset; other flags override it.
        #[arg(long)]
        preset: Option<String>,

        /// Save the resulting filters under this name.
        #[arg(long)]
        save_preset: Option<String>,
    },
    /// List saved presets.
    Presets,
    /// Print a price history summary for a symbol.
    History {
        symbol: String,

        /// 1m, 3m, 1y or 5y.
        #[arg(long, default_value = "1y")]
        range: String,
    },
}

fn parse_sort_by(value: &str) -> std::result::Result<SortBy, String> {
    SortBy::parse(value).ok_or_else(|| {
        let names: Vec<&str> = SortBy::ALL.iter().map(|s| s.as_str()).collect();
        format!("expected one of {}", names.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = PresetStore::from_env();

    match cli.command {
        Commands::Screen {
            search,
            sector,
            min_market_cap,
            max_market_cap,
            min_pe,
            max_pe,
            sort_by,
            sort_dir,
            page,
            page_size,
            preset,
            save_preset,
        } => {
            let mut params = match preset {
                Some(name) => match store.get(&name) {
                    Some(p) => p.data.to_params(),
                    None => bail!("No preset named '{}'", name.trim()),
                },
                None => QueryParams::default(),
            };

            let filters = &mut params.filters;
            if let Some(s) = search {
                filters.search = s;
            }
            if sector.is_some() {
                filters.sector = normalize_sector(sector.as_deref());
                if let Some(s) = filters.sector.as_deref().filter(|s| !SECTORS.contains(s)) {
                    eprintln!("note: '{}' is not one of: {}", s, SECTORS.join(", "));
                }
            }
            filters.min_market_cap = min_market_cap.or(filters.min_market_cap);
            filters.max_market_cap = max_market_cap.or(filters.max_market_cap);
            filters.min_pe = min_pe.or(filters.min_pe);
            filters.max_pe = max_pe.or(filters.max_pe);
            if let Some(by) = sort_by {
                filters.sort_by = by;
            }
            if let Some(dir) = sort_dir {
                filters.sort_dir = SortDir::parse_lenient(&dir);
            }
            if let Some(size) = page_size {
                params.page_size = size;
            }

            if let Some(name) = save_preset {
                store.save(&name, PresetData::from_params(&params))?;
                println!("Saved preset '{}' to {}", name.trim(), store.path().display());
            }

            let mut view = ScreenerView::new(QueryParams { page: 1, ..params });
            // normalizes the page size
            view.set_page_size(view.params().page_size);
            let ctrl = ScreenerController::new(Arc::new(HttpScreenerApi::from_env()), view);

            // page bounds are only known once the first page arrives
            let mut status = ctrl.refresh().await;
            if let Some(target) = page.filter(|p| *p > 1) {
                if status == LoadStatus::Loaded {
                    status = ctrl
                        .update(|v| {
                            v.set_page(target);
                        })
                        .await;
                }
            }

            if let LoadStatus::Error(message) = status {
                bail!(message);
            }
            print_page(&ctrl.snapshot().await);
        }
        Commands::Presets => {
            let presets = store.load();
            if presets.is_empty() {
                println!("No saved presets ({})", store.path().display());
            }
            for p in presets {
                let f = &p.data.filters;
                println!(
                    "{:<20} sector={} search={:?} sort={} {} pageSize={}",
                    p.name,
                    f.sector.as_deref().unwrap_or("all"),
                    f.search,
                    f.sort_by.as_str(),
                    f.sort_dir.as_str(),
                    p.data.page_size
                );
            }
        }
        Commands::History { symbol, range } => {
            let range = HistoryRange::parse_lenient(&range);
            let ctrl = ScreenerController::new(
                Arc::new(HttpScreenerApi::from_env()),
                ScreenerView::default(),
            );
            ctrl.select_symbol(&symbol, range).await;
            let panel = ctrl.history_settled().await;

            if let LoadStatus::Error(message) = panel.status {
                bail!(message);
            }
            let (Some(first), Some(last)) = (panel.data.first(), panel.data.last()) else {
                println!("No history for {}", symbol.to_uppercase());
                return Ok(());
            };

            let low = panel.data.iter().map(|p| p.close).fold(f64::INFINITY, f64::min);
            let high = panel.data.iter().map(|p| p.close).fold(f64::NEG_INFINITY, f64::max);
            let change = if first.close != 0.0 {
                (last.close - first.close) / first.close
            } else {
                0.0
            };

            println!(
                "{} ({}) {} points, source: {}",
                panel.symbol.as_deref().unwrap_or_default(),
                range.as_str(),
                panel.data.len(),
                panel.source.map(|s| s.as_str()).unwrap_or("-")
            );
            println!("  {}  {}", first.date, format::currency(Some(first.close)));
            println!("  {}  {}", last.date, format::currency(Some(last.close)));
            println!(
                "  low {}  high {}  change {}",
                format::currency(Some(low)),
                format::currency(Some(high)),
                format::percent(Some(change))
            );
        }
    }

    Ok(())
}

fn print_page(view: &ScreenerView) {
    let header = [
        "Symbol",
        "Company",
        "Price",
        "Market Cap",
        "Sector",
        "P/E",
        "ROE (TTM)",
        "Debt/Equity (TTM)",
    ];
    let rows: Vec<[String; 8]> = view
        .rows()
        .iter()
        .map(|r| {
            [
                r.symbol.clone(),
                format::text(r.company_name.as_deref()),
                format::currency(r.price),
                format::market_cap(r.market_cap),
                format::text(r.sector.as_deref()),
                format::number(r.pe),
                format::percent(r.roe_ttm),
                format::ratio(r.debt_to_equity_ttm),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{:<w$}", c, w = w))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", line(header.to_vec()));
    if rows.is_empty() {
        println!("No results");
    }
    for row in &rows {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
    println!(
        "Page {} of {} • {} results ({} data)",
        view.page(),
        view.pages(),
        view.total(),
        view.source().map(|s| s.as_str()).unwrap_or("-")
    );
}
