use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sectors offered by the screener's sector filter. Provider rows may carry
/// other sector names; those are kept verbatim.
pub const SECTORS: &[&str] = &[
    "Technology",
    "Communication Services",
    "Consumer Discretionary",
    "Financial Services",
    "Energy",
    "Healthcare",
    "Industrials",
    "Utilities",
];

/// Sector filter value meaning "every sector".
pub const ALL_SECTORS: &str = "all";

/// One tradable symbol in a screener result.
///
/// Every field except `symbol` is best-effort: `None` means "unknown", never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenerRow {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe: Option<f64>,
    /// Only populated for rows on the current page.
    #[serde(default, rename = "roeTTM")]
    pub roe_ttm: Option<f64>,
    #[serde(default, rename = "debtToEquityTTM")]
    pub debt_to_equity_ttm: Option<f64>,
}

impl ScreenerRow {
    /// Row with only the (uppercased) symbol known.
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            company_name: None,
            price: None,
            market_cap: None,
            sector: None,
            pe: None,
            roe_ttm: None,
            debt_to_equity_ttm: None,
        }
    }

    pub fn apply_metrics(&mut self, metrics: KeyMetrics) {
        self.roe_ttm = metrics.roe_ttm;
        self.debt_to_equity_ttm = metrics.debt_to_equity_ttm;
    }
}

/// Trailing ratios fetched per row during enrichment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
    pub roe_ttm: Option<f64>,
    pub debt_to_equity_ttm: Option<f64>,
}

/// Sortable screener columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortBy {
    #[serde(rename = "symbol")]
    Symbol,
    #[serde(rename = "companyName")]
    CompanyName,
    #[serde(rename = "price")]
    Price,
    #[default]
    #[serde(rename = "marketCap")]
    MarketCap,
    #[serde(rename = "pe")]
    Pe,
    #[serde(rename = "roeTTM")]
    RoeTtm,
    #[serde(rename = "debtToEquityTTM")]
    DebtToEquityTtm,
}

impl SortBy {
    pub const ALL: [SortBy; 7] = [
        SortBy::Symbol,
        SortBy::CompanyName,
        SortBy::Price,
        SortBy::MarketCap,
        SortBy::Pe,
        SortBy::RoeTtm,
        SortBy::DebtToEquityTtm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Symbol => "symbol",
            SortBy::CompanyName => "companyName",
            SortBy::Price => "price",
            SortBy::MarketCap => "marketCap",
            SortBy::Pe => "pe",
            SortBy::RoeTtm => "roeTTM",
            SortBy::DebtToEquityTtm => "debtToEquityTTM",
        }
    }

    /// Exact wire name match; `None` for anything unrecognised.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value.trim())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }

    /// Anything other than a case-insensitive `asc` is descending.
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("asc") {
            SortDir::Asc
        } else {
            SortDir::Desc
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }
}

/// Coarse history window requested by the chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryRange {
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "5y")]
    FiveYears,
}

impl HistoryRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryRange::OneMonth => "1m",
            HistoryRange::ThreeMonths => "3m",
            HistoryRange::OneYear => "1y",
            HistoryRange::FiveYears => "5y",
        }
    }

    /// Unknown tokens select the one-year window.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim() {
            "1m" => HistoryRange::OneMonth,
            "3m" => HistoryRange::ThreeMonths,
            "5y" => HistoryRange::FiveYears,
            _ => HistoryRange::OneYear,
        }
    }

    /// Days looked back from today; a series has `trading_days() + 1` points.
    pub fn trading_days(&self) -> u32 {
        match self {
            HistoryRange::OneMonth => 22,
            HistoryRange::ThreeMonths => 66,
            HistoryRange::OneYear => 252,
            HistoryRange::FiveYears => 252 * 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Provenance of a response: straight from the provider, or substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Fallback,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Live => "live",
            DataSource::Fallback => "fallback",
        }
    }
}

/// A value tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Sourced<T> {
    Live(T),
    Fallback(T),
}

impl<T> Sourced<T> {
    pub fn source(&self) -> DataSource {
        match self {
            Sourced::Live(_) => DataSource::Live,
            Sourced::Fallback(_) => DataSource::Fallback,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Sourced::Live(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Sourced::Live(v) | Sourced::Fallback(v) => v,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        match self {
            Sourced::Live(v) => Sourced::Live(f(v)),
            Sourced::Fallback(v) => Sourced::Fallback(f(v)),
        }
    }
}

/// One page of screener results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenerPage {
    /// Row count after filtering, before pagination.
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
    pub source: DataSource,
    pub data: Vec<ScreenerRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub symbol: String,
    pub source: DataSource,
    pub data: Vec<HistoryPoint>,
}
