use crate::ScreenerRow;

// symbol, company, price, market cap, sector, P/E, ROE (TTM), debt/equity (TTM)
const FALLBACK_TABLE: &[(&str, &str, f64, f64, &str, f64, f64, f64)] = &[
    ("AAPL", "Apple Inc.", 190.1, 2_950_000_000_000.0, "Technology", 32.3, 0.77, 1.7),
    ("MSFT", "Microsoft Corp.", 425.4, 3_100_000_000_000.0, "Technology", 35.1, 0.44, 0.6),
    ("GOOGL", "Alphabet Inc. Class A", 170.2, 2_150_000_000_000.0, "Communication Services", 26.4, 0.29, 0.1),
    ("AMZN", "Amazon.com, Inc.", 182.9, 1_900_000_000_000.0, "Consumer Discretionary", 52.6, 0.22, 0.9),
    ("META", "Meta Platforms, Inc.", 510.3, 1_300_000_000_000.0, "Communication Services", 28.2, 0.32, 0.2),
    ("TSLA", "Tesla, Inc.", 190.4, 600_000_000_000.0, "Consumer Discretionary", 74.5, 0.17, 0.4),
    ("NVDA", "NVIDIA Corporation", 120.3, 2_900_000_000_000.0, "Technology", 70.1, 0.56, 0.9),
    ("NFLX", "Netflix, Inc.", 640.2, 280_000_000_000.0, "Communication Services", 45.3, 0.30, 0.8),
    ("JPM", "JPMorgan Chase & Co.", 200.1, 580_000_000_000.0, "Financial Services", 12.2, 0.16, 1.8),
    ("XOM", "Exxon Mobil Corporation", 120.5, 480_000_000_000.0, "Energy", 13.9, 0.19, 0.2),
];

/// Static rows served when the provider is unconfigured or unavailable.
pub fn fallback_rows() -> Vec<ScreenerRow> {
    FALLBACK_TABLE
        .iter()
        .map(|&(symbol, name, price, market_cap, sector, pe, roe, dte)| ScreenerRow {
            symbol: symbol.to_string(),
            company_name: Some(name.to_string()),
            price: Some(price),
            market_cap: Some(market_cap),
            sector: Some(sector.to_string()),
            pe: Some(pe),
            roe_ttm: Some(roe),
            debt_to_equity_ttm: Some(dte),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fallback_rows_are_complete() {
        let rows = fallback_rows();
        assert_eq!(rows.len(), 10);
        let symbols: HashSet<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols.len(), 10);
        for r in &rows {
            assert_eq!(r.symbol, r.symbol.to_uppercase());
            assert!(r.market_cap.is_some() && r.pe.is_some() && r.roe_ttm.is_some());
        }
    }
}
