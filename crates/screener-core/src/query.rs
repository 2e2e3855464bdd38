//! Request parameters for the screener: lenient parsing of the raw URL query,
//! the normalized [`QueryParams`], and the [`ProviderQuery`] handed upstream.

use serde::{Deserialize, Serialize};

use crate::{HistoryRange, SortBy, SortDir, ALL_SECTORS};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MIN_PAGE_SIZE: u32 = 5;
pub const MAX_PAGE_SIZE: u32 = 50;
/// Candidate rows requested from the provider per screener call.
pub const PROVIDER_LIMIT: u32 = 200;
pub const DEFAULT_HISTORY_SYMBOL: &str = "AAPL";

/// Screener query string exactly as received. Every field is optional and
/// unparseable values are ignored rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawScreenerQuery {
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
    pub sector: Option<String>,
    #[serde(rename = "minMarketCap")]
    pub min_market_cap: Option<String>,
    #[serde(rename = "maxMarketCap")]
    pub max_market_cap: Option<String>,
    #[serde(rename = "minPE")]
    pub min_pe: Option<String>,
    #[serde(rename = "maxPE")]
    pub max_pe: Option<String>,
    pub search: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortDir")]
    pub sort_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHistoryQuery {
    pub symbol: Option<String>,
    pub range: Option<String>,
}

impl RawHistoryQuery {
    /// Uppercased symbol (default `AAPL`) and range (default one year).
    pub fn normalize(&self) -> (String, HistoryRange) {
        let symbol = self
            .symbol
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_HISTORY_SYMBOL)
            .to_uppercase();
        let range = self
            .range
            .as_deref()
            .map(HistoryRange::parse_lenient)
            .unwrap_or_default();
        (symbol, range)
    }
}

/// Everything a user can set on the screener except the page position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenerFilters {
    #[serde(default)]
    pub search: String,
    /// `None` means all sectors.
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub min_market_cap: Option<f64>,
    #[serde(default)]
    pub max_market_cap: Option<f64>,
    #[serde(default, rename = "minPE")]
    pub min_pe: Option<f64>,
    #[serde(default, rename = "maxPE")]
    pub max_pe: Option<f64>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_dir: SortDir,
}

impl ScreenerFilters {
    /// Trimmed, uppercased search needle; empty means no search.
    pub fn search_needle(&self) -> String {
        self.search.trim().to_uppercase()
    }
}

/// Normalized screener request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    pub page: u32,
    pub page_size: u32,
    #[serde(flatten)]
    pub filters: ScreenerFilters,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            filters: ScreenerFilters::default(),
        }
    }
}

impl QueryParams {
    pub fn from_raw(raw: &RawScreenerQuery) -> Self {
        let page = parse_number(raw.page.as_deref())
            .map(f64::trunc)
            .filter(|n| *n >= 1.0)
            .map(|n| n.min(u32::MAX as f64) as u32)
            .unwrap_or(1);

        // zero means unset; anything else, fractions included, is clamped
        // before truncation
        let page_size = parse_number(raw.page_size.as_deref())
            .filter(|n| *n != 0.0)
            .map(|n| n.clamp(MIN_PAGE_SIZE as f64, MAX_PAGE_SIZE as f64).trunc() as u32)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let filters = ScreenerFilters {
            search: raw.search.as_deref().unwrap_or_default().trim().to_string(),
            sector: normalize_sector(raw.sector.as_deref()),
            min_market_cap: parse_number(raw.min_market_cap.as_deref()),
            max_market_cap: parse_number(raw.max_market_cap.as_deref()),
            min_pe: parse_number(raw.min_pe.as_deref()),
            max_pe: parse_number(raw.max_pe.as_deref()),
            sort_by: raw
                .sort_by
                .as_deref()
                .and_then(SortBy::parse)
                .unwrap_or_default(),
            sort_dir: raw
                .sort_dir
                .as_deref()
                .map(SortDir::parse_lenient)
                .unwrap_or_default(),
        };

        Self {
            page,
            page_size,
            filters,
        }
    }

    /// Index range of this page within the full filtered list.
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1).saturating_mul(self.page_size as usize)
    }

    /// Query string pairs understood by the screener endpoint. Unset filters
    /// are omitted.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let f = &self.filters;
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if !f.search.trim().is_empty() {
            pairs.push(("search", f.search.trim().to_string()));
        }
        if let Some(sector) = &f.sector {
            pairs.push(("sector", sector.clone()));
        }
        let bounds = [
            ("minMarketCap", f.min_market_cap),
            ("maxMarketCap", f.max_market_cap),
            ("minPE", f.min_pe),
            ("maxPE", f.max_pe),
        ];
        for (key, value) in bounds {
            if let Some(v) = value {
                pairs.push((key, v.to_string()));
            }
        }
        pairs.push(("sortBy", f.sort_by.as_str().to_string()));
        pairs.push(("sortDir", f.sort_dir.as_str().to_string()));
        pairs
    }
}

/// Provider-neutral screener request. Filters that the provider may not honor
/// exactly are re-applied locally afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderQuery {
    pub limit: u32,
    pub actively_trading: bool,
    pub sector: Option<String>,
    pub market_cap_more_than: Option<f64>,
    pub market_cap_lower_than: Option<f64>,
    pub pe_more_than: Option<f64>,
    pub pe_lower_than: Option<f64>,
}

impl ProviderQuery {
    pub fn from_filters(filters: &ScreenerFilters) -> Self {
        Self {
            limit: PROVIDER_LIMIT,
            actively_trading: true,
            sector: filters.sector.clone(),
            market_cap_more_than: filters.min_market_cap,
            market_cap_lower_than: filters.max_market_cap,
            pe_more_than: filters.min_pe,
            pe_lower_than: filters.max_pe,
        }
    }
}

/// Finite number or nothing. Blank strings count as absent.
pub fn parse_number(value: Option<&str>) -> Option<f64> {
    let v = value?.trim();
    if v.is_empty() {
        return None;
    }
    v.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// `None` for a missing, blank or `all` sector.
pub fn normalize_sector(value: Option<&str>) -> Option<String> {
    let v = value?.trim();
    if v.is_empty() || v.eq_ignore_ascii_case(ALL_SECTORS) {
        None
    } else {
        Some(v.to_string())
    }
}
