//! Local filter / sort / paginate pass applied to every candidate list,
//! whether it came from the provider or the fallback table.

use std::cmp::Ordering;

use crate::query::{QueryParams, ScreenerFilters};
use crate::{ScreenerRow, SortBy, SortDir};

// ---------------------------------------------------------------------------
// Filter evaluation
// ---------------------------------------------------------------------------

/// A bound on a column is only satisfied by a known value inside it.
fn within(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(v) = value else {
        return false;
    };
    min.map_or(true, |lo| v >= lo) && max.map_or(true, |hi| v <= hi)
}

pub fn matches_filters(row: &ScreenerRow, filters: &ScreenerFilters) -> bool {
    let needle = filters.search_needle();
    if !needle.is_empty() {
        let in_symbol = row.symbol.to_uppercase().contains(&needle);
        let in_name = row
            .company_name
            .as_deref()
            .is_some_and(|n| n.to_uppercase().contains(&needle));
        if !in_symbol && !in_name {
            return false;
        }
    }

    if let Some(sector) = &filters.sector {
        if row.sector.as_deref() != Some(sector.as_str()) {
            return false;
        }
    }

    within(row.market_cap, filters.min_market_cap, filters.max_market_cap)
        && within(row.pe, filters.min_pe, filters.max_pe)
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

enum SortValue<'a> {
    Num(f64),
    Text(&'a str),
}

fn sort_value(row: &ScreenerRow, by: SortBy) -> Option<SortValue<'_>> {
    match by {
        SortBy::Symbol => Some(SortValue::Text(&row.symbol)),
        SortBy::CompanyName => row.company_name.as_deref().map(SortValue::Text),
        SortBy::Price => row.price.map(SortValue::Num),
        SortBy::MarketCap => row.market_cap.map(SortValue::Num),
        SortBy::Pe => row.pe.map(SortValue::Num),
        SortBy::RoeTtm => row.roe_ttm.map(SortValue::Num),
        SortBy::DebtToEquityTtm => row.debt_to_equity_ttm.map(SortValue::Num),
    }
}

fn compare_rows(a: &ScreenerRow, b: &ScreenerRow, by: SortBy, dir: SortDir) -> Ordering {
    let cmp = match (sort_value(a, by), sort_value(b, by)) {
        (None, None) => return Ordering::Equal,
        // Unknown values go last in both directions.
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(SortValue::Num(x)), Some(SortValue::Num(y))) => {
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(SortValue::Text(x)), Some(SortValue::Text(y))) => x.cmp(y),
        (Some(SortValue::Num(_)), Some(SortValue::Text(_)))
        | (Some(SortValue::Text(_)), Some(SortValue::Num(_))) => Ordering::Equal,
    };
    match dir {
        SortDir::Asc => cmp,
        SortDir::Desc => cmp.reverse(),
    }
}

/// Stable sort; rows with an unknown sort key keep their relative order at
/// the end.
pub fn sort_rows(rows: &mut [ScreenerRow], by: SortBy, dir: SortDir) {
    rows.sort_by(|a, b| compare_rows(a, b, by, dir));
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Rows `[offset, offset + page_size)`, empty past the end.
pub fn paginate(rows: Vec<ScreenerRow>, params: &QueryParams) -> Vec<ScreenerRow> {
    rows.into_iter()
        .skip(params.offset())
        .take(params.page_size as usize)
        .collect()
}

/// Filter, sort and slice `rows`. Returns the filtered total with the page.
pub fn apply(mut rows: Vec<ScreenerRow>, params: &QueryParams) -> (usize, Vec<ScreenerRow>) {
    rows.retain(|row| matches_filters(row, &params.filters));
    sort_rows(&mut rows, params.filters.sort_by, params.filters.sort_dir);
    let total = rows.len();
    (total, paginate(rows, params))
}
