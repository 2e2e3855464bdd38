use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use screener_core::query::QueryParams;
use screener_core::{RawScreenerQuery, ScreenerPage};

use crate::AppState;

pub fn screener_routes() -> Router<AppState> {
    Router::new().route("/api/screener", get(get_screener))
}

/// `GET /api/screener`
///
/// Never fails: an unusable query string is treated as empty and provider
/// trouble is answered with the fallback table, tagged `"source": "fallback"`.
async fn get_screener(
    State(state): State<AppState>,
    query: Result<Query<RawScreenerQuery>, QueryRejection>,
) -> Json<ScreenerPage> {
    let raw = match query {
        Ok(Query(raw)) => raw,
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable screener query, using defaults");
            RawScreenerQuery::default()
        }
    };

    let params = QueryParams::from_raw(&raw);
    tracing::info!(
        page = params.page,
        page_size = params.page_size,
        sort_by = params.filters.sort_by.as_str(),
        sort_dir = params.filters.sort_dir.as_str(),
        "Screener query"
    );

    Json(state.service.screen(&params).await)
}
