use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use screener_core::query::RawHistoryQuery;
use screener_core::HistoryResponse;

use crate::AppState;

pub fn history_routes() -> Router<AppState> {
    Router::new().route("/api/history", get(get_history))
}

/// `GET /api/history?symbol=&range=`
///
/// Symbol defaults to AAPL and range to `1y`. Without a working provider the
/// series is a deterministic synthetic walk.
async fn get_history(
    State(state): State<AppState>,
    query: Result<Query<RawHistoryQuery>, QueryRejection>,
) -> Json<HistoryResponse> {
    let raw = query.map(|Query(q)| q).unwrap_or_default();
    let (symbol, range) = raw.normalize();

    tracing::info!(symbol = %symbol, range = range.as_str(), "History query");

    Json(state.service.history(&symbol, range).await)
}
