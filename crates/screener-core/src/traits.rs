use async_trait::async_trait;

use crate::{HistoryPoint, HistoryRange, KeyMetrics, ProviderError, ProviderQuery, ScreenerRow};

/// Source of screener candidates, trailing metrics and price history.
///
/// Implemented by the FMP HTTP client; tests substitute in-memory fakes.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Bulk screener query. Rows come back with enrichment fields unset.
    async fn screen(&self, query: &ProviderQuery) -> Result<Vec<ScreenerRow>, ProviderError>;

    /// Trailing-twelve-month ratios for a single symbol.
    async fn key_metrics_ttm(&self, symbol: &str) -> Result<KeyMetrics, ProviderError>;

    /// Daily closes for `symbol` covering `range`, in any order.
    async fn price_history(
        &self,
        symbol: &str,
        range: HistoryRange,
    ) -> Result<Vec<HistoryPoint>, ProviderError>;

    fn provider_name(&self) -> &'static str;
}
