use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::fallback::fallback_rows;
use crate::history::{normalize_history, synthetic_history};
use crate::pipeline;
use crate::query::{ProviderQuery, QueryParams};
use crate::{
    HistoryRange, HistoryResponse, MarketDataProvider, ScreenerPage, ScreenerRow, Sourced,
};

/// Bounds on the per-row enrichment fan-out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrichmentConfig {
    /// Maximum provider calls in flight for one page.
    pub concurrency: usize,
    /// Per-call cut-off; a slow row ends up with null ratios.
    pub timeout: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Screener aggregation: provider (or fallback) candidates, local
/// filter/sort/paginate, then enrichment of the visible page.
#[derive(Clone)]
pub struct ScreenerService {
    provider: Option<Arc<dyn MarketDataProvider>>,
    enrichment: EnrichmentConfig,
}

impl ScreenerService {
    pub fn new(provider: Option<Arc<dyn MarketDataProvider>>, enrichment: EnrichmentConfig) -> Self {
        Self {
            provider,
            enrichment: EnrichmentConfig {
                concurrency: enrichment.concurrency.max(1),
                ..enrichment
            },
        }
    }

    /// Service that always serves fallback data.
    pub fn offline() -> Self {
        Self::new(None, EnrichmentConfig::default())
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn screen(&self, params: &QueryParams) -> ScreenerPage {
        let candidates = self.candidates(params).await;
        let source = candidates.source();

        let (total, page_rows) = match candidates {
            Sourced::Live(rows) => {
                let (total, page_rows) = pipeline::apply(rows, params);
                (total, self.enrich(page_rows).await)
            }
            Sourced::Fallback(rows) => pipeline::apply(rows, params),
        };

        tracing::debug!(
            total,
            page = params.page,
            page_size = params.page_size,
            source = source.as_str(),
            "Screener page assembled"
        );

        ScreenerPage {
            total,
            page: params.page,
            page_size: params.page_size,
            source,
            data: page_rows,
        }
    }

    async fn candidates(&self, params: &QueryParams) -> Sourced<Vec<ScreenerRow>> {
        let Some(provider) = &self.provider else {
            return Sourced::Fallback(fallback_rows());
        };

        let query = ProviderQuery::from_filters(&params.filters);
        match provider.screen(&query).await {
            Ok(rows) if !rows.is_empty() => Sourced::Live(rows),
            Ok(_) => {
                tracing::info!(
                    provider = provider.provider_name(),
                    "Provider screener returned no rows, serving fallback data"
                );
                Sourced::Fallback(fallback_rows())
            }
            Err(e) => {
                tracing::warn!(
                    provider = provider.provider_name(),
                    error = %e,
                    "Provider screener failed, serving fallback data"
                );
                Sourced::Fallback(fallback_rows())
            }
        }
    }

    /// Fetch trailing ratios for each row, at most `concurrency` at a time.
    /// Row order is preserved; any failure nulls only that row's ratios.
    async fn enrich(&self, rows: Vec<ScreenerRow>) -> Vec<ScreenerRow> {
        let Some(provider) = &self.provider else {
            return rows;
        };
        if rows.is_empty() {
            return rows;
        }

        let semaphore = Arc::new(Semaphore::new(self.enrichment.concurrency));
        let timeout = self.enrichment.timeout;

        let tasks = rows.into_iter().map(|mut row| {
            let semaphore = Arc::clone(&semaphore);
            let provider = Arc::clone(provider);
            async move {
                let _permit = semaphore.acquire().await.ok();
                let metrics = match tokio::time::timeout(timeout, provider.key_metrics_ttm(&row.symbol)).await {
                    Ok(Ok(metrics)) => metrics,
                    Ok(Err(e)) => {
                        tracing::debug!(symbol = %row.symbol, error = %e, "Key metrics unavailable");
                        Default::default()
                    }
                    Err(_) => {
                        tracing::warn!(
                            symbol = %row.symbol,
                            timeout_ms = timeout.as_millis() as u64,
                            "Key metrics request timed out"
                        );
                        Default::default()
                    }
                };
                row.apply_metrics(metrics);
                row
            }
        });

        join_all(tasks).await
    }

    pub async fn history(&self, symbol: &str, range: HistoryRange) -> HistoryResponse {
        self.history_on(symbol, range, Utc::now().date_naive()).await
    }

    /// History ending on `today`; synthetic when the provider is missing or
    /// fails.
    pub async fn history_on(&self, symbol: &str, range: HistoryRange, today: NaiveDate) -> HistoryResponse {
        let series = match &self.provider {
            None => Sourced::Fallback(synthetic_history(symbol, range, today)),
            Some(provider) => match provider.price_history(symbol, range).await {
                Ok(points) => Sourced::Live(normalize_history(points)),
                Err(e) => {
                    tracing::warn!(
                        symbol,
                        range = range.as_str(),
                        error = %e,
                        "Provider history failed, serving synthetic series"
                    );
                    Sourced::Fallback(synthetic_history(symbol, range, today))
                }
            },
        };

        HistoryResponse {
            symbol: symbol.to_string(),
            source: series.source(),
            data: series.into_inner(),
        }
    }
}
