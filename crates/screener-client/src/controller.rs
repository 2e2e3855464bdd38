use screener_core::{DataSource, HistoryPoint, HistoryRange};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::api::ScreenerApi;
use crate::view::{LoadStatus, ScreenerView, LOAD_ERROR_MESSAGE};

/// Chart state for the selected symbol.
#[derive(Debug, Clone)]
pub struct HistoryPanel {
    pub symbol: Option<String>,
    pub range: HistoryRange,
    pub status: LoadStatus,
    pub source: Option<DataSource>,
    pub data: Vec<HistoryPoint>,
    generation: u64,
}

impl Default for HistoryPanel {
    fn default() -> Self {
        Self {
            symbol: None,
            range: HistoryRange::default(),
            status: LoadStatus::Idle,
            source: None,
            data: Vec::new(),
            generation: 0,
        }
    }
}

/// Drives a [`ScreenerView`] against a [`ScreenerApi`] and owns the
/// background history fetch for the selected symbol.
pub struct ScreenerController {
    api: Arc<dyn ScreenerApi>,
    view: RwLock<ScreenerView>,
    history: Arc<RwLock<HistoryPanel>>,
    history_task: Mutex<Option<JoinHandle<()>>>,
}

impl ScreenerController {
    pub fn new(api: Arc<dyn ScreenerApi>, view: ScreenerView) -> Self {
        Self {
            api,
            view: RwLock::new(view),
            history: Arc::new(RwLock::new(HistoryPanel::default())),
            history_task: Mutex::new(None),
        }
    }

    pub async fn snapshot(&self) -> ScreenerView {
        self.view.read().await.clone()
    }

    pub async fn history(&self) -> HistoryPanel {
        self.history.read().await.clone()
    }

    /// Re-queries the current params. Responses overtaken by a newer request
    /// are dropped by the view.
    pub async fn refresh(&self) -> LoadStatus {
        let (seq, params) = self.view.write().await.begin_request();
        let result = self.api.fetch_page(&params).await;

        let mut view = self.view.write().await;
        view.finish_request(seq, result);
        view.status().clone()
    }

    /// Applies a state change (filter, sort, page, preset) then refreshes.
    pub async fn update(&self, change: impl FnOnce(&mut ScreenerView)) -> LoadStatus {
        change(&mut *self.view.write().await);
        self.refresh().await
    }

    /// Starts loading `symbol`'s history, cancelling any fetch in flight.
    pub async fn select_symbol(&self, symbol: &str, range: HistoryRange) {
        let symbol = symbol.trim().to_uppercase();
        let mut task = self.history_task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let generation = {
            let mut panel = self.history.write().await;
            panel.generation += 1;
            panel.symbol = Some(symbol.clone());
            panel.range = range;
            panel.status = LoadStatus::Loading;
            panel.source = None;
            panel.data.clear();
            panel.generation
        };

        let api = Arc::clone(&self.api);
        let history = Arc::clone(&self.history);
        *task = Some(tokio::spawn(async move {
            let result = api.fetch_history(&symbol, range).await;

            let mut panel = history.write().await;
            if panel.generation != generation {
                return;
            }
            match result {
                Ok(resp) => {
                    panel.source = Some(resp.source);
                    panel.data = resp.data;
                    panel.status = LoadStatus::Loaded;
                }
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "History request failed");
                    panel.data.clear();
                    panel.status = LoadStatus::Error(LOAD_ERROR_MESSAGE.to_string());
                }
            }
        }));
    }

    /// Cancels any history fetch and empties the chart.
    pub async fn clear_selection(&self) {
        if let Some(previous) = self.history_task.lock().await.take() {
            previous.abort();
        }
        let mut panel = self.history.write().await;
        let generation = panel.generation + 1;
        *panel = HistoryPanel {
            generation,
            ..HistoryPanel::default()
        };
    }

    /// Waits for the current history fetch, if any, to finish.
    pub async fn history_settled(&self) -> HistoryPanel {
        let handle = self.history_task.lock().await.take();
        if let Some(handle) = handle {
            // an aborted task is fine, the panel already reflects it
            let _ = handle.await;
        }
        self.history().await
    }
}

impl Drop for ScreenerController {
    fn drop(&mut self) {
        if let Some(task) = self.history_task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, ClientResult};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use screener_core::fallback::fallback_rows;
    use screener_core::query::QueryParams;
    use screener_core::{HistoryResponse, ScreenerPage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Searches for `slow` take 150ms; `AAPL` history takes 200ms.
    #[derive(Default)]
    struct FakeApi {
        fail_pages: bool,
        history_completed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ScreenerApi for FakeApi {
        async fn fetch_page(&self, params: &QueryParams) -> ClientResult<ScreenerPage> {
            if self.fail_pages {
                return Err(ClientError::ServiceUnavailable("Status: 502".into()));
            }
            let slow = params.filters.search == "slow";
            if slow {
                tokio::time::sleep(Duration::from_millis(150)).await;
            }
            let rows = fallback_rows();
            let take = if slow { 7 } else { 2 };
            Ok(ScreenerPage {
                total: take,
                page: params.page,
                page_size: params.page_size,
                source: DataSource::Fallback,
                data: rows.into_iter().take(take).collect(),
            })
        }

        async fn fetch_history(&self, symbol: &str, _range: HistoryRange) -> ClientResult<HistoryResponse> {
            let delay = if symbol == "AAPL" { 200 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.history_completed.fetch_add(1, Ordering::SeqCst);
            Ok(HistoryResponse {
                symbol: symbol.to_string(),
                source: DataSource::Live,
                data: vec![HistoryPoint {
                    date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                    close: if symbol == "AAPL" { 1.0 } else { 2.0 },
                }],
            })
        }
    }

    fn controller(api: FakeApi) -> ScreenerController {
        ScreenerController::new(Arc::new(api), ScreenerView::default())
    }

    #[tokio::test]
    async fn test_refresh_loads_rows() {
        let ctrl = controller(FakeApi::default());
        assert_eq!(ctrl.refresh().await, LoadStatus::Loaded);
        let view = ctrl.snapshot().await;
        assert_eq!(view.rows().len(), 2);
        assert_eq!(view.source(), Some(DataSource::Fallback));
    }

    #[tokio::test]
    async fn test_failed_refresh_enters_error() {
        let ctrl = controller(FakeApi {
            fail_pages: true,
            ..Default::default()
        });
        let status = ctrl.refresh().await;
        assert_eq!(status, LoadStatus::Error("Failed to load data".into()));
        assert!(ctrl.snapshot().await.rows().is_empty());
    }

    #[tokio::test]
    async fn test_slow_older_response_does_not_win() {
        let ctrl = controller(FakeApi::default());
        ctrl.update(|v| v.set_search("slow")).await;
        assert_eq!(ctrl.snapshot().await.total(), 7);

        let (_, _) = tokio::join!(ctrl.update(|v| v.set_search("slow")), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ctrl.update(|v| v.set_search("fast")).await
        });

        let view = ctrl.snapshot().await;
        assert_eq!(view.params().filters.search, "fast");
        assert_eq!(view.total(), 2);
        assert_eq!(view.status(), &LoadStatus::Loaded);
    }

    #[tokio::test]
    async fn test_changing_symbol_cancels_previous_history() {
        let completed = Arc::new(AtomicUsize::new(0));
        let ctrl = controller(FakeApi {
            history_completed: Arc::clone(&completed),
            ..Default::default()
        });

        ctrl.select_symbol("aapl", HistoryRange::OneMonth).await;
        assert_eq!(ctrl.history().await.status, LoadStatus::Loading);
        ctrl.select_symbol("MSFT", HistoryRange::OneMonth).await;

        let panel = ctrl.history_settled().await;
        assert_eq!(panel.symbol.as_deref(), Some("MSFT"));
        assert_eq!(panel.status, LoadStatus::Loaded);
        assert_eq!(panel.data[0].close, 2.0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(ctrl.history().await.data[0].close, 2.0);
    }

    #[tokio::test]
    async fn test_clear_selection_empties_history() {
        let completed = Arc::new(AtomicUsize::new(0));
        let ctrl = controller(FakeApi {
            history_completed: Arc::clone(&completed),
            ..Default::default()
        });

        ctrl.select_symbol("AAPL", HistoryRange::OneYear).await;
        ctrl.clear_selection().await;

        let panel = ctrl.history().await;
        assert!(panel.symbol.is_none());
        assert!(panel.data.is_empty());
        assert_eq!(panel.status, LoadStatus::Idle);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_aborts_history_fetch() {
        let completed = Arc::new(AtomicUsize::new(0));
        let ctrl = controller(FakeApi {
            history_completed: Arc::clone(&completed),
            ..Default::default()
        });
        ctrl.select_symbol("AAPL", HistoryRange::OneYear).await;
        drop(ctrl);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }
}
