use async_trait::async_trait;
use screener_core::query::QueryParams;
use screener_core::{HistoryRange, HistoryResponse, ScreenerPage};
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// The two routes the screener front-end talks to.
#[async_trait]
pub trait ScreenerApi: Send + Sync {
    async fn fetch_page(&self, params: &QueryParams) -> ClientResult<ScreenerPage>;

    async fn fetch_history(&self, symbol: &str, range: HistoryRange) -> ClientResult<HistoryResponse>;
}

#[derive(Clone)]
pub struct HttpScreenerApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScreenerApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `STOCKVISION_API_URL`, default `http://localhost:3000`.
    pub fn from_env() -> Self {
        let base_url = std::env::var("STOCKVISION_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self::new(base_url, Duration::from_secs(30))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ScreenerApi for HttpScreenerApi {
    async fn fetch_page(&self, params: &QueryParams) -> ClientResult<ScreenerPage> {
        self.get("/api/screener", &params.to_query_pairs()).await
    }

    async fn fetch_history(&self, symbol: &str, range: HistoryRange) -> ClientResult<HistoryResponse> {
        self.get(
            "/api/history",
            &[
                ("symbol", symbol.to_string()),
                ("range", range.as_str().to_string()),
            ],
        )
        .await
    }
}
