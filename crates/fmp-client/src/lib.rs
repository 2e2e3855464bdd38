use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode, Url};
use screener_core::{
    HistoryPoint, HistoryRange, KeyMetrics, MarketDataProvider, ProviderError, ProviderQuery,
    ScreenerRow,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";

/// Retries after the first request is answered with HTTP 429.
const MAX_RETRIES: u32 = 3;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).duration_since(now) + Duration::from_millis(50),
                None => Duration::from_millis(50),
            };
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for FMP API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Connection settings for [`FmpClient`].
#[derive(Debug, Clone)]
pub struct FmpConfig {
    pub api_key: String,
    pub base_url: String,
    /// Requests allowed per minute.
    pub rate_limit: usize,
    pub timeout: Duration,
    /// Pause before retrying a 429 response.
    pub retry_wait: Duration,
}

impl FmpConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit: 300,
            timeout: Duration::from_secs(30),
            retry_wait: Duration::from_secs(5),
        }
    }

    /// Reads `FMP_API_KEY`, `FMP_BASE_URL`, `FMP_RATE_LIMIT` and
    /// `FMP_TIMEOUT_SECS`. Returns `None` when no key is set, which callers
    /// treat as "serve fallback data".
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("FMP_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("FMP_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Some(limit) = std::env::var("FMP_RATE_LIMIT").ok().and_then(|v| v.parse().ok()) {
            config.rate_limit = limit;
        }
        if let Some(secs) = std::env::var("FMP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        Some(config)
    }
}

/// Financial Modeling Prep REST client.
#[derive(Clone)]
pub struct FmpClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
    timeout: Duration,
    retry_wait: Duration,
}

impl FmpClient {
    pub fn new(config: FmpConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key: config.api_key,
            base_url: config.base_url,
            client,
            rate_limiter: RateLimiter::new(config.rate_limit, Duration::from_secs(60)),
            timeout: config.timeout,
            retry_wait: config.retry_wait,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request with rate limiting. A 429 is retried up to
    /// `MAX_RETRIES` times after the first attempt.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let request = builder.build().map_err(|e| ProviderError::ApiError(e.to_string()))?;

        for attempt in 0..=MAX_RETRIES {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| ProviderError::ApiError("Cannot clone request".to_string()))?;
            let response = self.client.execute(req_clone).await.map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout)
                } else {
                    ProviderError::ApiError(e.to_string())
                }
            })?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }
            if attempt == MAX_RETRIES {
                break;
            }

            tracing::warn!(
                "FMP 429 rate limited, waiting {:.1}s before retry {}/{}",
                self.retry_wait.as_secs_f64(),
                attempt + 1,
                MAX_RETRIES
            );
            tokio::time::sleep(self.retry_wait).await;
        }

        Err(ProviderError::RateLimited(format!(
            "FMP still rate limiting after {} retries",
            MAX_RETRIES
        )))
    }

    /// Base URL with `segments` appended, each percent-encoded as a single
    /// path segment so a symbol can never change the endpoint or query.
    fn endpoint_url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        if let Some(bad) = segments.iter().find(|s| matches!(s.trim(), "" | "." | "..")) {
            return Err(ProviderError::InvalidData(format!("Invalid path segment '{}'", bad)));
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::ApiError(format!("Invalid FMP base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::ApiError("FMP base URL cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET the endpoint at `segments` with `query` plus the API key; non-2xx
    /// becomes an error.
    async fn get_json(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Value, ProviderError> {
        let url = self.endpoint_url(segments)?;
        let response = self
            .send_request(self.client.get(url).query(query).query(&[("apikey", &self.api_key)]))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::InvalidData(e.to_string()))
    }

    /// `/stock-screener` with the translated filters.
    pub async fn stock_screener(&self, query: &ProviderQuery) -> Result<Vec<ScreenerRow>, ProviderError> {
        let body = self.get_json(&["stock-screener"], &screener_query_pairs(query)).await?;
        let items = body
            .as_array()
            .ok_or_else(|| ProviderError::InvalidData("stock-screener did not return an array".to_string()))?;

        let rows: Vec<ScreenerRow> = items.iter().filter_map(parse_screener_item).collect();
        tracing::debug!(returned = items.len(), kept = rows.len(), "FMP stock-screener");
        Ok(rows)
    }

    /// `/key-metrics-ttm/{symbol}`: first entry's ROE and debt/equity.
    pub async fn key_metrics(&self, symbol: &str) -> Result<KeyMetrics, ProviderError> {
        let body = self.get_json(&["key-metrics-ttm", symbol], &[]).await?;
        Ok(parse_key_metrics(&body))
    }

    /// `/historical-price-full/{symbol}` as a close-only line series.
    pub async fn historical_closes(&self, symbol: &str, timeseries: u32) -> Result<Vec<HistoryPoint>, ProviderError> {
        let body = self
            .get_json(
                &["historical-price-full", symbol],
                &[
                    ("serietype", "line".to_string()),
                    ("timeseries", timeseries.to_string()),
                ],
            )
            .await?;
        let parsed: HistoricalResponse =
            serde_json::from_value(body).map_err(|e| ProviderError::InvalidData(e.to_string()))?;
        Ok(parse_historical(parsed))
    }
}

#[async_trait]
impl MarketDataProvider for FmpClient {
    async fn screen(&self, query: &ProviderQuery) -> Result<Vec<ScreenerRow>, ProviderError> {
        self.stock_screener(query).await
    }

    async fn key_metrics_ttm(&self, symbol: &str) -> Result<KeyMetrics, ProviderError> {
        self.key_metrics(symbol).await
    }

    async fn price_history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<HistoryPoint>, ProviderError> {
        self.historical_closes(symbol, range.trading_days() + 1).await
    }

    fn provider_name(&self) -> &'static str {
        "fmp"
    }
}

/// FMP query keys for a screener request.
fn screener_query_pairs(query: &ProviderQuery) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("limit", query.limit.to_string()),
        ("isActivelyTrading", query.actively_trading.to_string()),
    ];
    if let Some(sector) = &query.sector {
        pairs.push(("sector", sector.clone()));
    }
    let bounds = [
        ("marketCapMoreThan", query.market_cap_more_than),
        ("marketCapLowerThan", query.market_cap_lower_than),
        ("peMoreThan", query.pe_more_than),
        ("peLowerThan", query.pe_lower_than),
    ];
    for (key, value) in bounds {
        if let Some(v) = value {
            pairs.push((key, v.to_string()));
        }
    }
    pairs
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// One screener entry. Entries without a symbol are dropped; fields of the
/// wrong JSON type are treated as unknown.
fn parse_screener_item(item: &Value) -> Option<ScreenerRow> {
    let symbol = non_empty_str(item.get("symbol"))?;
    let mut row = ScreenerRow::new(&symbol);
    row.company_name = non_empty_str(item.get("companyName"))
        .or_else(|| non_empty_str(item.get("company_name")))
        .or_else(|| non_empty_str(item.get("company")));
    row.price = item.get("price").and_then(Value::as_f64);
    row.market_cap = item.get("marketCap").and_then(Value::as_f64);
    row.sector = non_empty_str(item.get("sector"));
    row.pe = item.get("pe").and_then(Value::as_f64);
    Some(row)
}

fn parse_key_metrics(body: &Value) -> KeyMetrics {
    let first = body.as_array().and_then(|a| a.first());
    KeyMetrics {
        roe_ttm: first.and_then(|m| m.get("roeTTM")).and_then(Value::as_f64),
        debt_to_equity_ttm: first.and_then(|m| m.get("debtToEquityTTM")).and_then(Value::as_f64),
    }
}

fn parse_historical(resp: HistoricalResponse) -> Vec<HistoryPoint> {
    resp.historical
        .into_iter()
        .filter_map(|p| {
            // dates occasionally carry a time component
            let date = NaiveDate::parse_from_str(p.date.get(..10)?, "%Y-%m-%d").ok()?;
            let close = p.close.as_ref().and_then(close_value)?;
            Some(HistoryPoint { date, close })
        })
        .collect()
}

fn close_value(v: &Value) -> Option<f64> {
    let close: f64 = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    close.is_finite().then_some(close)
}

// Response structures
#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    #[serde(default)]
    historical: Vec<HistoricalEntry>,
}

#[derive(Debug, Deserialize)]
struct HistoricalEntry {
    date: String,
    #[serde(default)]
    close: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_screener_query_pairs() {
        let query = ProviderQuery {
            limit: 200,
            actively_trading: true,
            sector: Some("Energy".into()),
            market_cap_more_than: Some(1e9),
            market_cap_lower_than: None,
            pe_more_than: None,
            pe_lower_than: Some(40.0),
        };
        let pairs = screener_query_pairs(&query);
        assert_eq!(
            pairs,
            vec![
                ("limit", "200".to_string()),
                ("isActivelyTrading", "true".to_string()),
                ("sector", "Energy".to_string()),
                ("marketCapMoreThan", "1000000000".to_string()),
                ("peLowerThan", "40".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_screener_item() {
        let item = json!({
            "symbol": "aapl",
            "company_name": "Apple Inc.",
            "price": 190.1,
            "marketCap": 2950000000000u64,
            "sector": "Technology",
            "pe": "n/a"
        });
        let row = parse_screener_item(&item).unwrap();
        assert_eq!(row.symbol, "AAPL");
        assert_eq!(row.company_name.as_deref(), Some("Apple Inc."));
        assert_eq!(row.price, Some(190.1));
        assert_eq!(row.market_cap, Some(2.95e12));
        assert_eq!(row.pe, None);
        assert_eq!(row.roe_ttm, None);
    }

    #[test]
    fn test_parse_screener_item_without_symbol() {
        assert!(parse_screener_item(&json!({"companyName": "Nameless"})).is_none());
        assert!(parse_screener_item(&json!({"symbol": "  "})).is_none());
    }

    #[test]
    fn test_parse_key_metrics() {
        let body = json!([{ "roeTTM": 1.47, "debtToEquityTTM": 1.87 }, { "roeTTM": 0.1 }]);
        let m = parse_key_metrics(&body);
        assert_eq!(m.roe_ttm, Some(1.47));
        assert_eq!(m.debt_to_equity_ttm, Some(1.87));

        let m = parse_key_metrics(&json!([]));
        assert_eq!(m, KeyMetrics::default());

        let m = parse_key_metrics(&json!({"Error Message": "Invalid API KEY"}));
        assert_eq!(m, KeyMetrics::default());
    }

    #[test]
    fn test_parse_historical() {
        let resp: HistoricalResponse = serde_json::from_value(json!({
            "symbol": "AAPL",
            "historical": [
                { "date": "2024-06-28", "close": 210.62 },
                { "date": "2024-06-27 00:00:00", "close": "214.10" },
                { "date": "2024-06-26", "close": null },
                { "date": "garbage", "close": 1.0 }
            ]
        }))
        .unwrap();
        let points = parse_historical(resp);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 6, 28).unwrap());
        assert_eq!(points[1].close, 214.10);
    }

    #[test]
    fn test_missing_historical_is_empty() {
        let resp: HistoricalResponse = serde_json::from_value(json!({})).unwrap();
        assert!(parse_historical(resp).is_empty());
    }

    #[tokio::test]
    async fn test_rate_limiter_allows_burst_up_to_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.timestamps.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn test_rate_limiter_waits_for_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(100));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    fn client_for(base_url: &str) -> FmpClient {
        FmpClient::new(FmpConfig {
            base_url: base_url.to_string(),
            retry_wait: Duration::from_millis(10),
            ..FmpConfig::new("KEY".into())
        })
    }

    #[test]
    fn test_symbols_are_single_path_segments() {
        let client = client_for(DEFAULT_BASE_URL);

        let url = client.endpoint_url(&["key-metrics-ttm", "BRK/B"]).unwrap();
        assert_eq!(url.path(), "/api/v3/key-metrics-ttm/BRK%2FB");

        let url = client.endpoint_url(&["historical-price-full", "AAPL?SERIETYPE=BAR&X"]).unwrap();
        assert_eq!(url.path(), "/api/v3/historical-price-full/AAPL%3FSERIETYPE=BAR&X");
        assert_eq!(url.query(), None);

        let url = client.endpoint_url(&["key-metrics-ttm", "../STOCK-SCREENER"]).unwrap();
        assert_eq!(url.path(), "/api/v3/key-metrics-ttm/..%2FSTOCK-SCREENER");
    }

    #[test]
    fn test_dot_segments_are_rejected() {
        let client = client_for(DEFAULT_BASE_URL);
        for bad in ["..", ".", " "] {
            let result = client.endpoint_url(&["key-metrics-ttm", bad]);
            assert!(matches!(result, Err(ProviderError::InvalidData(_))), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn test_symbol_cannot_rewrite_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "historical": [] })))
            .mount(&server)
            .await;

        let client = client_for(&format!("{}/api/v3", server.uri()));
        client
            .price_history("AAPL?SERIETYPE=BAR&X", HistoryRange::OneMonth)
            .await
            .unwrap();
        client.key_metrics_ttm("../STOCK-SCREENER").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);

        let history = &requests[0].url;
        assert_eq!(history.path(), "/api/v3/historical-price-full/AAPL%3FSERIETYPE=BAR&X");
        let pairs: Vec<(String, String)> = history.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("serietype".to_string(), "line".to_string()),
                ("timeseries".to_string(), "23".to_string()),
                ("apikey".to_string(), "KEY".to_string()),
            ]
        );

        assert_eq!(requests[1].url.path(), "/api/v3/key-metrics-ttm/..%2FSTOCK-SCREENER");
    }

    #[tokio::test]
    async fn test_429_is_retried_three_times() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stock-screener"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1 + MAX_RETRIES as u64)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let query = ProviderQuery::from_filters(&Default::default());
        let start = Instant::now();
        let result = client.stock_screener(&query).await;

        assert!(matches!(result, Err(ProviderError::RateLimited(_))));
        // three waits, none after the last attempt
        assert!(start.elapsed() < Duration::from_secs(2));
        server.verify().await;
    }

    #[tokio::test]
    async fn test_429_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "roeTTM": 0.5 }])))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let metrics = client.key_metrics_ttm("AAPL").await.unwrap();
        assert_eq!(metrics.roe_ttm, Some(0.5));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_server_error_maps_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = client.key_metrics_ttm("AAPL").await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(matches!(err, ProviderError::Status { ref body, .. } if body == "maintenance"));
    }

    #[test]
    fn test_config_defaults() {
        let config = FmpConfig::new("key".into());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.rate_limit, 300);
        assert_eq!(config.retry_wait, Duration::from_secs(5));
        let client = FmpClient::new(config);
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        assert_eq!(client.provider_name(), "fmp");
    }
}
