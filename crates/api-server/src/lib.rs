use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use fmp_client::FmpClient;
use screener_core::{MarketDataProvider, ScreenerService};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

pub mod config;
mod history_routes;
mod request_id;
mod screener_routes;
mod security_headers;


pub use config::ServerConfig;

use request_id::request_id_middleware;
use security_headers::security_headers_middleware;

/// Shared, read-only state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScreenerService>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wires the FMP client when a key is configured; otherwise every route
    /// serves fallback data.
    pub fn from_config(config: ServerConfig) -> Self {
        let provider: Option<Arc<dyn MarketDataProvider>> = match &config.fmp {
            Some(fmp) => {
                tracing::info!(base_url = %fmp.base_url, rate_limit = fmp.rate_limit, "FMP provider configured");
                Some(Arc::new(FmpClient::new(fmp.clone())))
            }
            None => {
                tracing::warn!("FMP_API_KEY not set, serving fallback screener and synthetic history data");
                None
            }
        };

        Self {
            service: Arc::new(ScreenerService::new(provider, config.enrichment)),
            config: Arc::new(config),
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let enable_hsts = state.config.enable_hsts;

    Router::new()
        .route("/health", get(health))
        .merge(screener_routes::screener_routes())
        .merge(history_routes::history_routes())
        .with_state(state)
        .layer(middleware::from_fn_with_state(enable_hsts, security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "stockvision-api",
        "provider": if state.service.has_provider() { "configured" } else { "unconfigured" },
    }))
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

/// `RUST_LOG` filter (default `info`); `RUST_LOG_FORMAT=json` switches to
/// JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    let addr = config.bind_addr();
    let app = build_router(AppState::from_config(config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🚀 StockVision API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
