use anyhow::{Context, Result};
use fmp_client::FmpConfig;
use screener_core::EnrichmentConfig;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin.
    pub cors_origins: Vec<String>,
    pub enable_hsts: bool,
    pub enrichment: EnrichmentConfig,
    /// `None` when `FMP_API_KEY` is unset: every route serves fallback data.
    pub fmp: Option<FmpConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
            enable_hsts: false,
            enrichment: EnrichmentConfig::default(),
            fmp: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let enrichment = EnrichmentConfig {
            concurrency: env::var("SCREENER_ENRICH_CONCURRENCY")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .context("SCREENER_ENRICH_CONCURRENCY must be a positive integer")?,
            timeout: Duration::from_millis(
                env::var("SCREENER_ENRICH_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .context("SCREENER_ENRICH_TIMEOUT_MS must be milliseconds")?,
            ),
        };

        Ok(Self {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("API_PORT must be a port number")?,
            cors_origins: parse_origins(&env::var("CORS_ORIGINS").unwrap_or_default()),
            enable_hsts: env::var("ENABLE_HSTS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            enrichment,
            fmp: FmpConfig::from_env(),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
