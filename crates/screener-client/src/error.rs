use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Preset storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Invalid preset: {0}")]
    InvalidPreset(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
