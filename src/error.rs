use axum::http::StatusCode;
use thiserror::Error;

/// Model backend errors.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Missing API key or unusable settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failed or the stream broke
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx status or an error event inside the stream
    #[error("API error: {0}")]
    Api(String),

    /// Unexpected payload
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

/// Page history store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Request-level failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Invalid messages format")]
    InvalidMessages,

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl PageError {
    pub fn status(&self) -> StatusCode {
        match self {
            PageError::Unauthorized => StatusCode::FORBIDDEN,
            PageError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            PageError::InvalidMessages
            | PageError::UnsupportedModel(_)
            | PageError::BadRequest(_) => StatusCode::BAD_REQUEST,
            PageError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text sent to the caller. Upstream details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            PageError::Backend(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }
}
