use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewerError {
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    #[error("Content source error: {0}")]
    ContentSource(String),

    #[error("Completion service error: {0}")]
    Completion(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Template rendering error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Strategy '{strategy}' produced no usable output")]
    EmptyStrategyOutput { strategy: &'static str },

    #[error("All review strategies exhausted, last error: {0}")]
    StrategiesExhausted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<figment::Error> for ReviewerError {
    fn from(err: figment::Error) -> Self {
        ReviewerError::Config(Box::new(err))
    }
}

impl ReviewerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ReviewerError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_none_or(|s| s.is_server_error())
            }
            ReviewerError::Completion(_) | ReviewerError::RateLimited { .. } => true,
            _ => false,
        }
    }
}
