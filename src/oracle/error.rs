//! Oracle error types with retry classification.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle call timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("oracle returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("could not parse oracle response: {0}")]
    Parse(String),

    #[error("oracle returned an empty response")]
    Empty,

    #[error("oracle is not configured: {0}")]
    NotConfigured(String),
}

impl OracleError {
    /// Whether the same request may succeed if tried again later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Parse(_) | Self::Empty | Self::NotConfigured(_) => false,
        }
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(Duration::ZERO)
        } else if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
