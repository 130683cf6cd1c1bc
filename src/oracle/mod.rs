//! The reasoning oracle: a prompt-in, text-out service that may be slow,
//! unavailable, or return malformed output.

pub mod client;
pub mod error;

pub use client::HttpOracle;
pub use error::OracleError;

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// JSON schema the oracle is asked to conform to.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub name: &'static str,
    pub schema: serde_json::Value,
}

/// One single-turn oracle call.
#[derive(Debug, Clone, Copy)]
pub struct OracleRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub prompt: &'a str,
    pub schema: Option<&'a OutputSchema>,
    pub max_tokens: u32,
}

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Run one completion and return the raw text reply.
    async fn complete(&self, request: OracleRequest<'_>) -> Result<String, OracleError>;
}

/// Pause before retrying a transient failure.
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Call the oracle with one deadline covering every attempt. Transient
/// failures are retried up to `retries` times; anything else returns at
/// once. Dropping the future cancels the call.
pub async fn ask(
    oracle: &dyn Oracle,
    request: OracleRequest<'_>,
    timeout: Duration,
    retries: u32,
) -> Result<String, OracleError> {
    let attempts = async {
        let mut attempt = 0;
        loop {
            match oracle.complete(request).await {
                Err(e) if e.is_transient() && attempt < retries => {
                    attempt += 1;
                    warn!(
                        "Transient oracle failure from {}: {} (retry {}/{})",
                        request.model, e, attempt, retries
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                other => return other,
            }
        }
    };
    match tokio::time::timeout(timeout, attempts).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Oracle call to {} timed out after {:?}", request.model, timeout);
            Err(OracleError::Timeout(timeout))
        }
    }
}

/// Strip a surrounding Markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}
