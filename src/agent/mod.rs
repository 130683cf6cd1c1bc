//! The cognitive cycle: scaffold, plan, execute, synthesize, reflect, journal.

pub mod context;
pub mod injection_defense;
pub mod loop_;
pub mod planner;
pub mod reflector;
pub mod synthesizer;
pub mod system_prompt;

pub use loop_::{CycleReport, CycleRequest, Orchestrator};

use crate::config::OracleConfig;
use crate::oracle::{self, Oracle, OracleError, OracleRequest, OutputSchema};
use std::sync::Arc;
use std::time::Duration;

/// An oracle bound to one model with the configured limits.
#[derive(Clone)]
pub struct OracleHandle {
    oracle: Arc<dyn Oracle>,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    retries: u32,
}

impl OracleHandle {
    pub fn new(oracle: Arc<dyn Oracle>, model: &str, config: &OracleConfig) -> Self {
        Self {
            oracle,
            model: model.to_string(),
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
            retries: config.transient_retries,
        }
    }

    /// One single-turn call with the configured deadline and retries.
    pub async fn ask(
        &self,
        system: &str,
        prompt: &str,
        schema: Option<&OutputSchema>,
    ) -> Result<String, OracleError> {
        let request = OracleRequest {
            model: &self.model,
            system,
            prompt,
            schema,
            max_tokens: self.max_tokens,
        };
        oracle::ask(self.oracle.as_ref(), request, self.timeout, self.retries).await
    }
}
