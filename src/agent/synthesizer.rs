//! Synthesizer adapter: turns a tool result into an answer for the user.
//! It has no tool access, so a cycle always ends after it.

use crate::agent::system_prompt::synthesizer_prompt;
use crate::agent::OracleHandle;
use crate::oracle::OracleError;
use crate::types::Directive;

pub struct Synthesizer {
    oracle: OracleHandle,
}

impl Synthesizer {
    pub fn new(oracle: OracleHandle) -> Self {
        Self { oracle }
    }

    pub async fn synthesize(
        &self,
        system: &str,
        directive: &Directive,
        tool: &str,
        result: &str,
    ) -> Result<String, OracleError> {
        let prompt = synthesizer_prompt(directive, tool, result);
        let text = self.oracle.ask(system, &prompt, None).await?;
        Ok(text.trim().to_string())
    }
}
