//! Planner adapter: one oracle call, one [`ActionDecision`].

use crate::agent::OracleHandle;
use crate::oracle::{strip_code_fence, OracleError, OutputSchema};
use crate::types::ActionDecision;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PlanError {
    /// The oracle answered, but not with a usable decision.
    #[error("malformed decision: {reason}")]
    Malformed { reason: String, raw: String },

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Output schema for a planner decision.
pub fn decision_schema() -> OutputSchema {
    OutputSchema {
        name: "action_decision",
        schema: json!({
            "type": "object",
            "properties": {
                "toolName": { "type": "string" },
                "reasoning": { "type": "string" },
                "argumentsJson": { "type": "string" }
            },
            "required": ["toolName", "reasoning", "argumentsJson"],
            "additionalProperties": false
        }),
    }
}

/// Parse raw oracle text into a decision.
pub fn parse_decision(raw: &str) -> Result<ActionDecision, PlanError> {
    let malformed = |reason: String| PlanError::Malformed {
        reason,
        raw: raw.to_string(),
    };

    let decision: ActionDecision =
        serde_json::from_str(strip_code_fence(raw)).map_err(|e| malformed(e.to_string()))?;
    if decision.tool_name.trim().is_empty() {
        return Err(malformed("toolName is empty".into()));
    }
    Ok(decision)
}

pub struct Planner {
    oracle: OracleHandle,
    schema: OutputSchema,
}

impl Planner {
    pub fn new(oracle: OracleHandle) -> Self {
        Self {
            oracle,
            schema: decision_schema(),
        }
    }

    /// Ask for exactly one decision. No tools are offered to the oracle.
    pub async fn plan(&self, system: &str, scaffold: &str) -> Result<ActionDecision, PlanError> {
        let raw = self.oracle.ask(system, scaffold, Some(&self.schema)).await?;
        match parse_decision(&raw) {
            Ok(decision) => {
                info!(
                    "Planner chose {} ({})",
                    decision.tool_name, decision.reasoning
                );
                Ok(decision)
            }
            Err(e) => {
                warn!("Planner returned an unusable decision: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OracleConfig;
    use crate::test_support::{Scripted, ScriptedOracle};
    use std::sync::Arc;

    #[test]
    fn parses_fenced_decision() {
        let raw = "```json\n{\"toolName\":\"read_task_queue\",\"reasoning\":\"start\",\"argumentsJson\":\"{}\"}\n```";
        let decision = parse_decision(raw).unwrap();
        assert_eq!(decision.tool_name, "read_task_queue");
        assert_eq!(decision.arguments_json, "{}");
    }

    #[test]
    fn rejects_prose_and_missing_fields() {
        assert!(matches!(
            parse_decision("I think we should read the queue."),
            Err(PlanError::Malformed { .. })
        ));
        assert!(matches!(
            parse_decision(r#"{"reasoning":"no tool"}"#),
            Err(PlanError::Malformed { .. })
        ));
        assert!(matches!(
            parse_decision(r#"{"toolName":" ","reasoning":"blank"}"#),
            Err(PlanError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn plan_sends_schema_and_no_tools() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Scripted::json(json!({
            "toolName": "list_files",
            "reasoning": "look",
            "argumentsJson": "{\"path\":\".\"}"
        }))]));
        let planner = Planner::new(OracleHandle::new(
            oracle.clone(),
            "planner-model",
            &OracleConfig::default(),
        ));

        let decision = planner.plan("system", "scaffold").await.unwrap();
        assert_eq!(decision.tool_name, "list_files");

        let calls = oracle.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "planner-model");
        assert_eq!(calls[0].schema.as_deref(), Some("action_decision"));
    }

    #[tokio::test]
    async fn oracle_failure_is_not_malformed() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Scripted::Fail("down".into())]));
        let planner = Planner::new(OracleHandle::new(oracle, "m", &OracleConfig::default()));
        assert!(matches!(
            planner.plan("s", "p").await,
            Err(PlanError::Oracle(_))
        ));
    }
}
