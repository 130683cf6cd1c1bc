//! Reflector adapter: scores a finished cycle against the previous one.

use crate::agent::system_prompt::reflector_prompt;
use crate::agent::OracleHandle;
use crate::oracle::{strip_code_fence, OracleError, OutputSchema};
use crate::types::Reflection;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReflectionError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("invalid reflection: {0}")]
    Invalid(String),
}

pub fn reflection_schema() -> OutputSchema {
    OutputSchema {
        name: "reflection",
        schema: json!({
            "type": "object",
            "properties": {
                "summary": { "type": "string" },
                "valueScore": { "type": "integer", "minimum": 1, "maximum": 5 },
                "valueType": {
                    "type": "string",
                    "enum": ["Correction", "Insight", "Hypothesis", "Synthesis", "Execution", "Routine"]
                },
                "keyLearning": { "type": "string" },
                "proposedTasks": {
                    "type": ["array", "null"],
                    "items": { "type": "string" }
                }
            },
            "required": ["summary", "valueScore", "valueType", "keyLearning", "proposedTasks"],
            "additionalProperties": false
        }),
    }
}

pub fn parse_reflection(raw: &str) -> Result<Reflection, ReflectionError> {
    let mut reflection: Reflection = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| ReflectionError::Invalid(e.to_string()))?;

    if !(1..=5).contains(&reflection.value_score) {
        return Err(ReflectionError::Invalid(format!(
            "valueScore {} is outside 1..=5",
            reflection.value_score
        )));
    }
    if reflection.summary.trim().is_empty() {
        return Err(ReflectionError::Invalid("summary is empty".into()));
    }

    if let Some(tasks) = reflection.proposed_tasks.as_mut() {
        tasks.retain(|t| !t.trim().is_empty());
    }
    if reflection.proposed_tasks.as_ref().is_some_and(Vec::is_empty) {
        reflection.proposed_tasks = None;
    }
    Ok(reflection)
}

pub struct Reflector {
    oracle: OracleHandle,
    schema: OutputSchema,
}

impl Reflector {
    pub fn new(oracle: OracleHandle) -> Self {
        Self {
            oracle,
            schema: reflection_schema(),
        }
    }

    pub async fn reflect(
        &self,
        system: &str,
        previous_entry: Option<&str>,
        trace: &str,
    ) -> Result<Reflection, ReflectionError> {
        let prompt = reflector_prompt(previous_entry, trace);
        let raw = self.oracle.ask(system, &prompt, Some(&self.schema)).await?;
        let reflection = parse_reflection(&raw)?;
        debug!(
            "Reflection: {}/5 ({})",
            reflection.value_score, reflection.value_type
        );
        Ok(reflection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    #[test]
    fn parses_valid_reflection() {
        let r = parse_reflection(
            r#"{"summary":"Fixed the path","valueScore":5,"valueType":"Correction",
                "keyLearning":"Use relative paths","proposedTasks":["Audit paths", " "]}"#,
        )
        .unwrap();
        assert_eq!(r.value_type, ValueType::Correction);
        assert_eq!(r.proposed(), ["Audit paths".to_string()]);
    }

    #[test]
    fn null_or_empty_proposals_become_none() {
        let r = parse_reflection(
            r#"{"summary":"s","valueScore":1,"valueType":"Routine","keyLearning":"k","proposedTasks":[]}"#,
        )
        .unwrap();
        assert!(r.proposed_tasks.is_none());
    }

    #[test]
    fn rejects_out_of_range_scores_and_unknown_types() {
        let zero = r#"{"summary":"s","valueScore":0,"valueType":"Routine","keyLearning":"k"}"#;
        assert!(matches!(parse_reflection(zero), Err(ReflectionError::Invalid(_))));
        let nine = r#"{"summary":"s","valueScore":9,"valueType":"Routine","keyLearning":"k"}"#;
        assert!(matches!(parse_reflection(nine), Err(ReflectionError::Invalid(_))));
        let kind = r#"{"summary":"s","valueScore":3,"valueType":"Epiphany","keyLearning":"k"}"#;
        assert!(matches!(parse_reflection(kind), Err(ReflectionError::Invalid(_))));
    }
}
