//! Oracle client for OpenAI-compatible chat completion APIs.
//!
//! Only plain completions are requested: no tools are ever offered, so one
//! call can never chain several actions. Structured replies are requested
//! through `response_format` when a schema is supplied.

use crate::config::OracleConfig;
use crate::oracle::{Oracle, OracleError, OracleRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpOracle {
    base_url: String,
    api_key: String,
    temperature: f64,
    http: reqwest::Client,
}

// -- OpenAI-compatible request/response types --------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<MessagePayload<'a>>,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    r#type: &'a str,
    json_schema: JsonSchemaPayload<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaPayload<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl HttpOracle {
    pub fn new(base_url: &str, api_key: &str, temperature: f64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            temperature,
            http: reqwest::Client::new(),
        }
    }

    /// Build a client from config, resolving the key from the environment
    /// when it is not set inline.
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let api_key = config.effective_api_key().ok_or_else(|| {
            OracleError::NotConfigured(format!(
                "no api_key in config and ${} is unset",
                config.api_key_env
            ))
        })?;
        Ok(Self::new(&config.api_url, &api_key, config.temperature))
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn complete(&self, request: OracleRequest<'_>) -> Result<String, OracleError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = ChatRequest {
            model: request.model,
            messages: vec![
                MessagePayload {
                    role: "system",
                    content: request.system,
                },
                MessagePayload {
                    role: "user",
                    content: request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: self.temperature,
            response_format: request.schema.map(|s| ResponseFormat {
                r#type: "json_schema",
                json_schema: JsonSchemaPayload {
                    name: s.name,
                    schema: &s.schema,
                    strict: true,
                },
            }),
        };

        debug!(
            "Oracle request to model {} ({} prompt chars)",
            request.model,
            request.prompt.len()
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(OracleError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OutputSchema;

    #[test]
    fn request_includes_schema_only_when_given() {
        let schema = OutputSchema {
            name: "decision",
            schema: serde_json::json!({"type": "object"}),
        };
        let with = ChatRequest {
            model: "m",
            messages: vec![],
            max_tokens: 10,
            temperature: 0.0,
            response_format: Some(ResponseFormat {
                r#type: "json_schema",
                json_schema: JsonSchemaPayload {
                    name: schema.name,
                    schema: &schema.schema,
                    strict: true,
                },
            }),
        };
        let json = serde_json::to_value(&with).expect("serialize");
        assert_eq!(json["response_format"]["type"], "json_schema");
        assert_eq!(json["response_format"]["json_schema"]["name"], "decision");

        let without = ChatRequest {
            response_format: None,
            ..with
        };
        let json = serde_json::to_value(&without).expect("serialize");
        assert!(json.get("response_format").is_none());
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn missing_key_is_not_configured() {
        let config = OracleConfig {
            api_key: String::new(),
            api_key_env: "AURA_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..OracleConfig::default()
        };
        assert!(matches!(
            HttpOracle::from_config(&config),
            Err(OracleError::NotConfigured(_))
        ));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let oracle = HttpOracle::new("http://localhost:8080/", "k", 0.1);
        assert_eq!(oracle.base_url, "http://localhost:8080");
    }
}
