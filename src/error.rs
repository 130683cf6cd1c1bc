//! Error taxonomy for tool execution.
//!
//! Every variant is recovered inside the cycle and rendered as an
//! `Error:`-prefixed string for the journal and the next prompt.

use crate::sandbox::SandboxError;
use thiserror::Error;

/// Marker that opens every rendered error result.
pub const ERROR_MARKER: &str = "Error:";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("access denied: {0}")]
    SandboxViolation(#[from] SandboxError),

    #[error("'{0}' was not found")]
    NotFound(String),

    #[error("path '{0}' is a directory, not a file")]
    IsADirectory(String),

    #[error("'{0}' is not a valid directory")]
    NotADirectory(String),

    #[error("file '{0}' already exists; pass overwrite=true to replace it")]
    AlreadyExists(String),

    #[error("unknown tool '{0}'")]
    ToolNotFound(String),

    #[error("invalid arguments for '{tool}': {message}")]
    ArgumentParse { tool: String, message: String },

    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    /// Stable short name used in traces.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SandboxViolation(_) => "sandbox_violation",
            Self::NotFound(_) => "not_found",
            Self::IsADirectory(_) => "is_a_directory",
            Self::NotADirectory(_) => "not_a_directory",
            Self::AlreadyExists(_) => "already_exists",
            Self::ToolNotFound(_) => "tool_not_found",
            Self::ArgumentParse { .. } => "argument_parse_error",
            Self::Execution(_) => "tool_execution_error",
        }
    }
}

impl From<anyhow::Error> for ToolError {
    fn from(e: anyhow::Error) -> Self {
        Self::Execution(format!("{:#}", e))
    }
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        Self::Execution(e.to_string())
    }
}

/// Whether a rendered result string carries the error marker.
pub fn is_error_text(text: &str) -> bool {
    text.trim_start().starts_with(ERROR_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_rendered_errors() {
        assert!(is_error_text("Error: unknown tool 'x'"));
        assert!(is_error_text("  Error: boom"));
        assert!(!is_error_text("Success: wrote 3 bytes"));
    }

    #[test]
    fn kinds_are_distinct_for_parse_and_lookup() {
        let missing = ToolError::ToolNotFound("delete_universe".into());
        let bad = ToolError::ArgumentParse {
            tool: "read_file".into(),
            message: "expected value".into(),
        };
        assert_eq!(missing.kind(), "tool_not_found");
        assert_eq!(bad.kind(), "argument_parse_error");
        assert_eq!(missing.to_string(), "unknown tool 'delete_universe'");
    }
}
