//! Shared types used across the aura runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Task queue
// ---------------------------------------------------------------------------

/// Completion state of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Done,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// One entry of the task queue. Insertion order is display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    pub description: String,
}

impl Task {
    pub fn todo(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Todo,
            description: description.into(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.status {
            TaskStatus::Done => "[x]",
            TaskStatus::Todo => "[ ]",
        };
        write!(f, "- {} {}: {}", marker, self.id, self.description)
    }
}

// ---------------------------------------------------------------------------
// Planner output
// ---------------------------------------------------------------------------

/// The single action chosen by the planner for one cycle.
///
/// `arguments_json` stays a string on the wire because structured-output
/// backends reject open-ended object schemas; it is parsed into a typed
/// [`crate::tools::ToolCall`] immediately after planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDecision {
    pub tool_name: String,
    pub reasoning: String,
    #[serde(default, deserialize_with = "string_or_object")]
    pub arguments_json: String,
}

/// Accept `argumentsJson` as a JSON string or, leniently, as an inline object.
fn string_or_object<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        obj @ serde_json::Value::Object(_) => Ok(obj.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "argumentsJson must be a string or object, got {}",
            other
        ))),
    }
}

// ---------------------------------------------------------------------------
// Reflection
// ---------------------------------------------------------------------------

/// Kind of learning value a cycle produced, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Correction,
    Insight,
    Hypothesis,
    Synthesis,
    Execution,
    Routine,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Correction => "Correction",
            Self::Insight => "Insight",
            Self::Hypothesis => "Hypothesis",
            Self::Synthesis => "Synthesis",
            Self::Execution => "Execution",
            Self::Routine => "Routine",
        };
        f.write_str(name)
    }
}

/// Scored judgment of one cycle. Only ever rendered into journal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    pub summary: String,
    pub value_score: u8,
    pub value_type: ValueType,
    pub key_learning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_tasks: Option<Vec<String>>,
}

impl Reflection {
    /// Low-value stand-in used when the reflector cannot produce a valid judgment.
    pub fn routine(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            value_score: 1,
            value_type: ValueType::Routine,
            key_learning: "None recorded.".into(),
            proposed_tasks: None,
        }
    }

    pub fn proposed(&self) -> &[String] {
        self.proposed_tasks.as_deref().unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

/// Directive the scaffold hands to the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Directive {
    /// An explicit command typed by the user.
    UserCommand(String),
    /// The previous cycle failed.
    DiagnoseAndFix,
    /// A task is pinned in the current-task file.
    ContinueCurrentTask(String),
    /// The last cycle read the queue; pick the first todo.
    SelectTopTodo,
    /// Nothing else applies.
    ReadTaskQueue,
}

impl Directive {
    /// Instruction text placed under the scaffold's directive header.
    pub fn instruction(&self) -> String {
        match self {
            Self::UserCommand(cmd) => format!(
                "Address this user command with a single tool call: {}",
                cmd
            ),
            Self::DiagnoseAndFix => "The last cycle failed. Diagnose the error recorded in the \
                journal summary and take one action that fixes it."
                .into(),
            Self::ContinueCurrentTask(task) => format!(
                "Continue the current task with the next concrete step: {}",
                task
            ),
            Self::SelectTopTodo => "Select the top todo task from the task queue and pin it \
                with set_current_task."
                .into(),
            Self::ReadTaskQueue => "Read the task queue with read_task_queue.".into(),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserCommand(cmd) => write!(f, "user command: {}", cmd),
            Self::DiagnoseAndFix => write!(f, "diagnose and fix"),
            Self::ContinueCurrentTask(task) => write!(f, "continue current task: {}", task),
            Self::SelectTopTodo => write!(f, "select top todo task"),
            Self::ReadTaskQueue => write!(f, "read the task queue"),
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Success,
    ToolError,
    PlannerMalfunction,
    OracleFailure,
    CriticalFailure,
}

impl CycleStatus {
    pub const ALL: [CycleStatus; 5] = [
        Self::Success,
        Self::ToolError,
        Self::PlannerMalfunction,
        Self::OracleFailure,
        Self::CriticalFailure,
    ];

    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Success)
    }

    /// Inverse of `Display`, as written on a journal status line.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|s| s.to_string() == label)
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::ToolError => write!(f, "Tool Error"),
            Self::PlannerMalfunction => write!(f, "Planner Malfunction"),
            Self::OracleFailure => write!(f, "Oracle Failure"),
            Self::CriticalFailure => write!(f, "CRITICAL FAILURE"),
        }
    }
}
