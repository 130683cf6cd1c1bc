//! The closed capability set and its executor.
//!
//! A planner decision names a tool and carries its arguments as a JSON
//! string. [`ToolRegistry::validate`] turns that into a typed [`ToolCall`]
//! right after planning; [`ToolRegistry::invoke`] runs it. Every failure is
//! returned as a [`ToolResult`] and rendered as an `Error:` string, so
//! nothing escapes the executor.

pub mod definitions;
mod files;
mod vault_ops;

pub use definitions::{definition, render_catalog, ToolDefinition};

use crate::config::SearchConfig;
use crate::error::{ToolError, ERROR_MARKER};
use crate::types::{ActionDecision, Task};
use crate::vault::Vault;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ListFiles,
    ReadFile,
    WriteFile,
    SearchCode,
    WriteJournal,
    GetLatestJournalEntry,
    ReadTaskQueue,
    UpdateTaskQueue,
    SetCurrentTask,
    CompleteTask,
    AnswerUser,
}

impl ToolName {
    pub const ALL: [ToolName; 11] = [
        Self::ListFiles,
        Self::ReadFile,
        Self::WriteFile,
        Self::SearchCode,
        Self::WriteJournal,
        Self::GetLatestJournalEntry,
        Self::ReadTaskQueue,
        Self::UpdateTaskQueue,
        Self::SetCurrentTask,
        Self::CompleteTask,
        Self::AnswerUser,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListFiles => "list_files",
            Self::ReadFile => "read_file",
            Self::WriteFile => "write_file",
            Self::SearchCode => "search_code",
            Self::WriteJournal => "write_journal",
            Self::GetLatestJournalEntry => "get_latest_journal_entry",
            Self::ReadTaskQueue => "read_task_queue",
            Self::UpdateTaskQueue => "update_task_queue",
            Self::SetCurrentTask => "set_current_task",
            Self::CompleteTask => "complete_task",
            Self::AnswerUser => "answer_user",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name.trim())
    }

    /// Tools whose output is meant to be read, not acted on.
    pub fn is_informational(self) -> bool {
        matches!(
            self,
            Self::ListFiles
                | Self::ReadFile
                | Self::SearchCode
                | Self::GetLatestJournalEntry
                | Self::ReadTaskQueue
        )
    }

    /// Whether a cycle with a user command should synthesize an answer
    /// after running this tool.
    pub fn answers_user(self) -> bool {
        self.is_informational() || self == Self::AnswerUser
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Typed arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathArgs {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteFileArgs {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchArgs {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JournalArgs {
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LatestJournalArgs {
    #[serde(default)]
    pub full: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTasksArgs {
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskIdArgs {
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnswerArgs {
    pub answer: String,
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ListFiles(PathArgs),
    ReadFile(PathArgs),
    WriteFile(WriteFileArgs),
    SearchCode(SearchArgs),
    WriteJournal(JournalArgs),
    GetLatestJournalEntry(LatestJournalArgs),
    ReadTaskQueue(NoArgs),
    UpdateTaskQueue(UpdateTasksArgs),
    SetCurrentTask(TaskIdArgs),
    CompleteTask(TaskIdArgs),
    AnswerUser(AnswerArgs),
}

impl ToolCall {
    /// Parse `arguments_json` into the argument type of `tool`.
    /// Blank or `null` arguments mean `{}`.
    pub fn parse(tool: ToolName, arguments_json: &str) -> Result<Self, ToolError> {
        let raw = arguments_json.trim();
        let raw = if raw.is_empty() || raw == "null" { "{}" } else { raw };

        Ok(match tool {
            ToolName::ListFiles => Self::ListFiles(args(tool, raw)?),
            ToolName::ReadFile => Self::ReadFile(args(tool, raw)?),
            ToolName::WriteFile => Self::WriteFile(args(tool, raw)?),
            ToolName::SearchCode => Self::SearchCode(args(tool, raw)?),
            ToolName::WriteJournal => Self::WriteJournal(args(tool, raw)?),
            ToolName::GetLatestJournalEntry => Self::GetLatestJournalEntry(args(tool, raw)?),
            ToolName::ReadTaskQueue => Self::ReadTaskQueue(args(tool, raw)?),
            ToolName::UpdateTaskQueue => Self::UpdateTaskQueue(args(tool, raw)?),
            ToolName::SetCurrentTask => Self::SetCurrentTask(args(tool, raw)?),
            ToolName::CompleteTask => Self::CompleteTask(args(tool, raw)?),
            ToolName::AnswerUser => Self::AnswerUser(args(tool, raw)?),
        })
    }

    pub fn name(&self) -> ToolName {
        match self {
            Self::ListFiles(_) => ToolName::ListFiles,
            Self::ReadFile(_) => ToolName::ReadFile,
            Self::WriteFile(_) => ToolName::WriteFile,
            Self::SearchCode(_) => ToolName::SearchCode,
            Self::WriteJournal(_) => ToolName::WriteJournal,
            Self::GetLatestJournalEntry(_) => ToolName::GetLatestJournalEntry,
            Self::ReadTaskQueue(_) => ToolName::ReadTaskQueue,
            Self::UpdateTaskQueue(_) => ToolName::UpdateTaskQueue,
            Self::SetCurrentTask(_) => ToolName::SetCurrentTask,
            Self::CompleteTask(_) => ToolName::CompleteTask,
            Self::AnswerUser(_) => ToolName::AnswerUser,
        }
    }
}

fn args<T: DeserializeOwned>(tool: ToolName, raw: &str) -> Result<T, ToolError> {
    serde_json::from_str(raw).map_err(|e| ToolError::ArgumentParse {
        tool: tool.as_str().into(),
        message: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of one tool step.
#[derive(Debug)]
pub struct ToolResult {
    /// Tool name as the planner wrote it.
    pub tool: String,
    pub outcome: Result<String, ToolError>,
}

impl ToolResult {
    pub fn failed(tool: impl Into<String>, error: ToolError) -> Self {
        Self {
            tool: tool.into(),
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The string result fed to the journal and the next prompt.
    pub fn render(&self) -> String {
        match &self.outcome {
            Ok(output) => output.clone(),
            Err(e) => format!("{} {}", ERROR_MARKER, e),
        }
    }

    pub fn error_kind(&self) -> Option<&'static str> {
        self.outcome.as_ref().err().map(ToolError::kind)
    }
}

// ---------------------------------------------------------------------------
// Registry / executor
// ---------------------------------------------------------------------------

/// The capability registry. Built once at startup and injected into the
/// orchestrator.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    vault: Arc<Vault>,
    search: SearchConfig,
    enabled: Vec<ToolName>,
}

impl ToolRegistry {
    /// Registry with every capability enabled.
    pub fn new(vault: Arc<Vault>, search: SearchConfig) -> Self {
        Self::with_tools(vault, search, &ToolName::ALL)
    }

    pub fn with_tools(vault: Arc<Vault>, search: SearchConfig, tools: &[ToolName]) -> Self {
        Self {
            vault,
            search,
            enabled: tools.to_vec(),
        }
    }

    pub fn vault(&self) -> &Arc<Vault> {
        &self.vault
    }

    /// Look up an enabled tool by name.
    pub fn lookup(&self, name: &str) -> Option<ToolName> {
        ToolName::parse(name).filter(|t| self.enabled.contains(t))
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.enabled.iter().copied().map(definition).collect()
    }

    /// Resolve the decision's tool and parse its arguments.
    pub fn validate(&self, decision: &ActionDecision) -> Result<ToolCall, ToolError> {
        let tool = self
            .lookup(&decision.tool_name)
            .ok_or_else(|| ToolError::ToolNotFound(decision.tool_name.trim().to_string()))?;
        ToolCall::parse(tool, &decision.arguments_json)
    }

    /// Validate and run a decision.
    pub async fn execute(&self, decision: &ActionDecision) -> ToolResult {
        match self.validate(decision) {
            Ok(call) => self.invoke(call).await,
            Err(e) => {
                warn!("Rejected tool call '{}': {}", decision.tool_name, e);
                ToolResult::failed(decision.tool_name.clone(), e)
            }
        }
    }

    /// Run a validated call.
    pub async fn invoke(&self, call: ToolCall) -> ToolResult {
        let tool = call.name();
        info!("Tool: {}", tool);

        let vault = &self.vault;
        let outcome = match call {
            ToolCall::ListFiles(a) => files::list_files(vault.sandbox(), &a.path),
            ToolCall::ReadFile(a) => files::read_file(vault.sandbox(), &a.path),
            ToolCall::WriteFile(a) => files::write_file(vault.sandbox(), &a),
            ToolCall::SearchCode(a) => {
                files::search_code(vault.sandbox().clone(), self.search.clone(), a.query).await
            }
            ToolCall::WriteJournal(a) => vault_ops::write_journal(vault, &a.content),
            ToolCall::GetLatestJournalEntry(a) => vault_ops::latest_journal_entry(vault, a.full),
            ToolCall::ReadTaskQueue(_) => vault_ops::read_task_queue(vault),
            ToolCall::UpdateTaskQueue(a) => vault_ops::update_task_queue(vault, &a.tasks),
            ToolCall::SetCurrentTask(a) => vault_ops::set_current_task(vault, &a.task_id),
            ToolCall::CompleteTask(a) => vault_ops::complete_task(vault, &a.task_id),
            ToolCall::AnswerUser(a) => vault_ops::answer_user(a.answer),
        };

        if let Err(e) = &outcome {
            warn!("Tool {} failed: {}", tool, e);
        }
        ToolResult {
            tool: tool.as_str().into(),
            outcome,
        }
    }
}

/// Route `<tool> {json}` input straight to the executor, bypassing the
/// planner. Returns `None` when the input is not of that shape or names
/// no known tool.
pub fn parse_direct_invocation(input: &str, registry: &ToolRegistry) -> Option<ActionDecision> {
    let (name, rest) = input.trim().split_once(char::is_whitespace)?;
    let rest = rest.trim();
    if !rest.starts_with('{') {
        return None;
    }
    registry.lookup(name)?;
    Some(ActionDecision {
        tool_name: name.to_string(),
        reasoning: "Direct invocation by the user.".into(),
        arguments_json: rest.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_error_text;
    use crate::test_support::TestVault;
    use crate::types::TaskStatus;

    fn registry(tv: &TestVault) -> ToolRegistry {
        ToolRegistry::new(tv.vault.clone(), tv.config.search.clone())
    }

    fn decision(tool: &str, args: &str) -> ActionDecision {
        ActionDecision {
            tool_name: tool.into(),
            reasoning: "test".into(),
            arguments_json: args.into(),
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let tv = TestVault::new();
        let result = registry(&tv)
            .execute(&decision("delete_universe", "{}"))
            .await;

        assert!(!result.is_success());
        assert_eq!(result.error_kind(), Some("tool_not_found"));
        assert!(is_error_text(&result.render()));
        assert!(result.render().contains("delete_universe"));
    }

    #[test]
    fn bad_arguments_are_parse_errors() {
        let tv = TestVault::new();
        let reg = registry(&tv);

        let err = reg.validate(&decision("read_file", "{not json")).unwrap_err();
        assert_eq!(err.kind(), "argument_parse_error");

        let err = reg
            .validate(&decision("read_file", r#"{"path":"a","extra":1}"#))
            .unwrap_err();
        assert_eq!(err.kind(), "argument_parse_error");

        let err = reg.validate(&decision("read_file", "")).unwrap_err();
        assert_eq!(err.kind(), "argument_parse_error");
    }

    #[test]
    fn blank_arguments_mean_empty_object() {
        let tv = TestVault::new();
        let call = registry(&tv)
            .validate(&decision("read_task_queue", "  "))
            .unwrap();
        assert_eq!(call, ToolCall::ReadTaskQueue(NoArgs {}));

        let call = registry(&tv)
            .validate(&decision("get_latest_journal_entry", "null"))
            .unwrap();
        assert_eq!(
            call,
            ToolCall::GetLatestJournalEntry(LatestJournalArgs { full: false })
        );
    }

    #[test]
    fn disabled_tools_are_not_found() {
        let tv = TestVault::new();
        let reg = ToolRegistry::with_tools(
            tv.vault.clone(),
            tv.config.search.clone(),
            &[ToolName::ReadFile],
        );
        assert!(reg.lookup("read_file").is_some());
        let err = reg.validate(&decision("write_file", "{}")).unwrap_err();
        assert_eq!(err.kind(), "tool_not_found");
        assert_eq!(reg.definitions().len(), 1);
    }

    #[tokio::test]
    async fn read_file_maps_io_shapes() {
        let tv = TestVault::new();
        let reg = registry(&tv);

        let ok = reg
            .execute(&decision("read_file", r#"{"path":"src/lib.rs"}"#))
            .await;
        assert!(ok.render().contains("pub fn run_cycle"));

        let missing = reg
            .execute(&decision("read_file", r#"{"path":"Knowledge/none.md"}"#))
            .await;
        assert_eq!(missing.error_kind(), Some("not_found"));

        let dir = reg
            .execute(&decision("read_file", r#"{"path":"Knowledge"}"#))
            .await;
        assert_eq!(dir.error_kind(), Some("is_a_directory"));

        let escape = reg
            .execute(&decision("read_file", r#"{"path":"../../etc/passwd"}"#))
            .await;
        assert_eq!(escape.error_kind(), Some("sandbox_violation"));
    }

    #[tokio::test]
    async fn write_file_respects_allow_list_and_overwrite() {
        let tv = TestVault::new();
        let reg = registry(&tv);

        let denied = reg
            .execute(&decision(
                "write_file",
                r#"{"path":"src/lib.rs","content":"x"}"#,
            ))
            .await;
        assert_eq!(denied.error_kind(), Some("sandbox_violation"));

        let created = reg
            .execute(&decision(
                "write_file",
                r#"{"path":"Knowledge/notes.md","content":"a\nb\n"}"#,
            ))
            .await;
        assert!(created.is_success(), "{}", created.render());
        assert_eq!(tv.read("Knowledge/notes.md"), "a\nb\n");

        let refused = reg
            .execute(&decision(
                "write_file",
                r#"{"path":"Knowledge/notes.md","content":"c\n"}"#,
            ))
            .await;
        assert_eq!(refused.error_kind(), Some("already_exists"));

        let replaced = reg
            .execute(&decision(
                "write_file",
                r#"{"path":"Knowledge/notes.md","content":"a\nc\n","overwrite":true}"#,
            ))
            .await;
        assert!(replaced.render().contains("(+1 -1 lines)"), "{}", replaced.render());
    }

    #[tokio::test]
    async fn list_files_requires_directory() {
        let tv = TestVault::new();
        let reg = registry(&tv);

        let listing = reg
            .execute(&decision("list_files", r#"{"path":"."}"#))
            .await;
        let names: Vec<String> = serde_json::from_str(&listing.render()).unwrap();
        assert!(names.contains(&"0-Core/".to_string()));
        assert!(names.contains(&"3-Task_Queue.md".to_string()));

        let not_dir = reg
            .execute(&decision("list_files", r#"{"path":"3-Task_Queue.md"}"#))
            .await;
        assert_eq!(not_dir.error_kind(), Some("not_a_directory"));
    }

    #[tokio::test]
    async fn search_code_reports_matches() {
        let tv = TestVault::new();
        let result = registry(&tv)
            .execute(&decision("search_code", r#"{"query":"run_cycle"}"#))
            .await;
        let hits: Vec<serde_json::Value> = serde_json::from_str(&result.render()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["file"], "src/lib.rs");
        assert_eq!(hits[0]["line"], 2);
    }

    #[tokio::test]
    async fn task_tools_round_trip_through_the_queue() {
        let tv = TestVault::new();
        let reg = registry(&tv);

        let updated = reg
            .execute(&decision(
                "update_task_queue",
                r#"{"tasks":[{"id":"T1","status":"todo","description":"Write docs"},
                             {"id":"T2","status":"done","description":"Boot"}]}"#,
            ))
            .await;
        assert!(updated.is_success(), "{}", updated.render());
        assert!(updated.render().contains("+- [ ] T1: Write docs"));

        let read = reg.execute(&decision("read_task_queue", "{}")).await;
        assert!(read.render().contains(r#""id":"T1""#));

        let pinned = reg
            .execute(&decision("set_current_task", r#"{"task_id":"T1"}"#))
            .await;
        assert!(pinned.is_success());
        assert_eq!(tv.vault.current_task().unwrap(), "T1: Write docs");

        let done_pin = reg
            .execute(&decision("set_current_task", r#"{"task_id":"T2"}"#))
            .await;
        assert!(!done_pin.is_success());

        let completed = reg
            .execute(&decision("complete_task", r#"{"task_id":"T1"}"#))
            .await;
        assert!(completed.render().contains("cleared"));
        assert_eq!(tv.vault.current_task().unwrap(), "");
        let tasks = tv.vault.tasks().read().unwrap();
        assert_eq!(tasks[0].status, TaskStatus::Done);

        let missing = reg
            .execute(&decision("complete_task", r#"{"task_id":"T9"}"#))
            .await;
        assert_eq!(missing.error_kind(), Some("not_found"));
    }

    #[tokio::test]
    async fn update_task_queue_normalizes_or_rejects_lossy_tasks() {
        let tv = TestVault::new();
        let reg = registry(&tv);

        let padded = reg
            .execute(&decision(
                "update_task_queue",
                r#"{"tasks":[{"id":" T2 ","status":"todo","description":"  padded\n text "}]}"#,
            ))
            .await;
        assert!(padded.is_success(), "{}", padded.render());
        assert_eq!(
            tv.vault.tasks().read().unwrap(),
            vec![crate::types::Task::todo("T2", "padded text")]
        );

        let empty = reg
            .execute(&decision(
                "update_task_queue",
                r#"{"tasks":[{"id":"T1","status":"todo","description":" "}]}"#,
            ))
            .await;
        assert_eq!(empty.error_kind(), Some("argument_parse_error"));
        assert_eq!(tv.vault.tasks().read().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn journal_tools_share_the_store() {
        let tv = TestVault::new();
        let reg = registry(&tv);

        let empty = reg
            .execute(&decision("get_latest_journal_entry", "{}"))
            .await;
        assert_eq!(empty.render(), crate::vault::journal::NO_ENTRIES);

        let wrote = reg
            .execute(&decision("write_journal", r#"{"content":"Observed a thing."}"#))
            .await;
        assert!(wrote.is_success());
        assert_eq!(tv.journal_files().len(), 1);

        let full = reg
            .execute(&decision("get_latest_journal_entry", r#"{"full":true}"#))
            .await;
        assert!(full.render().contains("Observed a thing."));
    }

    #[test]
    fn direct_invocation_needs_known_tool_and_object() {
        let tv = TestVault::new();
        let reg = registry(&tv);

        let d = parse_direct_invocation(r#"read_file {"path":"src/lib.rs"}"#, &reg).unwrap();
        assert_eq!(d.tool_name, "read_file");
        assert_eq!(d.arguments_json, r#"{"path":"src/lib.rs"}"#);

        assert!(parse_direct_invocation("what is in src?", &reg).is_none());
        assert!(parse_direct_invocation(r#"nuke {"all":true}"#, &reg).is_none());
        assert!(parse_direct_invocation("read_task_queue", &reg).is_none());
    }
}
