//! Capabilities over the vault's own stores: journal, task queue, current task.

use crate::error::ToolError;
use crate::types::{Task, TaskStatus};
use crate::vault::journal::NO_ENTRIES;
use crate::vault::task_queue::{check_task, normalize_task};
use crate::vault::Vault;
use similar::TextDiff;

pub(super) fn write_journal(vault: &Vault, content: &str) -> Result<String, ToolError> {
    if content.trim().is_empty() {
        return Err(ToolError::Execution("journal note must not be empty".into()));
    }
    let text = format!(
        "# Journal Note: {}\n\n{}\n",
        chrono::Utc::now().to_rfc3339(),
        content.trim_end()
    );
    let id = vault.journal().append("note", &text)?;
    Ok(format!("Success: Journal entry '{}' written.", id))
}

pub(super) fn latest_journal_entry(vault: &Vault, full: bool) -> Result<String, ToolError> {
    Ok(vault
        .journal()
        .latest(full)?
        .unwrap_or_else(|| NO_ENTRIES.to_string()))
}

pub(super) fn read_task_queue(vault: &Vault) -> Result<String, ToolError> {
    let tasks = vault.tasks().read()?;
    serde_json::to_string(&tasks).map_err(|e| ToolError::Execution(e.to_string()))
}

pub(super) fn update_task_queue(vault: &Vault, tasks: &[Task]) -> Result<String, ToolError> {
    let tasks: Vec<Task> = tasks.iter().map(normalize_task).collect();
    if let Some(problem) = tasks.iter().find_map(check_task) {
        return Err(ToolError::ArgumentParse {
            tool: "update_task_queue".into(),
            message: problem,
        });
    }

    let before = vault.tasks().read_raw()?;
    vault.tasks().write(&tasks)?;
    let after = vault.tasks().read_raw()?;

    let diff = TextDiff::from_lines(&before, &after)
        .unified_diff()
        .context_radius(1)
        .header("before", "after")
        .to_string();
    let diff = if diff.is_empty() {
        "(no changes)".to_string()
    } else {
        diff
    };
    Ok(format!(
        "Success: Task queue updated with {} tasks.\n{}",
        tasks.len(),
        diff
    ))
}

pub(super) fn set_current_task(vault: &Vault, task_id: &str) -> Result<String, ToolError> {
    let task_id = task_id.trim();
    let tasks = vault.tasks().read()?;
    let task = tasks
        .iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| ToolError::NotFound(format!("task {}", task_id)))?;
    if task.is_done() {
        return Err(ToolError::Execution(format!(
            "task {} is already done",
            task_id
        )));
    }

    let pointer = format!("{}: {}", task.id, task.description);
    vault.set_current_task(&pointer)?;
    Ok(format!("Success: Current task set to {}", pointer))
}

pub(super) fn complete_task(vault: &Vault, task_id: &str) -> Result<String, ToolError> {
    let task_id = task_id.trim();
    let mut tasks = vault.tasks().read()?;
    let task = tasks
        .iter_mut()
        .find(|t| t.id == task_id)
        .ok_or_else(|| ToolError::NotFound(format!("task {}", task_id)))?;
    task.status = TaskStatus::Done;
    vault.tasks().write(&tasks)?;

    let current = vault.current_task()?;
    let pinned = current == task_id || current.starts_with(&format!("{}:", task_id));
    if pinned {
        vault.clear_current_task()?;
        Ok(format!(
            "Success: Task {} marked done. Current task cleared.",
            task_id
        ))
    } else {
        Ok(format!("Success: Task {} marked done.", task_id))
    }
}

pub(super) fn answer_user(answer: String) -> Result<String, ToolError> {
    if answer.trim().is_empty() {
        return Err(ToolError::Execution("answer must not be empty".into()));
    }
    Ok(answer)
}
