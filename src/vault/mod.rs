//! Durable agent state kept as plain files in the vault.
//!
//! All paths go through the [`Sandbox`]; writes replace files atomically
//! (temp file + rename) so a crash never leaves a half-written file.

pub mod init;
pub mod journal;
pub mod task_queue;

pub use journal::{EntryId, Journal};
pub use task_queue::TaskQueue;

use crate::config::JournalConfig;
use crate::sandbox::Sandbox;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub const CORE_DIR: &str = "0-Core";
pub const INBOX_DIR: &str = "1-Inbox";
pub const JOURNAL_DIR: &str = "2-Journal";
pub const TASK_QUEUE_FILE: &str = "3-Task_Queue.md";
pub const MAILBOX_FILE: &str = "4-Async_Mailbox.md";
pub const CURRENT_TASK_FILE: &str = "5-Current_Task.md";
pub const KNOWLEDGE_DIR: &str = "Knowledge";

/// A static identity document from `0-Core/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityDoc {
    pub name: String,
    pub content: String,
}

/// Handle over the vault's stores.
#[derive(Debug, Clone)]
pub struct Vault {
    sandbox: Arc<Sandbox>,
    journal: Journal,
    tasks: TaskQueue,
}

impl Vault {
    pub fn new(sandbox: Arc<Sandbox>, journal_config: &JournalConfig) -> Self {
        Self {
            journal: Journal::new(sandbox.clone(), journal_config),
            tasks: TaskQueue::new(sandbox.clone()),
            sandbox,
        }
    }

    pub fn sandbox(&self) -> &Arc<Sandbox> {
        &self.sandbox
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    /// Markdown documents under `0-Core/`, sorted by file name.
    pub fn identity_documents(&self) -> Result<Vec<IdentityDoc>> {
        let dir = self.sandbox.resolve(CORE_DIR)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = fs::read_dir(&dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".md"))
            .collect();
        names.sort();

        let mut docs = Vec::with_capacity(names.len());
        for name in names {
            let path = self.sandbox.resolve(&format!("{}/{}", CORE_DIR, name))?;
            let content = read_lossy(&path)?;
            docs.push(IdentityDoc { name, content });
        }
        Ok(docs)
    }

    /// Free-text user notes; empty when the file is absent.
    pub fn mailbox(&self) -> Result<String> {
        Ok(read_optional(&self.sandbox.resolve(MAILBOX_FILE)?)?.unwrap_or_default())
    }

    /// The pinned active task, trimmed; empty when nothing is pinned.
    pub fn current_task(&self) -> Result<String> {
        let text = read_optional(&self.sandbox.resolve(CURRENT_TASK_FILE)?)?;
        Ok(text.map(|t| t.trim().to_string()).unwrap_or_default())
    }

    pub fn set_current_task(&self, text: &str) -> Result<()> {
        write_atomic(&self.sandbox.resolve(CURRENT_TASK_FILE)?, text)
    }

    pub fn clear_current_task(&self) -> Result<()> {
        self.set_current_task("")
    }
}

/// Read a file as text, replacing invalid UTF-8 instead of failing.
pub(crate) fn read_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read a file lossily, treating absence as `None`.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Atomically replace `path` with `contents` (temp file + rename).
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;

    let file_name = path
        .file_name()
        .with_context(|| format!("path missing file name {}", path.display()))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);

    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
