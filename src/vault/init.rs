//! Vault initialisation: create the runtime layout without touching
//! anything that already exists.

use crate::vault::{
    CORE_DIR, CURRENT_TASK_FILE, INBOX_DIR, JOURNAL_DIR, KNOWLEDGE_DIR, MAILBOX_FILE,
    TASK_QUEUE_FILE,
};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

const INITIAL_TASK_QUEUE: &str = "# Task Queue

- [ ] T1: Read the constitution in 0-Core and summarise it into Knowledge/identity.md.
- [ ] T2: Survey the agent source with search_code and note its modules in Knowledge/architecture.md.
";

const INITIAL_MAILBOX: &str = "# Asynchronous Mailbox

Leave non-urgent notes for the agent here. It reads this file at the start of every cycle.
";

const INITIAL_CONSTITUTION: &str = "# Constitution

1. Act only through the registered tools, one action per cycle.
2. Never attempt to reach outside the vault or the code root.
3. Record every failure honestly; fixing a recorded failure comes first.
4. Answer the user directly when asked; otherwise work the task queue.
";

/// What `initialize_vault` created.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub created: Vec<String>,
}

/// Create missing directories and seed missing files.
pub fn initialize_vault(vault_root: &Path) -> Result<InitReport> {
    let mut report = InitReport::default();

    if !vault_root.exists() {
        std::fs::create_dir_all(vault_root)
            .with_context(|| format!("Failed to create vault at {}", vault_root.display()))?;
        report.created.push(".".into());
    }

    for dir in [CORE_DIR, INBOX_DIR, JOURNAL_DIR, KNOWLEDGE_DIR] {
        let path = vault_root.join(dir);
        if !path.exists() {
            std::fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            info!("Created vault directory '{}'", dir);
            report.created.push(dir.into());
        }
    }

    let constitution = format!("{}/Constitution.md", CORE_DIR);
    let seeds: [(&str, &str); 4] = [
        (TASK_QUEUE_FILE, INITIAL_TASK_QUEUE),
        (MAILBOX_FILE, INITIAL_MAILBOX),
        (CURRENT_TASK_FILE, ""),
        (constitution.as_str(), INITIAL_CONSTITUTION),
    ];
    for (name, contents) in seeds {
        let path = vault_root.join(name);
        if !path.exists() {
            std::fs::write(&path, contents)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            info!("Created vault file '{}'", name);
            report.created.push(name.into());
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::task_queue::parse_tasks;

    #[test]
    fn creates_full_layout_in_empty_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let vault = temp.path().join("vault");

        let report = initialize_vault(&vault).expect("init");

        for dir in ["0-Core", "1-Inbox", "2-Journal", "Knowledge"] {
            assert!(vault.join(dir).is_dir(), "{dir} missing");
        }
        assert!(vault.join("5-Current_Task.md").is_file());
        assert!(report.created.contains(&"3-Task_Queue.md".to_string()));
        let queue = std::fs::read_to_string(vault.join("3-Task_Queue.md")).expect("queue");
        assert_eq!(parse_tasks(&queue).len(), 2);
    }

    #[test]
    fn never_overwrites_existing_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let vault = temp.path();
        std::fs::write(vault.join("3-Task_Queue.md"), "# Task Queue\n\n- [x] T1: Mine\n")
            .expect("seed");

        initialize_vault(vault).expect("first");
        let second = initialize_vault(vault).expect("second");

        assert!(second.created.is_empty());
        let queue = std::fs::read_to_string(vault.join("3-Task_Queue.md")).expect("queue");
        assert!(queue.contains("T1: Mine"));
    }
}
