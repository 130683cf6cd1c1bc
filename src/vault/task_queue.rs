//! Task queue store backed by `3-Task_Queue.md`.
//!
//! Format: a `# Task Queue` heading followed by one checklist line per task,
//! `- [ ] <id>: <description>` or `- [x] <id>: <description>`. Blank lines and
//! `#` lines are skipped on read. Writes always replace the whole file.

use crate::sandbox::Sandbox;
use crate::types::{Task, TaskStatus};
use crate::vault::{read_optional, write_atomic, TASK_QUEUE_FILE};
use anyhow::{bail, Result};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

pub const HEADING: &str = "# Task Queue";

static TASK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-\s*\[([xX ])\]\s*([^\s:]+):\s*(.+)$").expect("task line pattern is valid")
});

static CANONICAL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^T\d+$").expect("task id pattern is valid"));

#[derive(Debug, Clone)]
pub struct TaskQueue {
    sandbox: Arc<Sandbox>,
}

impl TaskQueue {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }

    /// Current tasks in file order; a missing file is an empty queue.
    pub fn read(&self) -> Result<Vec<Task>> {
        let path = self.sandbox.resolve(TASK_QUEUE_FILE)?;
        Ok(read_optional(&path)?
            .map(|text| parse_tasks(&text))
            .unwrap_or_default())
    }

    /// Raw file text, for diffing.
    pub fn read_raw(&self) -> Result<String> {
        let path = self.sandbox.resolve(TASK_QUEUE_FILE)?;
        Ok(read_optional(&path)?.unwrap_or_default())
    }

    /// Replace the whole queue. Rejects any task that would not read back
    /// exactly as given.
    pub fn write(&self, tasks: &[Task]) -> Result<()> {
        for task in tasks {
            if let Some(problem) = check_task(task) {
                bail!("Refusing to write task queue: {}", problem);
            }
        }
        let path = self.sandbox.resolve(TASK_QUEUE_FILE)?;
        debug!("Writing {} tasks to {}", tasks.len(), TASK_QUEUE_FILE);
        write_atomic(&path, &render_tasks(tasks))
    }

    /// Append descriptions as new todo tasks with fresh `T<n>` ids.
    pub fn append_todos(&self, descriptions: &[String]) -> Result<Vec<Task>> {
        let mut tasks = self.read()?;
        let mut next = next_numeric_id(&tasks);
        let mut added = Vec::new();
        for description in descriptions {
            let description = single_line(description);
            if description.is_empty() {
                continue;
            }
            let task = Task::todo(format!("T{}", next), description);
            next += 1;
            tasks.push(task.clone());
            added.push(task);
        }
        if !added.is_empty() {
            self.write(&tasks)?;
        }
        Ok(added)
    }
}

/// Parse checklist text into tasks, skipping anything that is not a task line.
pub fn parse_tasks(text: &str) -> Vec<Task> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let caps = TASK_LINE.captures(line)?;
            let id = caps[2].to_string();
            if !CANONICAL_ID.is_match(&id) {
                warn!("Task id '{}' does not follow the T<digits> convention", id);
            }
            let status = if caps[1].eq_ignore_ascii_case("x") {
                TaskStatus::Done
            } else {
                TaskStatus::Todo
            };
            Some(Task {
                id,
                status,
                description: caps[3].trim().to_string(),
            })
        })
        .collect()
}

/// Render tasks under the queue heading. Descriptions are flattened to one line.
pub fn render_tasks(tasks: &[Task]) -> String {
    let mut out = String::from(HEADING);
    out.push_str("\n\n");
    for task in tasks {
        out.push_str(&normalize_task(task).to_string());
        out.push('\n');
    }
    out
}

/// Why `task` cannot be stored as a checklist line, if it cannot.
pub fn check_task(task: &Task) -> Option<String> {
    let id = &task.id;
    if id.is_empty() || id.contains(char::is_whitespace) || id.contains(':') {
        return Some(format!("invalid task id '{}'", id));
    }
    let description = &task.description;
    if description.trim().is_empty() {
        return Some(format!("task '{}' has an empty description", id));
    }
    if description.contains(['\n', '\r']) || description.trim() != description {
        return Some(format!(
            "task '{}' description must be one line without surrounding whitespace",
            id
        ));
    }
    None
}

/// Trim the id and flatten the description to one line.
pub fn normalize_task(task: &Task) -> Task {
    Task {
        id: task.id.trim().to_string(),
        status: task.status,
        description: single_line(&task.description),
    }
}

/// One past the largest numeric suffix among `T<digits>` ids.
pub fn next_numeric_id(tasks: &[Task]) -> u64 {
    tasks
        .iter()
        .filter_map(|t| t.id.strip_prefix('T')?.parse::<u64>().ok())
        .max()
        .map_or(1, |max| max + 1)
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestVault;

    #[test]
    fn parses_mixed_statuses_in_order() {
        let tasks = parse_tasks("# Task Queue\n\n- [ ] T1: Foo\n- [x] T2: Bar\n");
        assert_eq!(
            tasks,
            vec![
                Task {
                    id: "T1".into(),
                    status: TaskStatus::Todo,
                    description: "Foo".into()
                },
                Task {
                    id: "T2".into(),
                    status: TaskStatus::Done,
                    description: "Bar".into()
                },
            ]
        );
    }

    #[test]
    fn skips_comments_blank_lines_and_prose() {
        let text = "# Task Queue\n# a comment\n\nSome prose.\n  - [ ] T7: **CRITICAL** - fix it  \n";
        let tasks = parse_tasks(text);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "T7");
        assert_eq!(tasks[0].description, "**CRITICAL** - fix it");
    }

    #[test]
    fn accepts_non_canonical_ids() {
        let tasks = parse_tasks("- [X] setup-1: Install\n");
        assert_eq!(tasks[0].id, "setup-1");
        assert!(tasks[0].is_done());
    }

    #[test]
    fn render_matches_checklist_format() {
        let text = render_tasks(&[Task::todo("T1", "Foo"), Task::todo("T2", "multi\nline")]);
        assert_eq!(text, "# Task Queue\n\n- [ ] T1: Foo\n- [ ] T2: multi line\n");
    }

    #[test]
    fn write_then_read_preserves_order_and_fields() {
        let tv = TestVault::new();
        let tasks = vec![
            Task::todo("T3", "Third"),
            Task {
                id: "T1".into(),
                status: TaskStatus::Done,
                description: "First: with colon".into(),
            },
            Task::todo("T2", "Second"),
        ];

        tv.vault.tasks().write(&tasks).expect("write");
        assert_eq!(tv.vault.tasks().read().expect("read"), tasks);
    }

    #[test]
    fn write_rejects_tasks_that_would_not_read_back() {
        let tv = TestVault::new();
        let before = tv.read("3-Task_Queue.md");
        let lossy = [
            vec![Task::todo("T1", ""), Task::todo("T3", "ok")],
            vec![Task::todo("T2", "  padded  "), Task::todo("T3", "ok")],
            vec![Task::todo("T4", "two\nlines")],
            vec![Task::todo("T 5", "spaced id")],
            vec![Task::todo("T6:x", "colon id")],
        ];
        for tasks in &lossy {
            assert!(tv.vault.tasks().write(tasks).is_err(), "accepted {:?}", tasks);
        }
        assert_eq!(tv.read("3-Task_Queue.md"), before);

        let edge = vec![
            Task::todo("x-1", "a  b: c [ ] d"),
            Task::todo("T2", "#not a heading"),
        ];
        tv.vault.tasks().write(&edge).expect("write");
        assert_eq!(tv.vault.tasks().read().expect("read"), edge);
    }

    #[test]
    fn normalize_makes_tasks_storable() {
        let task = normalize_task(&Task::todo(" T2 ", "  padded\n  text "));
        assert_eq!(task, Task::todo("T2", "padded text"));
        assert_eq!(check_task(&task), None);
    }

    #[test]
    fn write_is_a_full_overwrite() {
        let tv = TestVault::new();
        tv.write("3-Task_Queue.md", "# Task Queue\n\n- [ ] T1: Old\n- [ ] T2: Older\n");

        tv.vault.tasks().write(&[Task::todo("T9", "Only")]).expect("write");
        assert_eq!(
            tv.vault.tasks().read().expect("read"),
            vec![Task::todo("T9", "Only")]
        );
    }

    #[test]
    fn missing_file_is_an_empty_queue() {
        let tv = TestVault::new();
        std::fs::remove_file(tv.vault_path("3-Task_Queue.md")).ok();
        assert!(tv.vault.tasks().read().expect("read").is_empty());
    }

    #[test]
    fn append_todos_continues_numbering() {
        let tv = TestVault::new();
        tv.write("3-Task_Queue.md", "# Task Queue\n\n- [x] T4: Done\n- [ ] misc: Other\n");

        let added = tv
            .vault
            .tasks()
            .append_todos(&["Write tests".into(), "   ".into(), "Refactor".into()])
            .expect("append");

        assert_eq!(
            added,
            vec![Task::todo("T5", "Write tests"), Task::todo("T6", "Refactor")]
        );
        assert_eq!(tv.vault.tasks().read().expect("read").len(), 4);
    }

    #[test]
    fn next_id_starts_at_one() {
        assert_eq!(next_numeric_id(&[]), 1);
    }
}
