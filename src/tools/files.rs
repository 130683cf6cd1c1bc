//! Filesystem capabilities. Every path goes through the sandbox first.

use super::WriteFileArgs;
use crate::config::SearchConfig;
use crate::error::ToolError;
use crate::sandbox::{RootKind, Sandbox};
use crate::vault::write_atomic;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

pub(super) fn list_files(sandbox: &Sandbox, path: &str) -> Result<String, ToolError> {
    let dir = sandbox.resolve(path)?;
    if !dir.is_dir() {
        return Err(ToolError::NotADirectory(path.to_string()));
    }

    let mut names: Vec<String> = fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            if e.path().is_dir() {
                format!("{}/", name)
            } else {
                name
            }
        })
        .collect();
    names.sort();

    serde_json::to_string(&names).map_err(|e| ToolError::Execution(e.to_string()))
}

pub(super) fn read_file(sandbox: &Sandbox, path: &str) -> Result<String, ToolError> {
    let file = sandbox.resolve(path)?;
    if file.is_dir() {
        return Err(ToolError::IsADirectory(path.to_string()));
    }
    if !file.exists() {
        return Err(ToolError::NotFound(path.to_string()));
    }
    let bytes = fs::read(&file)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub(super) fn write_file(sandbox: &Sandbox, args: &WriteFileArgs) -> Result<String, ToolError> {
    let file = sandbox.resolve_for_write(&args.path)?;
    if file.is_dir() {
        return Err(ToolError::IsADirectory(args.path.clone()));
    }

    let previous = if file.exists() {
        if !args.overwrite {
            return Err(ToolError::AlreadyExists(args.path.clone()));
        }
        Some(fs::read_to_string(&file)?)
    } else {
        None
    };

    write_atomic(&file, &args.content)?;

    let bytes = args.content.len();
    Ok(match previous {
        Some(old) => {
            let (added, removed) = line_changes(&old, &args.content);
            format!(
                "Success: Wrote {} bytes to '{}' (+{} -{} lines).",
                bytes, args.path, added, removed
            )
        }
        None => format!("Success: Wrote {} bytes to '{}'.", bytes, args.path),
    })
}

fn line_changes(old: &str, new: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(old, new);
    diff.iter_all_changes()
        .fold((0, 0), |(added, removed), change| match change.tag() {
            ChangeTag::Insert => (added + 1, removed),
            ChangeTag::Delete => (added, removed + 1),
            ChangeTag::Equal => (added, removed),
        })
}

#[derive(Debug, Serialize)]
struct SearchHit {
    file: String,
    line: usize,
    content: String,
}

/// Literal search over the code root's mapped entries.
pub(super) async fn search_code(
    sandbox: Arc<Sandbox>,
    config: SearchConfig,
    query: String,
) -> Result<String, ToolError> {
    if query.trim().is_empty() {
        return Err(ToolError::ArgumentParse {
            tool: "search_code".into(),
            message: "query must not be empty".into(),
        });
    }

    let hits = tokio::task::spawn_blocking(move || search_blocking(&sandbox, &config, &query))
        .await
        .map_err(|e| ToolError::Execution(format!("search task failed: {}", e)))?;

    serde_json::to_string_pretty(&hits).map_err(|e| ToolError::Execution(e.to_string()))
}

fn search_blocking(sandbox: &Sandbox, config: &SearchConfig, query: &str) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    for entry in sandbox.root_map().entries_for(RootKind::Code) {
        let root = match sandbox.resolve(entry) {
            Ok(root) => root,
            Err(e) => {
                debug!("Skipping code entry '{}': {}", entry, e);
                continue;
            }
        };
        if !root.exists() {
            continue;
        }

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir()
                    && config
                        .skip_dirs
                        .iter()
                        .any(|skip| e.file_name().to_string_lossy() == skip.as_str()))
            });

        for file in walker.filter_map(|e| e.ok()) {
            if !file.file_type().is_file() || !has_extension(file.path(), &config.extensions) {
                continue;
            }
            let Ok(text) = fs::read_to_string(file.path()) else {
                continue;
            };
            let display = sandbox
                .relative_display(file.path())
                .unwrap_or_else(|| file.path().display().to_string());

            for (idx, line) in text.lines().enumerate() {
                if line.contains(query) {
                    hits.push(SearchHit {
                        file: display.clone(),
                        line: idx + 1,
                        content: line.trim().to_string(),
                    });
                    if hits.len() >= config.max_results {
                        return hits;
                    }
                }
            }
        }
    }

    hits
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.trim_start_matches('.') == ext))
}
