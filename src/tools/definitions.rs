//! Tool definitions shown to the planner.

use super::ToolName;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Definition of a tool exposed to the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Definition for one capability.
pub fn definition(tool: ToolName) -> ToolDefinition {
    let (description, parameters) = match tool {
        ToolName::ListFiles => (
            "List the entries of a directory inside the sandbox.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Sandbox-relative directory, e.g. 'Knowledge' or 'src'"
                    }
                },
                "required": ["path"]
            }),
        ),
        ToolName::ReadFile => (
            "Read a text file inside the sandbox.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Sandbox-relative file path"
                    }
                },
                "required": ["path"]
            }),
        ),
        ToolName::WriteFile => (
            "Write a text file under a writable vault folder.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Sandbox-relative file path"
                    },
                    "content": {
                        "type": "string",
                        "description": "Full file content"
                    },
                    "overwrite": {
                        "type": "boolean",
                        "description": "Replace an existing file (default false)"
                    }
                },
                "required": ["path", "content"]
            }),
        ),
        ToolName::SearchCode => (
            "Search the agent's source code for a literal string.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Case-sensitive text to look for"
                    }
                },
                "required": ["query"]
            }),
        ),
        ToolName::WriteJournal => (
            "Append a free-form note to the journal.",
            json!({
                "type": "object",
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "Markdown note"
                    }
                },
                "required": ["content"]
            }),
        ),
        ToolName::GetLatestJournalEntry => (
            "Read the latest journal entry, summarized unless full is set.",
            json!({
                "type": "object",
                "properties": {
                    "full": {
                        "type": "boolean",
                        "description": "Return the whole entry (default false)"
                    }
                }
            }),
        ),
        ToolName::ReadTaskQueue => (
            "Read the task queue as a JSON array.",
            json!({ "type": "object", "properties": {} }),
        ),
        ToolName::UpdateTaskQueue => (
            "Replace the whole task queue.",
            json!({
                "type": "object",
                "properties": {
                    "tasks": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": { "type": "string" },
                                "status": { "type": "string", "enum": ["todo", "done"] },
                                "description": { "type": "string" }
                            },
                            "required": ["id", "status", "description"]
                        }
                    }
                },
                "required": ["tasks"]
            }),
        ),
        ToolName::SetCurrentTask => (
            "Pin a todo task as the current task.",
            json!({
                "type": "object",
                "properties": {
                    "task_id": { "type": "string", "description": "Task id, e.g. T3" }
                },
                "required": ["task_id"]
            }),
        ),
        ToolName::CompleteTask => (
            "Mark a task as done.",
            json!({
                "type": "object",
                "properties": {
                    "task_id": { "type": "string", "description": "Task id, e.g. T3" }
                },
                "required": ["task_id"]
            }),
        ),
        ToolName::AnswerUser => (
            "Answer the user directly.",
            json!({
                "type": "object",
                "properties": {
                    "answer": { "type": "string", "description": "The answer text" }
                },
                "required": ["answer"]
            }),
        ),
    };

    ToolDefinition {
        name: tool.as_str().into(),
        description: description.into(),
        parameters,
    }
}

/// Render definitions as a plain-text catalog for the planner prompt.
pub fn render_catalog(definitions: &[ToolDefinition]) -> String {
    definitions
        .iter()
        .map(|d| format!("- {}: {}\n  arguments: {}", d.name, d.description, d.parameters))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tool_has_an_object_schema() {
        for tool in ToolName::ALL {
            let def = definition(tool);
            assert_eq!(def.name, tool.as_str());
            assert_eq!(def.parameters["type"], "object");
        }
    }

    #[test]
    fn catalog_lists_names() {
        let defs = vec![definition(ToolName::ReadFile), definition(ToolName::AnswerUser)];
        let catalog = render_catalog(&defs);
        assert!(catalog.starts_with("- read_file: "));
        assert!(catalog.contains("- answer_user: "));
    }
}
