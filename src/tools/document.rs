use super::traits::LocalTool;
use super::types::ToolResult;
use crate::error::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Root of the private document namespace.
pub const MEMORY_ROOT: &str = "/memories";

const TOOL_NAME: &str = "memory";

/// One command of the document protocol, parsed from the tool-use payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DocumentCommand {
    View {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        view_range: Option<(usize, usize)>,
    },
    Create {
        path: String,
        file_text: String,
    },
    #[serde(alias = "str_replace")]
    Replace {
        path: String,
        old_str: String,
        new_str: String,
    },
    Insert {
        path: String,
        insert_line: usize,
        insert_text: String,
    },
    Delete {
        path: String,
    },
    Rename {
        old_path: String,
        new_path: String,
    },
}

impl DocumentCommand {
    pub fn parse(args: Value) -> Result<Self, ToolError> {
        serde_json::from_value(args).map_err(|e| ToolError::InvalidInput {
            name: TOOL_NAME.to_string(),
            message: e.to_string(),
        })
    }
}

/// Storage behind the document protocol. Every path is confined to
/// [`MEMORY_ROOT`].
pub trait DocumentSandbox: Send + Sync {
    fn view(&self, path: &str, range: Option<(usize, usize)>) -> Result<String, ToolError>;

    fn create(&self, path: &str, text: &str) -> Result<String, ToolError>;

    fn replace(&self, path: &str, old: &str, new: &str) -> Result<String, ToolError>;

    fn insert(&self, path: &str, line: usize, text: &str) -> Result<String, ToolError>;

    fn delete(&self, path: &str) -> Result<String, ToolError>;

    fn rename(&self, from: &str, to: &str) -> Result<String, ToolError>;

    fn apply(&self, command: &DocumentCommand) -> Result<String, ToolError> {
        match command {
            DocumentCommand::View { path, view_range } => self.view(path, *view_range),
            DocumentCommand::Create { path, file_text } => self.create(path, file_text),
            DocumentCommand::Replace {
                path,
                old_str,
                new_str,
            } => self.replace(path, old_str, new_str),
            DocumentCommand::Insert {
                path,
                insert_line,
                insert_text,
            } => self.insert(path, *insert_line, insert_text),
            DocumentCommand::Delete { path } => self.delete(path),
            DocumentCommand::Rename { old_path, new_path } => self.rename(old_path, new_path),
        }
    }
}

/// Validate a namespace path and strip any trailing slash.
pub fn normalize_path(path: &str) -> Result<String, ToolError> {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed == MEMORY_ROOT {
        return Ok(trimmed.to_string());
    }
    let Some(rest) = trimmed.strip_prefix(MEMORY_ROOT).and_then(|r| r.strip_prefix('/')) else {
        return Err(ToolError::Sandbox(format!(
            "path {path} is outside {MEMORY_ROOT}"
        )));
    };
    if rest
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(ToolError::Sandbox(format!("path {path} is not canonical")));
    }
    Ok(trimmed.to_string())
}

fn is_under(key: &str, dir: &str) -> bool {
    key.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
}

/// Process-local document store.
#[derive(Debug, Default)]
pub struct MemorySandbox {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemorySandbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read(&self, path: &str) -> Option<String> {
        let path = normalize_path(path).ok()?;
        self.lock().get(&path).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn not_found(path: &str) -> ToolError {
    ToolError::Sandbox(format!("{path} does not exist"))
}

impl DocumentSandbox for MemorySandbox {
    fn view(&self, path: &str, range: Option<(usize, usize)>) -> Result<String, ToolError> {
        let path = normalize_path(path)?;
        let files = self.lock();

        if let Some(text) = files.get(&path) {
            let lines: Vec<&str> = text.lines().collect();
            let (start, end) = match range {
                Some((start, end)) => (start.max(1), end.min(lines.len())),
                None => (1, lines.len()),
            };
            if start > end && !lines.is_empty() {
                return Err(ToolError::Sandbox(format!(
                    "invalid view range {start}..{end} for {path}"
                )));
            }
            let body = lines
                .iter()
                .enumerate()
                .skip(start - 1)
                .take(end.saturating_sub(start - 1))
                .map(|(index, line)| format!("{:>6}\t{line}", index + 1))
                .collect::<Vec<_>>()
                .join("\n");
            return Ok(body);
        }

        let entries: Vec<&str> = files
            .keys()
            .filter(|key| is_under(key, &path))
            .map(String::as_str)
            .collect();
        if entries.is_empty() && path != MEMORY_ROOT {
            return Err(not_found(&path));
        }
        let mut listing = format!("Directory: {path}");
        for entry in entries {
            listing.push_str("\n- ");
            listing.push_str(entry);
        }
        Ok(listing)
    }

    fn create(&self, path: &str, text: &str) -> Result<String, ToolError> {
        let path = normalize_path(path)?;
        if path == MEMORY_ROOT {
            return Err(ToolError::Sandbox("cannot write to the namespace root".into()));
        }
        let mut files = self.lock();
        if files.keys().any(|key| is_under(key, &path)) {
            return Err(ToolError::Sandbox(format!("{path} is a directory")));
        }
        files.insert(path.clone(), text.to_string());
        Ok(format!("File created successfully at {path}"))
    }

    fn replace(&self, path: &str, old: &str, new: &str) -> Result<String, ToolError> {
        let path = normalize_path(path)?;
        if old.is_empty() {
            return Err(ToolError::Sandbox("replacement target is empty".into()));
        }
        let mut files = self.lock();
        let text = files.get_mut(&path).ok_or_else(|| not_found(&path))?;
        match text.matches(old).count() {
            0 => Err(ToolError::Sandbox(format!("text not found in {path}"))),
            1 => {
                *text = text.replacen(old, new, 1);
                Ok(format!("Replaced text in {path}"))
            }
            n => Err(ToolError::Sandbox(format!(
                "text appears {n} times in {path}; it must be unique"
            ))),
        }
    }

    fn insert(&self, path: &str, line: usize, text: &str) -> Result<String, ToolError> {
        let path = normalize_path(path)?;
        let mut files = self.lock();
        let current = files.get_mut(&path).ok_or_else(|| not_found(&path))?;
        let mut lines: Vec<&str> = current.lines().collect();
        if line > lines.len() {
            return Err(ToolError::Sandbox(format!(
                "line {line} is past the end of {path} ({} lines)",
                lines.len()
            )));
        }
        let trailing_newline = current.ends_with('\n');
        lines.splice(line..line, text.lines());
        let mut updated = lines.join("\n");
        if trailing_newline {
            updated.push('\n');
        }
        *current = updated;
        Ok(format!("Inserted text at line {line} of {path}"))
    }

    fn delete(&self, path: &str) -> Result<String, ToolError> {
        let path = normalize_path(path)?;
        if path == MEMORY_ROOT {
            return Err(ToolError::Sandbox("cannot delete the namespace root".into()));
        }
        let mut files = self.lock();
        if files.remove(&path).is_some() {
            return Ok(format!("Deleted {path}"));
        }
        let before = files.len();
        files.retain(|key, _| !is_under(key, &path));
        if files.len() == before {
            return Err(not_found(&path));
        }
        Ok(format!("Deleted {path}"))
    }

    fn rename(&self, from: &str, to: &str) -> Result<String, ToolError> {
        let from = normalize_path(from)?;
        let to = normalize_path(to)?;
        if from == MEMORY_ROOT || to == MEMORY_ROOT {
            return Err(ToolError::Sandbox("cannot rename the namespace root".into()));
        }
        let mut files = self.lock();
        if files.contains_key(&to) || files.keys().any(|key| is_under(key, &to)) {
            return Err(ToolError::Sandbox(format!("{to} already exists")));
        }

        let moved: Vec<String> = files
            .keys()
            .filter(|key| **key == from || is_under(key, &from))
            .cloned()
            .collect();
        if moved.is_empty() {
            return Err(not_found(&from));
        }
        for key in moved {
            if let Some(text) = files.remove(&key) {
                let target = format!("{to}{}", &key[from.len()..]);
                files.insert(target, text);
            }
        }
        Ok(format!("Renamed {from} to {to}"))
    }
}

/// Exposes a [`DocumentSandbox`] to the reasoning service as the `memory` tool.
pub struct DocumentTool<S> {
    sandbox: S,
}

impl<S: DocumentSandbox> DocumentTool<S> {
    pub fn new(sandbox: S) -> Self {
        Self { sandbox }
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }
}

impl<S: DocumentSandbox> LocalTool for DocumentTool<S> {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Read and edit private notes stored under /memories. Commands: view, create, replace, insert, delete, rename."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "enum": ["view", "create", "replace", "insert", "delete", "rename"]
                },
                "path": { "type": "string", "description": "Path under /memories" },
                "view_range": {
                    "type": "array",
                    "items": { "type": "integer" },
                    "minItems": 2,
                    "maxItems": 2
                },
                "file_text": { "type": "string" },
                "old_str": { "type": "string" },
                "new_str": { "type": "string" },
                "insert_line": { "type": "integer", "minimum": 0 },
                "insert_text": { "type": "string" },
                "old_path": { "type": "string" },
                "new_path": { "type": "string" }
            },
            "required": ["command"]
        })
    }

    fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let command = DocumentCommand::parse(args)?;
        tracing::debug!(?command, "Applying document command");
        self.sandbox.apply(&command).map(ToolResult::ok)
    }
}
