//! `write_file`: create or overwrite a whole file and report the diff.

use super::TOOL_WRITE_FILE;
use crate::sandbox::{SandboxContext, SandboxFs};
use crate::tools::content::{self, split_lines};
use crate::tools::diff::{DiffLine, FileDiff};
use crate::tools::error::ToolError;
use crate::tools::guard::{parent_dir, require_absolute, require_sandbox, required_str};
use crate::tools::locks::FileLocks;
use crate::tools::traits::{Tool, ToolData, ToolResult};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Stand-in for previous content that cannot be shown as text.
pub const BINARY_PLACEHOLDER: &str = "[binary content]";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteData {
    pub path: String,
    pub is_new_file: bool,
    pub bytes_written: usize,
    pub lines_written: usize,
    pub additions: usize,
    pub deletions: usize,
    pub diff: Vec<DiffLine>,
}

pub struct WriteFileTool {
    fs: Arc<dyn SandboxFs>,
    locks: FileLocks,
}

impl WriteFileTool {
    pub fn new(fs: Arc<dyn SandboxFs>, locks: FileLocks) -> Self {
        Self { fs, locks }
    }

    /// Previous content for diffing; unreadable or binary content becomes
    /// [`BINARY_PLACEHOLDER`].
    async fn previous_content(&self, sandbox_id: &str, path: &str) -> String {
        if content::is_binary_path(path) {
            return BINARY_PLACEHOLDER.to_string();
        }
        match self.fs.read(sandbox_id, path).await {
            Ok(bytes) => String::from_utf8(bytes).unwrap_or_else(|_| BINARY_PLACEHOLDER.to_string()),
            Err(e) => {
                tracing::debug!("write_file: could not read previous content of {path}: {e}");
                BINARY_PLACEHOLDER.to_string()
            }
        }
    }
}

/// Create every missing parent directory of `path`.
pub(crate) async fn ensure_parent(
    fs: &dyn SandboxFs,
    sandbox_id: &str,
    path: &str,
) -> Result<(), ToolError> {
    let parent = parent_dir(path).unwrap_or("/");
    fs.create_dir_all(sandbox_id, parent)
        .await
        .map_err(|e| ToolError::from_io("create directory", parent, e))
}

pub(crate) fn line_count(content: &str) -> usize {
    if content.is_empty() {
        0
    } else {
        split_lines(content).len()
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        TOOL_WRITE_FILE
    }

    fn description(&self) -> &str {
        "Write content to a file in the sandbox, replacing it entirely. Creates the file and \
         any parent directories. Returns a line diff against the previous content. Prefer \
         replace_in_file for small edits to existing files."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute file path in the sandbox (e.g. /home/user/project/src/app/page.tsx)"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn is_mutating(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &SandboxContext,
    ) -> Result<ToolResult, ToolError> {
        let sandbox_id = require_sandbox(ctx)?;
        let path = require_absolute(required_str(&args, "path")?)?;
        let new_content = required_str(&args, "content")?;

        let _guard = self.locks.lock(sandbox_id, &path).await;

        let existing = self
            .fs
            .try_metadata(sandbox_id, &path)
            .await
            .map_err(|e| ToolError::from_io("inspect", &path, e))?;
        let previous = match existing {
            Some(meta) if meta.is_dir => return Err(ToolError::IsADirectory { path }),
            Some(_) => Some(self.previous_content(sandbox_id, &path).await),
            None => None,
        };

        // Directories created here stay behind if the write below fails.
        ensure_parent(self.fs.as_ref(), sandbox_id, &path).await?;
        self.fs
            .write(sandbox_id, &path, new_content.as_bytes())
            .await
            .map_err(|e| ToolError::from_io("write", &path, e))?;

        let diff = FileDiff::compute(previous.as_deref(), new_content);
        let is_new_file = previous.is_none();
        let lines_written = line_count(new_content);

        let feedback = if is_new_file {
            format!("Created {path} ({lines_written} lines)")
        } else {
            format!(
                "Updated {path} (+{} -{})",
                diff.additions, diff.deletions
            )
        };

        let data = WriteData {
            path: path.clone(),
            is_new_file,
            bytes_written: new_content.len(),
            lines_written,
            additions: diff.additions,
            deletions: diff.deletions,
            diff: diff.lines,
        };
        Ok(ToolResult::ok(ToolData::Write(data), feedback).with_changed_file(path))
    }
}
