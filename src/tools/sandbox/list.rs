//! `list_directory`: one level of a directory, with name-level ignore globs.

use super::TOOL_LIST_DIRECTORY;
use crate::sandbox::{SandboxContext, SandboxFs};
use crate::tools::error::ToolError;
use crate::tools::guard::{optional_str_list, require_absolute, require_sandbox, required_str};
use crate::tools::pattern::IgnoreList;
use crate::tools::traits::{FileEntry, Tool, ToolData, ToolResult};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListData {
    pub path: String,
    pub entries: Vec<FileEntry>,
}

pub struct ListDirectoryTool {
    fs: Arc<dyn SandboxFs>,
}

impl ListDirectoryTool {
    pub fn new(fs: Arc<dyn SandboxFs>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        TOOL_LIST_DIRECTORY
    }

    fn description(&self) -> &str {
        "List files and directories directly inside a sandbox directory. Directories come \
         first, then files, each sorted by name. Entries whose name matches one of the \
         ignore globs are left out."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute directory path to list (e.g. /home/user/project/src)"
                },
                "ignore": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Glob patterns for entry names to leave out (e.g. ['*.log', 'node_modules'])"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &SandboxContext,
    ) -> Result<ToolResult, ToolError> {
        let sandbox_id = require_sandbox(ctx)?;
        let path = require_absolute(required_str(&args, "path")?)?;
        let ignore = IgnoreList::new(&optional_str_list(&args, "ignore")?)?;

        let meta = self
            .fs
            .metadata(sandbox_id, &path)
            .await
            .map_err(|e| ToolError::from_io("list", &path, e))?;
        if !meta.is_dir {
            return Err(ToolError::NotADirectory { path });
        }

        let listing = self
            .fs
            .list_dir(sandbox_id, &path)
            .await
            .map_err(|e| ToolError::from_io("list", &path, e))?;

        let mut entries: Vec<FileEntry> = listing
            .into_iter()
            .filter(|entry| !ignore.is_ignored(&entry.name))
            .map(FileEntry::from)
            .collect();
        entries.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
        });

        let dirs = entries.iter().filter(|e| e.is_directory).count();
        let feedback = format!(
            "Listed {path}: {dirs} directories, {} files",
            entries.len() - dirs
        );
        Ok(ToolResult::ok(ToolData::List(ListData { path, entries }), feedback))
    }
}
