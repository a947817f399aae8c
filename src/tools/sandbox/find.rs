//! `find_files`: glob matching over root-relative paths, recent files first.

use super::TOOL_FIND_FILES;
use crate::sandbox::{SandboxContext, SandboxFs};
use crate::tools::error::ToolError;
use crate::tools::guard::{
    optional_bool, optional_positive, relative_to, require_absolute, require_sandbox, required_str,
};
use crate::tools::pattern::{order_by_recency, GlobMatcher};
use crate::tools::traits::{FileEntry, Tool, ToolData, ToolResult};
use crate::tools::walk::collect_files;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindData {
    pub pattern: String,
    pub root: String,
    pub files: Vec<FileEntry>,
    /// Matches before the `max_results` cap.
    pub total_matches: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FindLimits {
    pub max_results: usize,
    /// Files modified within this window sort first.
    pub recent_window: Duration,
    pub scan_timeout: Duration,
}

pub struct FindFilesTool {
    fs: Arc<dyn SandboxFs>,
    limits: FindLimits,
}

impl FindFilesTool {
    pub fn new(fs: Arc<dyn SandboxFs>, limits: FindLimits) -> Self {
        Self { fs, limits }
    }
}

#[async_trait]
impl Tool for FindFilesTool {
    fn name(&self) -> &str {
        TOOL_FIND_FILES
    }

    fn description(&self) -> &str {
        "Find files whose path (relative to the search directory) matches a glob. \
         '**' crosses directories, '*' stays within one directory, '?' matches one character. \
         Recently modified files are listed first, newest first; the rest alphabetically. \
         Skips .git, node_modules and build output."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern (e.g. '**/*.tsx', 'src/components/*.ts')"
                },
                "path": {
                    "type": "string",
                    "description": "Absolute directory to search from"
                },
                "case_sensitive": {
                    "type": "boolean",
                    "default": false,
                    "description": "Match letter case exactly"
                },
                "max_results": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum number of files to return"
                }
            },
            "required": ["pattern", "path"]
        })
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &SandboxContext,
    ) -> Result<ToolResult, ToolError> {
        let sandbox_id = require_sandbox(ctx)?;
        let root = require_absolute(required_str(&args, "path")?)?;
        let case_sensitive = optional_bool(&args, "case_sensitive")?.unwrap_or(false);
        let max_results =
            optional_positive(&args, "max_results")?.unwrap_or(self.limits.max_results);
        let glob = GlobMatcher::with_case_sensitivity(required_str(&args, "pattern")?, case_sensitive)?;

        let candidates = collect_files(
            self.fs.as_ref(),
            sandbox_id,
            &root,
            self.limits.scan_timeout,
            TOOL_FIND_FILES,
        )
        .await?;

        let matched: Vec<FileEntry> = candidates
            .into_iter()
            .filter(|entry| {
                relative_to(&root, &entry.path).is_some_and(|rel| glob.is_match(rel))
            })
            .map(FileEntry::from)
            .collect();
        let total_matches = matched.len();

        // An out-of-range window just means nothing counts as recent.
        let window = chrono::Duration::from_std(self.limits.recent_window)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let mut files = order_by_recency(matched, chrono::Utc::now(), window);
        let truncated = files.len() > max_results;
        files.truncate(max_results);

        let feedback = match (total_matches, truncated) {
            (0, _) => format!("No files matching '{}' in {root}", glob.pattern()),
            (n, true) => format!("Found {n} files matching '{}' (showing {})", glob.pattern(), files.len()),
            (n, false) => format!("Found {n} files matching '{}'", glob.pattern()),
        };

        let data = FindData {
            pattern: glob.pattern().to_string(),
            root,
            files,
            total_matches,
            truncated,
        };
        Ok(ToolResult::ok(ToolData::Find(data), feedback))
    }
}
