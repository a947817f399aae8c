//! `search_files`: line-oriented regex search across a directory tree.

use super::TOOL_SEARCH_FILES;
use crate::sandbox::{SandboxContext, SandboxFs};
use crate::tools::content;
use crate::tools::error::ToolError;
use crate::tools::guard::{
    optional_positive, optional_str, relative_to, require_absolute, require_sandbox, required_str,
};
use crate::tools::pattern::GlobMatcher;
use crate::tools::traits::{Tool, ToolData, ToolResult};
use crate::tools::walk::collect_files;
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Matched lines longer than this are cut (minified bundles).
const MAX_LINE_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    /// 1-based.
    pub line_number: usize,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMatches {
    /// Relative to the search root.
    pub path: String,
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchData {
    pub pattern: String,
    pub root: String,
    pub files: Vec<FileMatches>,
    pub total_matches: usize,
    pub files_searched: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_results: usize,
    pub max_file_size_bytes: u64,
    pub scan_timeout: Duration,
}

pub struct SearchFilesTool {
    fs: Arc<dyn SandboxFs>,
    limits: SearchLimits,
}

impl SearchFilesTool {
    pub fn new(fs: Arc<dyn SandboxFs>, limits: SearchLimits) -> Self {
        Self { fs, limits }
    }
}

fn compile(pattern: &str) -> Result<Regex, ToolError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ToolError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

fn clip(line: &str) -> String {
    match line.char_indices().nth(MAX_LINE_CHARS) {
        Some((idx, _)) => format!("{}...", &line[..idx]),
        None => line.to_string(),
    }
}

/// Matching lines of one file, in line order, at most `budget` of them.
/// The flag is set when more matches existed than the budget allowed.
fn match_lines(regex: &Regex, text: &str, budget: usize) -> (Vec<SearchMatch>, bool) {
    let mut matches = Vec::new();
    for (idx, raw) in content::split_lines(text).into_iter().enumerate() {
        let line = raw.trim_end_matches('\r');
        if !regex.is_match(line) {
            continue;
        }
        if matches.len() == budget {
            return (matches, true);
        }
        matches.push(SearchMatch {
            line_number: idx + 1,
            line: clip(line.trim()),
        });
    }
    (matches, false)
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        TOOL_SEARCH_FILES
    }

    fn description(&self) -> &str {
        "Search file contents under a directory with a regular expression (case-insensitive, \
         line by line). Skips .git, node_modules, build output and binary files. Returns \
         matching lines grouped by file with 1-based line numbers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for (e.g. 'useState\\(')"
                },
                "path": {
                    "type": "string",
                    "description": "Absolute directory to search (e.g. /home/user/project/src)"
                },
                "include": {
                    "type": "string",
                    "description": "Only search files matching this glob (e.g. '*.tsx' or 'src/**/*.ts')"
                },
                "max_results": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum number of matching lines to return"
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
        let pattern = required_str(&args, "pattern")?;
        let max_results =
            optional_positive(&args, "max_results")?.unwrap_or(self.limits.max_results);
        let regex = compile(pattern)?;
        let include = optional_str(&args, "include")?
            .filter(|glob| !glob.trim().is_empty())
            .map(GlobMatcher::new)
            .transpose()?;

        let candidates = collect_files(
            self.fs.as_ref(),
            sandbox_id,
            &root,
            self.limits.scan_timeout,
            TOOL_SEARCH_FILES,
        )
        .await?;

        let mut files = Vec::new();
        let mut total_matches = 0;
        let mut files_searched = 0;
        let mut truncated = false;

        for entry in candidates {
            let rel = relative_to(&root, &entry.path).unwrap_or(&entry.path).to_string();
            if include.as_ref().is_some_and(|glob| !glob.matches_file(&rel)) {
                continue;
            }
            if content::is_binary_path(&entry.path) {
                continue;
            }
            if entry.metadata.size > self.limits.max_file_size_bytes {
                tracing::debug!(
                    "search_files: skipping {} ({} bytes)",
                    entry.path,
                    entry.metadata.size
                );
                continue;
            }

            let bytes = match self.fs.read(sandbox_id, &entry.path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::debug!("search_files: skipping unreadable {}: {e}", entry.path);
                    continue;
                }
            };
            // NUL bytes mean binary content behind a text extension.
            if bytes.contains(&0) {
                continue;
            }
            files_searched += 1;

            let text = content::decode_text(bytes);
            let (matches, hit_limit) = match_lines(&regex, &text, max_results - total_matches);
            total_matches += matches.len();
            if !matches.is_empty() {
                files.push(FileMatches { path: rel, matches });
            }
            if hit_limit {
                truncated = true;
                break;
            }
        }

        let feedback = if total_matches == 0 {
            format!("No matches for '{pattern}' in {root}")
        } else if truncated {
            format!(
                "Found {total_matches} matches in {} files (limit reached, narrow the search)",
                files.len()
            )
        } else {
            format!("Found {total_matches} matches in {} files", files.len())
        };

        let data = SearchData {
            pattern: pattern.to_string(),
            root,
            files,
            total_matches,
            files_searched,
            truncated,
        };
        Ok(ToolResult::ok(ToolData::Search(data), feedback))
    }
}
