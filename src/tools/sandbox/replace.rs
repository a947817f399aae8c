//! `replace_in_file`: exact literal substitution with occurrence verification.
//!
//! The match is a plain substring search; no character of `old_string` has a
//! special meaning. The number of non-overlapping occurrences must equal
//! `expected_replacements` (default 1) or nothing is written. Existing content
//! is normalized from `\r\n` to `\n` before counting, so counts never depend
//! on line endings; the rewritten file keeps `\n` endings.
//!
//! An empty `old_string` on a missing file creates the file with
//! `new_string` as its content.

use super::write::{ensure_parent, line_count};
use super::TOOL_REPLACE_IN_FILE;
use crate::sandbox::{SandboxContext, SandboxFs};
use crate::tools::content;
use crate::tools::diff::{DiffLine, FileDiff};
use crate::tools::error::ToolError;
use crate::tools::guard::{optional_i64, require_absolute, require_sandbox, required_str};
use crate::tools::locks::FileLocks;
use crate::tools::traits::{Tool, ToolData, ToolResult};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceData {
    pub path: String,
    /// Occurrences actually replaced; 0 when the call created the file.
    pub occurrences: usize,
    pub is_new_file: bool,
    pub additions: usize,
    pub deletions: usize,
    pub diff: Vec<DiffLine>,
}

pub struct ReplaceInFileTool {
    fs: Arc<dyn SandboxFs>,
    locks: FileLocks,
}

impl ReplaceInFileTool {
    pub fn new(fs: Arc<dyn SandboxFs>, locks: FileLocks) -> Self {
        Self { fs, locks }
    }

    async fn create(
        &self,
        sandbox_id: &str,
        path: String,
        new_string: &str,
    ) -> Result<ToolResult, ToolError> {
        ensure_parent(self.fs.as_ref(), sandbox_id, &path).await?;
        self.fs
            .write(sandbox_id, &path, new_string.as_bytes())
            .await
            .map_err(|e| ToolError::from_io("write", &path, e))?;

        let diff = FileDiff::compute(None, new_string);
        let feedback = format!("Created {path} ({} lines)", line_count(new_string));
        let data = ReplaceData {
            path: path.clone(),
            occurrences: 0,
            is_new_file: true,
            additions: diff.additions,
            deletions: diff.deletions,
            diff: diff.lines,
        };
        Ok(ToolResult::ok(ToolData::Replace(data), feedback).with_changed_file(path))
    }
}

/// Count non-overlapping literal occurrences.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

#[async_trait]
impl Tool for ReplaceInFileTool {
    fn name(&self) -> &str {
        TOOL_REPLACE_IN_FILE
    }

    fn description(&self) -> &str {
        "Replace exact text in a file. old_string is matched literally (no regex, no fuzzy \
         matching) and must occur exactly expected_replacements times (default 1); every \
         occurrence is replaced. Include enough surrounding context to make old_string \
         unique. An empty old_string creates a new file containing new_string."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute file path in the sandbox"
                },
                "old_string": {
                    "type": "string",
                    "description": "Exact text to replace. Empty only when creating a new file."
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "expected_replacements": {
                    "type": "integer",
                    "minimum": 1,
                    "default": 1,
                    "description": "Number of occurrences expected in the file"
                }
            },
            "required": ["path", "old_string", "new_string"]
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
        let old_string = required_str(&args, "old_string")?;
        let new_string = required_str(&args, "new_string")?;
        let expected = match optional_i64(&args, "expected_replacements")? {
            None => 1,
            Some(n) if n >= 1 => n as usize,
            Some(n) => {
                return Err(ToolError::invalid_argument(format!(
                    "expected_replacements must be at least 1 (got {n})"
                )))
            }
        };

        let _guard = self.locks.lock(sandbox_id, &path).await;

        let existing = self
            .fs
            .try_metadata(sandbox_id, &path)
            .await
            .map_err(|e| ToolError::from_io("inspect", &path, e))?;
        match existing {
            None if old_string.is_empty() => return self.create(sandbox_id, path, new_string).await,
            None => return Err(ToolError::NotFound { path }),
            Some(meta) if meta.is_dir => return Err(ToolError::IsADirectory { path }),
            Some(_) if old_string.is_empty() => return Err(ToolError::AlreadyExists { path }),
            Some(_) => {}
        }
        if content::is_binary_path(&path) {
            return Err(ToolError::invalid_argument(format!(
                "cannot replace text in binary file {path}"
            )));
        }

        let bytes = self
            .fs
            .read(sandbox_id, &path)
            .await
            .map_err(|e| ToolError::from_io("read", &path, e))?;
        let original = normalize_line_endings(&content::decode_text(bytes));
        let old_string = normalize_line_endings(old_string);

        let found = count_occurrences(&original, &old_string);
        if found == 0 {
            return Err(ToolError::NoOccurrences { path });
        }
        if found != expected {
            return Err(ToolError::OccurrenceMismatch {
                path,
                expected,
                found,
            });
        }
        if old_string == new_string {
            return Err(ToolError::NoOpChange {
                reason: "old_string and new_string are identical".to_string(),
            });
        }

        let updated = original.replace(&old_string, new_string);
        if updated == original {
            return Err(ToolError::NoOpChange {
                reason: format!("replacement leaves {path} unchanged"),
            });
        }

        ensure_parent(self.fs.as_ref(), sandbox_id, &path).await?;
        self.fs
            .write(sandbox_id, &path, updated.as_bytes())
            .await
            .map_err(|e| ToolError::from_io("write", &path, e))?;

        let diff = FileDiff::compute(Some(&original), &updated);
        let feedback = format!(
            "Replaced {found} occurrence(s) in {path} (+{} -{})",
            diff.additions, diff.deletions
        );
        let data = ReplaceData {
            path: path.clone(),
            occurrences: found,
            is_new_file: false,
            additions: diff.additions,
            deletions: diff.deletions,
            diff: diff.lines,
        };
        Ok(ToolResult::ok(ToolData::Replace(data), feedback).with_changed_file(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::local::LocalSandbox;
    use crate::tools::error::ErrorKind;
    use tempfile::TempDir;

    async fn setup(initial: Option<&str>) -> (TempDir, Arc<LocalSandbox>, ReplaceInFileTool) {
        let tmp = TempDir::new().unwrap();
        let fs = Arc::new(LocalSandbox::new(tmp.path()));
        fs.create_dir_all("sb", "/ws").await.unwrap();
        if let Some(content) = initial {
            fs.write("sb", "/ws/a.txt", content.as_bytes()).await.unwrap();
        }
        let tool = ReplaceInFileTool::new(fs.clone(), FileLocks::new());
        (tmp, fs, tool)
    }

    fn ctx() -> SandboxContext {
        SandboxContext::new("sb", "call-1")
    }

    async fn content(fs: &LocalSandbox) -> String {
        String::from_utf8(fs.read("sb", "/ws/a.txt").await.unwrap()).unwrap()
    }

    fn replace_data(result: &ToolResult) -> &ReplaceData {
        match &result.data {
            Some(ToolData::Replace(data)) => data,
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[test]
    fn counts_non_overlapping_occurrences() {
        assert_eq!(count_occurrences("aaaa", "aa"), 2);
        assert_eq!(count_occurrences("a.b a.b", "a.b"), 2);
        assert_eq!(count_occurrences("axb", "a.b"), 0);
        assert_eq!(count_occurrences("abc", ""), 0);
    }

    #[tokio::test]
    async fn replaces_single_occurrence() {
        let (_tmp, fs, tool) = setup(Some("hello\nworld")).await;
        let result = tool
            .execute(
                json!({"path": "/ws/a.txt", "old_string": "world", "new_string": "there"}),
                &ctx(),
            )
            .await
            .unwrap();
        let data = replace_data(&result);
        assert_eq!(data.occurrences, 1);
        assert!(!data.is_new_file);
        assert_eq!((data.additions, data.deletions), (1, 1));
        assert!(result.preview_refresh_needed);
        assert_eq!(content(&fs).await, "hello\nthere");
    }

    #[tokio::test]
    async fn regex_metacharacters_are_literal() {
        let (_tmp, fs, tool) = setup(Some("let x = a.b(c)[0]*2;\nlet y = axb(c)[0]*2;")).await;
        tool.execute(
            json!({"path": "/ws/a.txt", "old_string": "a.b(c)[0]*2", "new_string": "$1"}),
            &ctx(),
        )
        .await
        .unwrap();
        assert_eq!(content(&fs).await, "let x = $1;\nlet y = axb(c)[0]*2;");
    }

    #[tokio::test]
    async fn replaces_all_expected_occurrences() {
        let (_tmp, fs, tool) = setup(Some("foo bar foo baz foo")).await;
        let result = tool
            .execute(
                json!({"path": "/ws/a.txt", "old_string": "foo", "new_string": "qux", "expected_replacements": 3}),
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(replace_data(&result).occurrences, 3);
        assert_eq!(content(&fs).await, "qux bar qux baz qux");
    }

    #[tokio::test]
    async fn count_mismatch_leaves_file_unchanged() {
        let (_tmp, fs, tool) = setup(Some("foo foo")).await;
        let err = tool
            .execute(
                json!({"path": "/ws/a.txt", "old_string": "foo", "new_string": "bar"}),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OccurrenceMismatch);
        assert_eq!(err.details()["found"], 2);
        assert_eq!(err.details()["expected"], 1);
        assert_eq!(content(&fs).await, "foo foo");
    }

    #[tokio::test]
    async fn replaying_a_replace_never_reapplies() {
        let (_tmp, _fs, tool) = setup(Some("hello\nworld")).await;
        let args = json!({"path": "/ws/a.txt", "old_string": "world", "new_string": "there"});
        tool.execute(args.clone(), &ctx()).await.unwrap();
        let err = tool.execute(args, &ctx()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn identical_strings_are_a_no_op() {
        let (_tmp, _fs, tool) = setup(Some("same")).await;
        let err = tool
            .execute(
                json!({"path": "/ws/a.txt", "old_string": "same", "new_string": "same"}),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoOpChange);
    }

    #[tokio::test]
    async fn crlf_content_is_normalized_before_counting() {
        let (_tmp, fs, tool) = setup(Some("one\r\ntwo\r\nthree")).await;
        tool.execute(
            json!({"path": "/ws/a.txt", "old_string": "one\ntwo", "new_string": "1\n2"}),
            &ctx(),
        )
        .await
        .unwrap();
        assert_eq!(content(&fs).await, "1\n2\nthree");
    }

    #[tokio::test]
    async fn empty_old_string_creates_missing_file() {
        let (_tmp, fs, tool) = setup(None).await;
        let result = tool
            .execute(
                json!({"path": "/ws/new/b.txt", "old_string": "", "new_string": "fresh"}),
                &ctx(),
            )
            .await
            .unwrap();
        let data = replace_data(&result);
        assert!(data.is_new_file);
        assert_eq!(data.occurrences, 0);
        assert_eq!(fs.read("sb", "/ws/new/b.txt").await.unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn empty_old_string_on_existing_file_fails() {
        let (_tmp, _fs, tool) = setup(Some("x")).await;
        let err = tool
            .execute(
                json!({"path": "/ws/a.txt", "old_string": "", "new_string": "y"}),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn missing_file_with_old_string_is_not_found() {
        let (_tmp, _fs, tool) = setup(None).await;
        let err = tool
            .execute(
                json!({"path": "/ws/a.txt", "old_string": "x", "new_string": "y"}),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn expected_replacements_must_be_positive() {
        let (_tmp, _fs, tool) = setup(Some("x")).await;
        let err = tool
            .execute(
                json!({"path": "/ws/a.txt", "old_string": "x", "new_string": "y", "expected_replacements": 0}),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn concurrent_replaces_on_one_file_serialize() {
        let (_tmp, fs, tool) = setup(Some("a")).await;
        let tool = Arc::new(tool);
        let first = {
            let tool = tool.clone();
            tokio::spawn(async move {
                tool.execute(
                    json!({"path": "/ws/a.txt", "old_string": "a", "new_string": "ab"}),
                    &ctx(),
                )
                .await
            })
        };
        let second = {
            let tool = tool.clone();
            tokio::spawn(async move {
                tool.execute(
                    json!({"path": "/ws/a.txt", "old_string": "a", "new_string": "ab"}),
                    &ctx(),
                )
                .await
            })
        };
        let first = first.await.unwrap();
        let second = second.await.unwrap();
        // Both see exactly one "a" in turn, so both succeed and neither write is lost.
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(content(&fs).await, "abb");
    }
}
