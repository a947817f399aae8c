//! `read_file`: whole or paginated text, base64 for binary files.

use super::TOOL_READ_FILE;
use crate::sandbox::{SandboxContext, SandboxFs};
use crate::tools::content::{self, LineWindow};
use crate::tools::error::ToolError;
use crate::tools::guard::{optional_i64, require_absolute, require_sandbox, required_str};
use crate::tools::traits::{Tool, ToolData, ToolResult};
use async_trait::async_trait;
use base64::Engine as _;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    Text,
    Base64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadData {
    pub path: String,
    pub content: String,
    pub encoding: ContentEncoding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_lines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_shown: Option<[usize; 2]>,
    pub is_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
}

pub struct ReadFileTool {
    fs: Arc<dyn SandboxFs>,
    max_lines: usize,
}

impl ReadFileTool {
    pub fn new(fs: Arc<dyn SandboxFs>, max_lines: usize) -> Self {
        Self { fs, max_lines }
    }
}

fn text_feedback(path: &str, window: &LineWindow) -> String {
    if window.is_truncated {
        let [first, last] = window.lines_shown();
        format!(
            "Read {path}: showing lines {first}-{last} of {total}. Use offset={next} to continue.",
            total = window.total_lines,
            next = window.end,
        )
    } else if window.start > 0 {
        let [first, last] = window.lines_shown();
        format!("Read {path}: lines {first}-{last} of {}", window.total_lines)
    } else {
        format!("Read {path} ({} lines)", window.total_lines)
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        TOOL_READ_FILE
    }

    fn description(&self) -> &str {
        "Read a file from the sandbox. Text files are returned whole, or paginated with \
         offset (0-based start line) and limit (line count); files over the line threshold \
         are truncated and report the offset to continue from. Binary files (images, \
         archives, fonts, ...) are returned base64-encoded."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute file path in the sandbox (e.g. /home/user/project/src/App.tsx)"
                },
                "offset": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "0-based line to start reading from"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum number of lines to return"
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

        let offset = match optional_i64(&args, "offset")? {
            Some(o) if o < 0 => {
                return Err(ToolError::invalid_argument(format!(
                    "offset must be >= 0 (got {o})"
                )))
            }
            other => other.map(|o| o as usize),
        };
        let limit = match optional_i64(&args, "limit")? {
            Some(l) if l <= 0 => {
                return Err(ToolError::invalid_argument(format!(
                    "limit must be > 0 (got {l})"
                )))
            }
            other => other.map(|l| l as usize),
        };

        let meta = self
            .fs
            .metadata(sandbox_id, &path)
            .await
            .map_err(|e| ToolError::from_io("read", &path, e))?;
        if meta.is_dir {
            return Err(ToolError::IsADirectory { path });
        }

        let bytes = self
            .fs
            .read(sandbox_id, &path)
            .await
            .map_err(|e| ToolError::from_io("read", &path, e))?;
        let size = bytes.len() as u64;

        if content::is_binary_path(&path) {
            let mime = content::mime_type(&path);
            let feedback = format!("Read binary file {path} ({size} bytes, {mime})");
            let data = ReadData {
                content: base64::engine::general_purpose::STANDARD.encode(&bytes),
                path,
                encoding: ContentEncoding::Base64,
                mime_type: Some(mime),
                size,
                total_lines: None,
                lines_shown: None,
                is_truncated: false,
                next_offset: None,
            };
            return Ok(ToolResult::ok(ToolData::Read(data), feedback));
        }

        let text = content::decode_text(bytes);
        let window = content::window(&text, offset, limit, self.max_lines)?;
        let feedback = text_feedback(&path, &window);

        let data = ReadData {
            lines_shown: Some(window.lines_shown()),
            next_offset: window.next_offset(),
            total_lines: Some(window.total_lines),
            is_truncated: window.is_truncated,
            content: window.text,
            path,
            encoding: ContentEncoding::Text,
            mime_type: None,
            size,
        };
        Ok(ToolResult::ok(ToolData::Read(data), feedback))
    }
}
