//! Tool contract: the trait every tool implements and the result envelope it
//! returns to the orchestrator.

use super::error::ToolError;
use super::sandbox::find::FindData;
use super::sandbox::list::ListData;
use super::sandbox::read::ReadData;
use super::sandbox::replace::ReplaceData;
use super::sandbox::search::SearchData;
use super::sandbox::write::WriteData;
use crate::sandbox::{FsEntry, SandboxContext};
use crate::validation::ValidationReport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Tool-specific success payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ToolData {
    Read(ReadData),
    Write(WriteData),
    Replace(ReplaceData),
    Search(SearchData),
    Find(FindData),
    List(ListData),
    Validation(ValidationReport),
}

/// Result of one tool invocation. Never partially successful: a failure
/// carries no `data`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ToolData>,
    pub user_feedback: String,
    pub preview_refresh_needed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_files: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_details: Option<Value>,
}

impl ToolResult {
    pub fn ok(data: ToolData, user_feedback: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            user_feedback: user_feedback.into(),
            preview_refresh_needed: false,
            changed_files: None,
            technical_details: None,
        }
    }

    pub fn failure(error: &ToolError) -> Self {
        Self {
            success: false,
            data: None,
            user_feedback: error.to_string(),
            preview_refresh_needed: false,
            changed_files: None,
            technical_details: Some(error.details()),
        }
    }

    /// Mark `path` as modified; the preview has to reload it.
    pub fn with_changed_file(mut self, path: impl Into<String>) -> Self {
        self.preview_refresh_needed = true;
        self.changed_files
            .get_or_insert_with(Vec::new)
            .push(path.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.technical_details = Some(details);
        self
    }

    /// Attach the tool call id to the diagnostic payload.
    pub(crate) fn tag_call(mut self, tool_call_id: &str) -> Self {
        match self.technical_details.as_mut() {
            Some(Value::Object(map)) => {
                map.insert("toolCallId".into(), Value::String(tool_call_id.to_string()));
            }
            Some(_) => {}
            None if !self.success => {
                self.technical_details = Some(serde_json::json!({ "toolCallId": tool_call_id }));
            }
            None => {}
        }
        self
    }
}

impl From<ToolError> for ToolResult {
    fn from(error: ToolError) -> Self {
        Self::failure(&error)
    }
}

/// A file or directory produced by listing, search and find operations.
/// Rebuilt on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
    pub modified_time: DateTime<Utc>,
}

impl From<FsEntry> for FileEntry {
    fn from(entry: FsEntry) -> Self {
        Self {
            name: entry.name,
            path: entry.path,
            is_directory: entry.metadata.is_dir,
            size: entry.metadata.size,
            modified_time: DateTime::<Utc>::from(entry.metadata.modified),
        }
    }
}

/// Name, description and input schema as advertised to the model.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Every tool exposed to the agent implements this.
///
/// `execute` must check the sandbox guard before anything else and must not
/// panic; errors come back as [`ToolError`] and the registry turns them into
/// a failed [`ToolResult`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn parameters_schema(&self) -> Value;

    /// Whether the tool changes sandbox state. Mutating calls are never cut
    /// off by the registry's timeout ceiling.
    fn is_mutating(&self) -> bool {
        false
    }

    /// Tools that enforce their own deadlines opt out of the registry's
    /// per-call timeout ceiling.
    fn has_own_deadline(&self) -> bool {
        false
    }

    async fn execute(&self, args: Value, ctx: &SandboxContext) -> Result<ToolResult, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}
