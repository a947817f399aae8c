//! Failure taxonomy shared by every tool.

use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Stable, serializable classification of a [`ToolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    MissingSandbox,
    InvalidPath,
    InvalidArgument,
    NotFound,
    NotADirectory,
    IsADirectory,
    AlreadyExists,
    PatternError,
    OccurrenceMismatch,
    NoOpChange,
    IoFailure,
    PipelineFailure,
    Timeout,
    Cancelled,
    UnknownTool,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("No active sandbox for this request")]
    MissingSandbox,
    #[error("Path must be absolute: {path}")]
    InvalidPath { path: String },
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("Not found: {path}")]
    NotFound { path: String },
    #[error("String to replace not found in {path}")]
    NoOccurrences { path: String },
    #[error("Not a directory: {path}")]
    NotADirectory { path: String },
    #[error("Is a directory: {path}")]
    IsADirectory { path: String },
    #[error("File already exists: {path} (old_string must not be empty for existing files)")]
    AlreadyExists { path: String },
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("Expected {expected} occurrence(s) but found {found} in {path}")]
    OccurrenceMismatch {
        path: String,
        expected: usize,
        found: usize,
    },
    #[error("No changes to apply: {reason}")]
    NoOpChange { reason: String },
    #[error("Failed to {action} {path}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Validation pipeline failed: {message}")]
    Pipeline { message: String },
    #[error("Tool timed out after {}ms: {tool}", .elapsed.as_millis())]
    Timeout { tool: String, elapsed: Duration },
    #[error("Cancelled by caller")]
    Cancelled,
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
}

impl ToolError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Classify an I/O failure on `path`, keeping "missing" and
    /// "wrong kind" distinct from environment failures.
    pub fn from_io(action: &'static str, path: &str, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound {
                path: path.to_string(),
            },
            std::io::ErrorKind::NotADirectory => Self::NotADirectory {
                path: path.to_string(),
            },
            std::io::ErrorKind::IsADirectory => Self::IsADirectory {
                path: path.to_string(),
            },
            _ => Self::Io {
                action,
                path: path.to_string(),
                source,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingSandbox => ErrorKind::MissingSandbox,
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NotFound { .. } | Self::NoOccurrences { .. } => ErrorKind::NotFound,
            Self::NotADirectory { .. } => ErrorKind::NotADirectory,
            Self::IsADirectory { .. } => ErrorKind::IsADirectory,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::Pattern { .. } => ErrorKind::PatternError,
            Self::OccurrenceMismatch { .. } => ErrorKind::OccurrenceMismatch,
            Self::NoOpChange { .. } => ErrorKind::NoOpChange,
            Self::Io { .. } => ErrorKind::IoFailure,
            Self::Pipeline { .. } => ErrorKind::PipelineFailure,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::UnknownTool { .. } => ErrorKind::UnknownTool,
        }
    }

    /// Diagnostic payload for `ToolResult::technical_details`.
    pub fn details(&self) -> Value {
        let mut details = json!({ "kind": self.kind() });
        let extra = match self {
            Self::OccurrenceMismatch {
                expected, found, ..
            } => json!({ "expected": expected, "found": found }),
            Self::Io { source, .. } => json!({ "detail": source.to_string() }),
            Self::Pattern { pattern, message } => json!({ "pattern": pattern, "detail": message }),
            Self::Timeout { elapsed, .. } => json!({ "elapsedMs": elapsed.as_millis() as u64 }),
            _ => Value::Null,
        };
        if let (Some(target), Value::Object(extra)) = (details.as_object_mut(), extra) {
            target.extend(extra);
        }
        details
    }
}
