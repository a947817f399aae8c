//! Sandbox guard, path contract and argument extraction.
//!
//! Everything here is pure: no check in this module touches the filesystem.

use super::error::ToolError;
use crate::sandbox::SandboxContext;
use serde_json::Value;

/// First check of every tool: the call must target a sandbox.
pub fn require_sandbox(ctx: &SandboxContext) -> Result<&str, ToolError> {
    match ctx.sandbox_id.as_deref() {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(ToolError::MissingSandbox),
    }
}

/// Reject relative paths; return the lexically normalized absolute path.
pub fn require_absolute(path: &str) -> Result<String, ToolError> {
    if !path.starts_with('/') {
        return Err(ToolError::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(normalize_path(path))
}

/// Collapse `//`, `.` and `..` without consulting the filesystem. `..` at the
/// root stays at the root.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Parent directory of a normalized absolute path; `None` for `/` and for
/// direct children of `/`.
pub fn parent_dir(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => Some(parent),
        _ => None,
    }
}

/// `path` relative to `root`, both normalized. `None` if `path` is outside.
pub fn relative_to<'a>(root: &str, path: &'a str) -> Option<&'a str> {
    if root == "/" {
        return path.strip_prefix('/');
    }
    path.strip_prefix(root)?.strip_prefix('/')
}

pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args[key]
        .as_str()
        .ok_or_else(|| ToolError::invalid_argument(format!("Missing required parameter: {key}")))
}

pub fn optional_str<'a>(args: &'a Value, key: &str) -> Result<Option<&'a str>, ToolError> {
    match &args[key] {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.as_str())),
        _ => Err(ToolError::invalid_argument(format!(
            "Parameter {key} must be a string"
        ))),
    }
}

pub fn optional_i64(args: &Value, key: &str) -> Result<Option<i64>, ToolError> {
    match &args[key] {
        Value::Null => Ok(None),
        value => value.as_i64().map(Some).ok_or_else(|| {
            ToolError::invalid_argument(format!("Parameter {key} must be an integer"))
        }),
    }
}

pub fn optional_bool(args: &Value, key: &str) -> Result<Option<bool>, ToolError> {
    match &args[key] {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        _ => Err(ToolError::invalid_argument(format!(
            "Parameter {key} must be a boolean"
        ))),
    }
}

pub fn optional_str_list(args: &Value, key: &str) -> Result<Vec<String>, ToolError> {
    match &args[key] {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ToolError::invalid_argument(format!("Parameter {key} must be a list of strings"))
                })
            })
            .collect(),
        _ => Err(ToolError::invalid_argument(format!(
            "Parameter {key} must be a list of strings"
        ))),
    }
}

/// Optional positive count, e.g. `limit` or `max_results`.
pub fn optional_positive(args: &Value, key: &str) -> Result<Option<usize>, ToolError> {
    match optional_i64(args, key)? {
        None => Ok(None),
        Some(n) if n > 0 => Ok(Some(n as usize)),
        Some(n) => Err(ToolError::invalid_argument(format!(
            "{key} must be greater than 0 (got {n})"
        ))),
    }
}
