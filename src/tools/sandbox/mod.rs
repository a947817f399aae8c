//! Agent-facing sandbox tools.
//!
//! Each tool validates its own arguments and delegates storage to
//! [`crate::sandbox::SandboxFs`] and process execution to
//! [`crate::sandbox::CommandRunner`], so the same tools work against any
//! sandbox provider.

pub mod find;
pub mod list;
pub mod read;
pub mod replace;
pub mod search;
pub mod validate;
pub mod write;

pub use find::{FindFilesTool, FindLimits};
pub use list::ListDirectoryTool;
pub use read::ReadFileTool;
pub use replace::ReplaceInFileTool;
pub use search::{SearchFilesTool, SearchLimits};
pub use validate::ValidateProjectTool;
pub use write::WriteFileTool;

/// Tool name constants for reference.
pub const TOOL_READ_FILE: &str = "read_file";
pub const TOOL_WRITE_FILE: &str = "write_file";
pub const TOOL_REPLACE_IN_FILE: &str = "replace_in_file";
pub const TOOL_SEARCH_FILES: &str = "search_files";
pub const TOOL_FIND_FILES: &str = "find_files";
pub const TOOL_LIST_DIRECTORY: &str = "list_directory";
pub const TOOL_VALIDATE_PROJECT: &str = "validate_project";
