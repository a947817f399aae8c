//! Tool-execution kernel for AI coding agents.
//!
//! The kernel exposes a fixed set of tools (read, write, literal replace,
//! search, find, list, validate) that operate on a codebase living inside an
//! isolated per-session sandbox. Every call goes through the same contract:
//! the sandbox guard and path checks run first, errors are classified into a
//! small taxonomy, and the result is a uniform [`tools::ToolResult`].
//!
//! ```no_run
//! use toolkernel::{config::KernelConfig, sandbox::SandboxContext, tools::default_registry};
//! use serde_json::json;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = KernelConfig::load_or_default(None)?;
//! let registry = default_registry(&config)?;
//! let ctx = SandboxContext::new("sb-1", "call-1");
//! let result = registry
//!     .execute("write_file", json!({"path": "/ws/a.txt", "content": "hello"}), &ctx)
//!     .await;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod sandbox;
pub mod tools;
pub mod validation;

pub use config::KernelConfig;
pub use sandbox::{CommandRunner, SandboxContext, SandboxFs};
pub use tools::{build_registry, default_registry, ToolError, ToolRegistry, ToolResult};
