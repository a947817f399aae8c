//! Tool registry and the shared building blocks of the sandbox tools.
//!
//! A [`ToolRegistry`] is a plain value: build one with [`default_registry`]
//! or [`build_registry`] and hand it to the orchestrator. Nothing here is
//! global, so tests can create as many isolated registries as they need.

pub mod content;
pub mod diff;
pub mod error;
pub mod guard;
pub mod locks;
pub mod pattern;
pub mod sandbox;
pub mod traits;
pub mod walk;

pub use error::{ErrorKind, ToolError};
pub use traits::{FileEntry, Tool, ToolData, ToolResult, ToolSpec};

use crate::config::KernelConfig;
use crate::sandbox::local::LocalSandbox;
use crate::sandbox::{CommandRunner, SandboxContext, SandboxFs};
use crate::validation::ValidationPipeline;
use locks::FileLocks;
use sandbox::{
    FindFilesTool, FindLimits, ListDirectoryTool, ReadFileTool, ReplaceInFileTool,
    SearchFilesTool, SearchLimits, ValidateProjectTool, WriteFileTool,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    ceiling: Duration,
}

impl ToolRegistry {
    /// Empty registry; `ceiling` bounds every call of a read-only tool
    /// without its own deadline.
    pub fn new(ceiling: Duration) -> Self {
        Self {
            tools: HashMap::new(),
            ceiling,
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> anyhow::Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            anyhow::bail!("Tool already registered: {name}");
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Tool definitions for the model, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run `name` with `args`. Never fails: every error, including an
    /// unknown tool or an exceeded ceiling, comes back as a failed
    /// [`ToolResult`]. Mutating tools always run to completion.
    pub async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: &SandboxContext,
    ) -> ToolResult {
        let span = tracing::info_span!(
            "tool",
            tool = name,
            tool_call_id = %ctx.tool_call_id,
            sandbox_id = ctx.sandbox_id.as_deref().unwrap_or("-"),
        );

        async {
            let Some(tool) = self.get(name) else {
                tracing::warn!("Unknown tool requested: {name}");
                return ToolResult::failure(&ToolError::UnknownTool {
                    name: name.to_string(),
                });
            };

            let started = Instant::now();
            // Dropping a mutation mid-write would release its file lock while
            // the write is still landing.
            let outcome = if tool.has_own_deadline() || tool.is_mutating() {
                tool.execute(args, ctx).await
            } else {
                match tokio::time::timeout(self.ceiling, tool.execute(args, ctx)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ToolError::Timeout {
                        tool: name.to_string(),
                        elapsed: self.ceiling,
                    }),
                }
            };
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            match outcome {
                Ok(result) => {
                    tracing::info!(elapsed_ms, "Tool {name} succeeded");
                    result
                }
                Err(e) => {
                    tracing::info!(elapsed_ms, kind = ?e.kind(), "Tool {name} failed: {e}");
                    ToolResult::failure(&e)
                }
            }
        }
        .instrument(span)
        .await
        .tag_call(&ctx.tool_call_id)
    }
}

/// Registry with every kernel tool, backed by the given providers.
pub fn build_registry(
    fs: Arc<dyn SandboxFs>,
    runner: Arc<dyn CommandRunner>,
    config: &KernelConfig,
) -> anyhow::Result<ToolRegistry> {
    let locks = FileLocks::new();
    let scan_timeout = config.limits.scan_timeout();
    let pipeline = Arc::new(ValidationPipeline::new(runner, config.validation.clone()));

    let mut registry = ToolRegistry::new(config.limits.tool_timeout());
    registry.register(Arc::new(ReadFileTool::new(fs.clone(), config.read.max_lines)))?;
    registry.register(Arc::new(WriteFileTool::new(fs.clone(), locks.clone())))?;
    registry.register(Arc::new(ReplaceInFileTool::new(fs.clone(), locks)))?;
    registry.register(Arc::new(SearchFilesTool::new(
        fs.clone(),
        SearchLimits {
            max_results: config.search.max_results,
            max_file_size_bytes: config.search.max_file_size_bytes,
            scan_timeout,
        },
    )))?;
    registry.register(Arc::new(FindFilesTool::new(
        fs.clone(),
        FindLimits {
            max_results: config.find.max_results,
            recent_window: Duration::from_secs(config.find.recent_window_hours * 3600),
            scan_timeout,
        },
    )))?;
    registry.register(Arc::new(ListDirectoryTool::new(fs)))?;
    registry.register(Arc::new(ValidateProjectTool::new(pipeline)))?;
    Ok(registry)
}

/// Registry over a [`LocalSandbox`] rooted at the configured directory.
pub fn default_registry(config: &KernelConfig) -> anyhow::Result<ToolRegistry> {
    let local = Arc::new(LocalSandbox::new(config.sandbox_root()));
    build_registry(local.clone(), local, config)
}
