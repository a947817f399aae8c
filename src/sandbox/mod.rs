//! Sandbox abstraction layer.
//!
//! The kernel never touches a filesystem or spawns a process directly. It goes
//! through two provider traits scoped by sandbox id:
//!
//! - [`SandboxFs`]: namespaced file store keyed by absolute sandbox paths
//! - [`CommandRunner`]: runs a command inside the sandbox and captures output
//!
//! Two providers exist:
//!
//! - [`local::LocalSandbox`]: one host directory per sandbox id (both traits)
//! - [`e2b::E2bCommandRunner`]: E2B cloud MicroVM command execution

pub mod e2b;
pub mod local;

use async_trait::async_trait;
use std::io;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

/// Identifies the isolated environment a tool call runs against.
///
/// Built by the orchestrator once per agent turn. The kernel only checks that
/// a sandbox id is present; it never creates or destroys sandboxes.
#[derive(Debug, Clone, Default)]
pub struct SandboxContext {
    pub sandbox_id: Option<String>,
    pub user_id: Option<String>,
    pub tool_call_id: String,
    /// Cancelled by the caller to abort long-running work (validation stages).
    pub cancel: CancellationToken,
}

impl SandboxContext {
    pub fn new(sandbox_id: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            sandbox_id: Some(sandbox_id.into()),
            user_id: None,
            tool_call_id: tool_call_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// A context with no sandbox attached. Every tool rejects it.
    pub fn detached(tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Kind and size information for one sandbox path.
#[derive(Debug, Clone, Copy)]
pub struct FsMetadata {
    pub is_dir: bool,
    pub size: u64,
    pub modified: SystemTime,
}

/// One directory entry, addressed by its absolute sandbox path.
#[derive(Debug, Clone)]
pub struct FsEntry {
    pub name: String,
    pub path: String,
    pub metadata: FsMetadata,
}

/// Namespaced file store.
///
/// Every `path` is an absolute, already-normalized sandbox path. Errors keep
/// their [`io::ErrorKind`] so callers can tell "missing" from "broken".
#[async_trait]
pub trait SandboxFs: Send + Sync {
    async fn read(&self, sandbox_id: &str, path: &str) -> io::Result<Vec<u8>>;

    /// Write (create or truncate) a file. The parent directory must exist.
    async fn write(&self, sandbox_id: &str, path: &str, content: &[u8]) -> io::Result<()>;

    async fn metadata(&self, sandbox_id: &str, path: &str) -> io::Result<FsMetadata>;

    async fn list_dir(&self, sandbox_id: &str, path: &str) -> io::Result<Vec<FsEntry>>;

    async fn create_dir_all(&self, sandbox_id: &str, path: &str) -> io::Result<()>;

    /// `Ok(None)` when the path does not exist.
    async fn try_metadata(&self, sandbox_id: &str, path: &str) -> io::Result<Option<FsMetadata>> {
        match self.metadata(sandbox_id, path).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Collect every file below `root`, never descending into a directory
    /// whose name is in `skip_dirs`. Order is unspecified.
    ///
    /// Once `stop` is cancelled the walk gives up with `Interrupted`.
    async fn walk_files(
        &self,
        sandbox_id: &str,
        root: &str,
        skip_dirs: &[&str],
        stop: &CancellationToken,
    ) -> io::Result<Vec<FsEntry>> {
        let mut files = Vec::new();
        let mut dirs_to_visit = vec![root.to_string()];

        while let Some(dir) = dirs_to_visit.pop() {
            if stop.is_cancelled() {
                return Err(walk_stopped());
            }
            let entries = match self.list_dir(sandbox_id, &dir).await {
                Ok(entries) => entries,
                // The root must be listable; anything deeper is skipped.
                Err(e) if dir == root => return Err(e),
                Err(e) => {
                    tracing::debug!("Skipping unreadable directory {dir}: {e}");
                    continue;
                }
            };

            for entry in entries {
                if entry.metadata.is_dir {
                    if !skip_dirs.contains(&entry.name.as_str()) {
                        dirs_to_visit.push(entry.path);
                    }
                } else {
                    files.push(entry);
                }
            }
        }

        Ok(files)
    }
}

pub(crate) fn walk_stopped() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "directory walk stopped")
}

/// A command to run inside a sandbox.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub sandbox_id: String,
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: String,
    pub timeout: Duration,
    pub user_id: Option<String>,
}

/// Output from a command executed inside a sandbox.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr, the way a terminal would interleave them
    /// for a command that writes diagnostics at the end.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Runs commands inside a sandbox.
///
/// Implementations must honor `request.timeout`. Dropping the returned future
/// must stop the underlying process where the provider allows it; the
/// validation pipeline relies on that for cancellation.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run_command(&self, request: &CommandRequest) -> anyhow::Result<CommandOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Read-only file store that only implements the required methods, so
    /// walks go through the default traversal.
    struct MemoryFs {
        files: BTreeMap<String, Vec<u8>>,
    }

    impl MemoryFs {
        fn with_files(paths: &[&str]) -> Self {
            Self {
                files: paths
                    .iter()
                    .map(|p| ((*p).to_string(), p.as_bytes().to_vec()))
                    .collect(),
            }
        }

        fn dir_prefix(path: &str) -> String {
            format!("{}/", path.trim_end_matches('/'))
        }

        fn is_dir(&self, path: &str) -> bool {
            let prefix = Self::dir_prefix(path);
            self.files.keys().any(|k| k.starts_with(&prefix))
        }
    }

    fn meta(is_dir: bool, size: u64) -> FsMetadata {
        FsMetadata {
            is_dir,
            size,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    fn not_found() -> io::Error {
        io::Error::from(io::ErrorKind::NotFound)
    }

    #[async_trait]
    impl SandboxFs for MemoryFs {
        async fn read(&self, _sandbox_id: &str, path: &str) -> io::Result<Vec<u8>> {
            self.files.get(path).cloned().ok_or_else(not_found)
        }

        async fn write(&self, _sandbox_id: &str, _path: &str, _content: &[u8]) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::Unsupported))
        }

        async fn metadata(&self, _sandbox_id: &str, path: &str) -> io::Result<FsMetadata> {
            if let Some(bytes) = self.files.get(path) {
                return Ok(meta(false, bytes.len() as u64));
            }
            if self.is_dir(path) {
                return Ok(meta(true, 0));
            }
            Err(not_found())
        }

        async fn list_dir(&self, _sandbox_id: &str, path: &str) -> io::Result<Vec<FsEntry>> {
            if !self.is_dir(path) {
                return Err(not_found());
            }
            let prefix = Self::dir_prefix(path);
            let mut children: BTreeMap<String, FsEntry> = BTreeMap::new();
            for (key, bytes) in &self.files {
                let Some(rest) = key.strip_prefix(&prefix) else {
                    continue;
                };
                let (name, metadata) = match rest.split_once('/') {
                    Some((dir, _)) => (dir, meta(true, 0)),
                    None => (rest, meta(false, bytes.len() as u64)),
                };
                children.entry(name.to_string()).or_insert_with(|| FsEntry {
                    name: name.to_string(),
                    path: format!("{prefix}{name}"),
                    metadata,
                });
            }
            Ok(children.into_values().collect())
        }

        async fn create_dir_all(&self, _sandbox_id: &str, _path: &str) -> io::Result<()> {
            Ok(())
        }
    }

    fn memory_fs() -> MemoryFs {
        MemoryFs::with_files(&[
            "/ws/README.md",
            "/ws/src/app.ts",
            "/ws/src/util/format.ts",
            "/ws/node_modules/dep/index.js",
            "/ws/src/node_modules/nested.js",
        ])
    }

    #[tokio::test]
    async fn default_walk_collects_nested_files_and_skips_by_name() {
        let fs = memory_fs();
        let mut files = fs
            .walk_files("sb", "/ws", &["node_modules"], &CancellationToken::new())
            .await
            .unwrap();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/ws/README.md", "/ws/src/app.ts", "/ws/src/util/format.ts"]
        );
        assert_eq!(files[1].name, "app.ts");
        assert_eq!(files[1].metadata.size, "/ws/src/app.ts".len() as u64);
        assert!(files.iter().all(|f| !f.metadata.is_dir));
    }

    #[tokio::test]
    async fn default_walk_of_missing_root_fails() {
        let err = memory_fs()
            .walk_files("sb", "/nope", &[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn default_walk_gives_up_once_stopped() {
        let stop = CancellationToken::new();
        stop.cancel();
        let err = memory_fs()
            .walk_files("sb", "/ws", &[], &stop)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }

    #[test]
    fn detached_context_has_no_sandbox() {
        let ctx = SandboxContext::detached("call-1");
        assert!(ctx.sandbox_id.is_none());
        assert_eq!(ctx.tool_call_id, "call-1");
    }

    #[test]
    fn context_builders() {
        let ctx = SandboxContext::new("sb-1", "call-2").with_user("user-9");
        assert_eq!(ctx.sandbox_id.as_deref(), Some("sb-1"));
        assert_eq!(ctx.user_id.as_deref(), Some("user-9"));
        assert!(!ctx.cancel.is_cancelled());
    }

    #[test]
    fn combined_output_joins_streams() {
        let out = CommandOutput {
            stdout: "built".into(),
            stderr: "warning".into(),
            exit_code: 0,
        };
        assert_eq!(out.combined(), "built\nwarning");
        assert!(out.success());

        let err_only = CommandOutput {
            stdout: String::new(),
            stderr: "boom".into(),
            exit_code: 2,
        };
        assert_eq!(err_only.combined(), "boom");
        assert!(!err_only.success());
    }
}
