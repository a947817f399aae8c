//! Local sandbox provider: one host directory per sandbox id.
//!
//! Sandbox path `/a/b.txt` of sandbox `sb-1` lives at `{root}/sb-1/a/b.txt`.
//! Commands run with [`tokio::process`] inside the mapped working directory
//! and are killed when their future is dropped. No external service is needed,
//! which makes this the provider used by tests and local development.

use super::{
    walk_stopped, CommandOutput, CommandRequest, CommandRunner, FsEntry, FsMetadata, SandboxFs,
};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Host-directory backed sandbox.
#[derive(Debug, Clone)]
pub struct LocalSandbox {
    root: PathBuf,
}

impl LocalSandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host directory holding the namespace of `sandbox_id`.
    pub fn namespace_dir(&self, sandbox_id: &str) -> io::Result<PathBuf> {
        let valid = !sandbox_id.is_empty()
            && sandbox_id != "."
            && sandbox_id != ".."
            && sandbox_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid sandbox id: {sandbox_id:?}"),
            ));
        }
        Ok(self.root.join(sandbox_id))
    }

    /// Map an absolute sandbox path onto the host. `..` never climbs above
    /// the namespace directory.
    pub fn host_path(&self, sandbox_id: &str, path: &str) -> io::Result<PathBuf> {
        if !path.starts_with('/') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("sandbox path must be absolute: {path}"),
            ));
        }
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
        let mut host = self.namespace_dir(sandbox_id)?;
        host.extend(parts);
        Ok(host)
    }
}

fn to_fs_metadata(meta: &std::fs::Metadata) -> FsMetadata {
    FsMetadata {
        is_dir: meta.is_dir(),
        size: meta.len(),
        modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    }
}

fn child_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

#[async_trait]
impl SandboxFs for LocalSandbox {
    async fn read(&self, sandbox_id: &str, path: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.host_path(sandbox_id, path)?).await
    }

    async fn write(&self, sandbox_id: &str, path: &str, content: &[u8]) -> io::Result<()> {
        tokio::fs::write(self.host_path(sandbox_id, path)?, content).await
    }

    async fn metadata(&self, sandbox_id: &str, path: &str) -> io::Result<FsMetadata> {
        let meta = tokio::fs::metadata(self.host_path(sandbox_id, path)?).await?;
        Ok(to_fs_metadata(&meta))
    }

    async fn list_dir(&self, sandbox_id: &str, path: &str) -> io::Result<Vec<FsEntry>> {
        let host = self.host_path(sandbox_id, path)?;
        let mut read_dir = tokio::fs::read_dir(&host).await?;
        let mut entries = Vec::new();

        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!("Skipping entry {name} in {path}: {e}");
                    continue;
                }
            };
            entries.push(FsEntry {
                path: child_path(path, &name),
                name,
                metadata: to_fs_metadata(&meta),
            });
        }

        Ok(entries)
    }

    async fn create_dir_all(&self, sandbox_id: &str, path: &str) -> io::Result<()> {
        tokio::fs::create_dir_all(self.host_path(sandbox_id, path)?).await
    }

    async fn walk_files(
        &self,
        sandbox_id: &str,
        root: &str,
        skip_dirs: &[&str],
        stop: &CancellationToken,
    ) -> io::Result<Vec<FsEntry>> {
        let host_root = self.host_path(sandbox_id, root)?;
        let root_meta = tokio::fs::metadata(&host_root).await?;
        if !root_meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {root}"),
            ));
        }

        let skip: Vec<String> = skip_dirs.iter().map(|s| (*s).to_string()).collect();
        let sandbox_root = root.trim_end_matches('/').to_string();
        let stop = stop.clone();

        tokio::task::spawn_blocking(move || {
            let walker = walkdir::WalkDir::new(&host_root)
                .into_iter()
                .filter_entry(|e| {
                    e.depth() == 0
                        || !e.file_type().is_dir()
                        || !skip.iter().any(|s| e.file_name().to_string_lossy() == s.as_str())
                });

            let mut files = Vec::new();
            for entry in walker {
                if stop.is_cancelled() {
                    return Err(walk_stopped());
                }
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::debug!("Skipping unreadable walk entry: {e}");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&host_root) else {
                    continue;
                };
                let relative = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let meta = match entry.metadata() {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::debug!("Skipping {relative}: {e}");
                        continue;
                    }
                };
                files.push(FsEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path: format!("{sandbox_root}/{relative}"),
                    metadata: to_fs_metadata(&meta),
                });
            }
            Ok(files)
        })
        .await
        .map_err(io::Error::other)?
    }
}

#[async_trait]
impl CommandRunner for LocalSandbox {
    async fn run_command(&self, request: &CommandRequest) -> anyhow::Result<CommandOutput> {
        let workdir = self.host_path(&request.sandbox_id, &request.working_dir)?;
        let is_dir = tokio::fs::metadata(&workdir)
            .await
            .is_ok_and(|meta| meta.is_dir());
        anyhow::ensure!(
            is_dir,
            "Working directory does not exist: {}",
            request.working_dir
        );

        let mut cmd = Command::new(&request.command);
        cmd.args(&request.args)
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(request.timeout, cmd.output())
            .await
            .map_err(|_| {
                anyhow::anyhow!("Command timed out after {}ms", request.timeout.as_millis())
            })?
            .map_err(|e| anyhow::anyhow!("Failed to run {}: {e}", request.command))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().map_or(-1, i64::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn host_path_stays_inside_namespace() {
        let sandbox = LocalSandbox::new("/srv/sandboxes");
        assert_eq!(
            sandbox.host_path("sb-1", "/ws/a.txt").unwrap(),
            PathBuf::from("/srv/sandboxes/sb-1/ws/a.txt")
        );
        assert_eq!(
            sandbox.host_path("sb-1", "/../../etc/passwd").unwrap(),
            PathBuf::from("/srv/sandboxes/sb-1/etc/passwd")
        );
    }

    #[test]
    fn rejects_unsafe_sandbox_ids_and_relative_paths() {
        let sandbox = LocalSandbox::new("/srv/sandboxes");
        assert!(sandbox.namespace_dir("..").is_err());
        assert!(sandbox.namespace_dir("a/b").is_err());
        assert!(sandbox.namespace_dir("").is_err());
        assert!(sandbox.host_path("sb-1", "ws/a.txt").is_err());
    }

    #[tokio::test]
    async fn write_read_and_list() {
        let tmp = TempDir::new().unwrap();
        let sandbox = LocalSandbox::new(tmp.path());
        sandbox.create_dir_all("sb", "/ws/src").await.unwrap();
        sandbox.write("sb", "/ws/src/main.ts", b"let x = 1;").await.unwrap();

        assert_eq!(sandbox.read("sb", "/ws/src/main.ts").await.unwrap(), b"let x = 1;");

        let entries = sandbox.list_dir("sb", "/ws").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "src");
        assert_eq!(entries[0].path, "/ws/src");
        assert!(entries[0].metadata.is_dir);

        assert!(sandbox.try_metadata("sb", "/ws/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn walk_skips_denied_directories() {
        let tmp = TempDir::new().unwrap();
        let sandbox = LocalSandbox::new(tmp.path());
        sandbox.create_dir_all("sb", "/ws/node_modules/pkg").await.unwrap();
        sandbox.create_dir_all("sb", "/ws/src").await.unwrap();
        sandbox.write("sb", "/ws/node_modules/pkg/index.js", b"x").await.unwrap();
        sandbox.write("sb", "/ws/src/app.ts", b"x").await.unwrap();

        let files = sandbox
            .walk_files("sb", "/ws", &["node_modules"], &CancellationToken::new())
            .await
            .unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["/ws/src/app.ts"]);
    }

    #[tokio::test]
    async fn walk_of_missing_root_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let sandbox = LocalSandbox::new(tmp.path());
        let err = sandbox
            .walk_files("sb", "/nope", &[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn stopped_walk_is_interrupted() {
        let tmp = TempDir::new().unwrap();
        let sandbox = LocalSandbox::new(tmp.path());
        sandbox.create_dir_all("sb", "/ws/src").await.unwrap();
        sandbox.write("sb", "/ws/src/app.ts", b"x").await.unwrap();

        let stop = CancellationToken::new();
        stop.cancel();
        let err = sandbox.walk_files("sb", "/ws", &[], &stop).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_command_captures_output_and_exit_code() {
        let tmp = TempDir::new().unwrap();
        let sandbox = LocalSandbox::new(tmp.path());
        sandbox.create_dir_all("sb", "/project").await.unwrap();

        let request = CommandRequest {
            sandbox_id: "sb".into(),
            command: "sh".into(),
            args: vec!["-c".into(), "echo out; echo err >&2; exit 3".into()],
            working_dir: "/project".into(),
            timeout: Duration::from_secs(10),
            user_id: None,
        };
        let out = sandbox.run_command(&request).await.unwrap();
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert_eq!(out.exit_code, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_command_times_out() {
        let tmp = TempDir::new().unwrap();
        let sandbox = LocalSandbox::new(tmp.path());
        sandbox.create_dir_all("sb", "/project").await.unwrap();

        let request = CommandRequest {
            sandbox_id: "sb".into(),
            command: "sleep".into(),
            args: vec!["5".into()],
            working_dir: "/project".into(),
            timeout: Duration::from_millis(100),
            user_id: None,
        };
        let err = sandbox.run_command(&request).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn run_command_needs_an_existing_directory() {
        let tmp = TempDir::new().unwrap();
        let sandbox = LocalSandbox::new(tmp.path());
        sandbox.create_dir_all("sb", "/ws").await.unwrap();
        sandbox.write("sb", "/ws/file.txt", b"x").await.unwrap();

        for working_dir in ["/missing", "/ws/file.txt"] {
            let request = CommandRequest {
                sandbox_id: "sb".into(),
                command: "true".into(),
                args: Vec::new(),
                working_dir: working_dir.into(),
                timeout: Duration::from_secs(5),
                user_id: None,
            };
            let err = sandbox.run_command(&request).await.unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("Working directory does not exist: {working_dir}")
            );
        }
    }
}
