//! Bounded recursive traversal shared by the search and find tools.

use super::error::ToolError;
use super::pattern::SKIPPED_DIRS;
use crate::sandbox::{FsEntry, SandboxFs};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// All files under `root`, skipping [`SKIPPED_DIRS`], sorted by path.
///
/// Fails with `NotFound` / `NotADirectory` when the root is unusable and with
/// `Timeout` when the walk exceeds `deadline`. A walk that times out is told
/// to stop instead of running on in the background.
pub async fn collect_files(
    fs: &dyn SandboxFs,
    sandbox_id: &str,
    root: &str,
    deadline: Duration,
    tool: &str,
) -> Result<Vec<FsEntry>, ToolError> {
    let meta = fs
        .metadata(sandbox_id, root)
        .await
        .map_err(|e| ToolError::from_io("inspect", root, e))?;
    if !meta.is_dir {
        return Err(ToolError::NotADirectory {
            path: root.to_string(),
        });
    }

    // Stops the provider's walk on timeout or when this future is dropped.
    let stop = CancellationToken::new();
    let _stop_on_drop = stop.clone().drop_guard();

    let walk = fs.walk_files(sandbox_id, root, SKIPPED_DIRS, &stop);
    let mut files = tokio::time::timeout(deadline, walk)
        .await
        .map_err(|_| ToolError::Timeout {
            tool: tool.to_string(),
            elapsed: deadline,
        })?
        .map_err(|e| ToolError::from_io("scan", root, e))?;

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
