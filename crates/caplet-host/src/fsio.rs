//! # Fallible Filesystem Layer
//!
//! Every filesystem call the host makes funnels through this module, so
//! external `std::io::Error` values map onto the host error taxonomy in
//! exactly one place: `NotFound` and `PermissionDenied` get their own
//! variants, everything else stays a generic `Io` carrying the path.
//!
//! The one non-trivial operation is [`read_for_transfer`]: package assets
//! may be concurrently rewritten or held open by tooling, so a failed
//! read falls back to copying the file into a private scratch area and
//! serving the copy. File handles are scoped to each call and release on
//! early-return paths.

use crate::error::HostError;
use crate::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Maps an I/O error onto the host taxonomy for the given path.
pub(crate) fn map_io(path: &Path, e: std::io::Error) -> HostError {
    let path = path.display().to_string();
    match e.kind() {
        ErrorKind::NotFound => HostError::NotFound { path },
        ErrorKind::PermissionDenied => HostError::PermissionDenied { path },
        _ => HostError::Io { path, source: e },
    }
}

/// Reads a file fully into memory.
pub async fn read(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| map_io(path, e))
}

/// Creates a directory (and parents) if missing. Idempotent.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| map_io(path, e))
}

/// Deletes a directory tree if it exists. Missing is not an error.
pub async fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(map_io(path, e)),
    }
}

/// Moves a directory into place. The destination must not exist; callers
/// delete any stale destination first so there is never a merge.
pub async fn move_dir(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::rename(from, to).await.map_err(|e| map_io(from, e))
}

/// Reads a file, tolerating the source being locked by another process.
///
/// On a non-`NotFound` read failure the file is copied into `scratch_dir`
/// and the copy is read instead; a held handle elsewhere is expected, not
/// exceptional.
pub async fn read_for_transfer(path: &Path, scratch_dir: &Path) -> Result<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(map_io(path, e)),
        Err(first) => {
            debug!(
                "direct read of {} failed ({}), serving from scratch copy",
                path.display(),
                first
            );
            let copy = scratch_copy_path(path, scratch_dir);
            ensure_dir(scratch_dir).await?;
            tokio::fs::copy(path, &copy)
                .await
                .map_err(|e| map_io(path, e))?;
            let bytes = tokio::fs::read(&copy).await.map_err(|e| map_io(&copy, e))?;
            let _ = tokio::fs::remove_file(&copy).await;
            Ok(bytes)
        }
    }
}

fn scratch_copy_path(path: &Path, scratch_dir: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "transfer".to_string());
    scratch_dir.join(name)
}
