//! Zip extraction into the staging directory.
//!
//! Extraction is blocking work and runs under `spawn_blocking`. Entry
//! names are confined to the staging root: an entry whose normalized
//! path escapes it fails the whole extraction.

use crate::error::UpdateError;
use crate::Result;
use caplet_manifest::CancelToken;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

/// Extracts `archive_path` into `dest`, which must already exist.
///
/// # Errors
///
/// [`UpdateError::Archive`] on a malformed archive or an entry escaping
/// the destination; [`UpdateError::Cancelled`] when the token fires
/// between entries.
pub async fn extract_zip(archive_path: &Path, dest: &Path, cancel: &CancelToken) -> Result<()> {
    let archive_path = archive_path.to_path_buf();
    let dest = dest.to_path_buf();
    let cancel = cancel.clone();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::open(&archive_path)
            .map_err(|e| UpdateError::Archive(format!("cannot open archive: {e}")))?;
        let mut archive =
            ZipArchive::new(file).map_err(|e| UpdateError::Archive(e.to_string()))?;

        for index in 0..archive.len() {
            cancel.checkpoint()?;
            let mut entry = archive
                .by_index(index)
                .map_err(|e| UpdateError::Archive(e.to_string()))?;
            let rel = entry.enclosed_name().ok_or_else(|| {
                UpdateError::Archive(format!("entry '{}' escapes staging root", entry.name()))
            })?;
            let out = dest.join(rel);

            if entry.is_dir() {
                std::fs::create_dir_all(&out)
                    .map_err(|e| UpdateError::Archive(e.to_string()))?;
                continue;
            }
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| UpdateError::Archive(e.to_string()))?;
            }
            let mut target = std::fs::File::create(&out)
                .map_err(|e| UpdateError::Archive(format!("cannot create {}: {e}", out.display())))?;
            std::io::copy(&mut entry, &mut target)
                .map_err(|e| UpdateError::Archive(e.to_string()))?;
        }

        debug!("extracted {} entries into {}", archive.len(), dest.display());
        Ok(())
    })
    .await
    .map_err(|e| UpdateError::Archive(format!("extraction task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, bytes) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn test_extracts_nested_entries() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.zip");
        write_zip(
            &archive,
            &[
                ("index.html", b"<html></html>"),
                ("scripts/app.js", b"console.log(1);"),
            ],
        );

        let dest = dir.path().join("staging");
        std::fs::create_dir_all(&dest).unwrap();
        let cancel = CancelToken::new();
        extract_zip(&archive, &dest, &cancel).await.unwrap();

        assert!(dest.join("index.html").is_file());
        assert_eq!(
            std::fs::read(dest.join("scripts/app.js")).unwrap(),
            b"console.log(1);"
        );
    }

    #[tokio::test]
    async fn test_traversal_entry_rejected() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(&archive, &[("../outside.txt", b"escape")]);

        let dest = dir.path().join("staging");
        std::fs::create_dir_all(&dest).unwrap();
        let cancel = CancelToken::new();
        let err = extract_zip(&archive, &dest, &cancel).await.unwrap_err();
        assert!(matches!(err, UpdateError::Archive(_)));
        assert!(!dir.path().join("outside.txt").exists());
    }

    #[tokio::test]
    async fn test_garbage_archive_rejected() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bad.zip");
        std::fs::write(&archive, b"this is not a zip").unwrap();

        let dest = dir.path().join("staging");
        std::fs::create_dir_all(&dest).unwrap();
        let cancel = CancelToken::new();
        assert!(extract_zip(&archive, &dest, &cancel).await.is_err());
    }

    #[tokio::test]
    async fn test_cancellation() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.zip");
        write_zip(&archive, &[("a.txt", b"a")]);

        let dest = dir.path().join("staging");
        std::fs::create_dir_all(&dest).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            extract_zip(&archive, &dest, &cancel).await,
            Err(UpdateError::Cancelled(_))
        ));
    }
}
