//! Persisted host settings: the active package version.
//!
//! A single small JSON record in the cache directory,
//! `{ "version": "<string>" }`. Loading is best-effort (a missing or
//! corrupt record simply falls back to directory discovery); storing is
//! not, since losing the record after a promotion would reactivate the
//! old version.

use crate::fsio;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// File name of the settings record inside the cache directory.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// The persisted host settings record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Active package version (dotted-numeric), empty if never persisted.
    pub version: String,
}

/// Loads the settings record from the cache directory, if present and
/// well-formed.
pub async fn load_settings(cache_dir: &Path) -> Option<HostSettings> {
    let path = cache_dir.join(SETTINGS_FILE_NAME);
    let bytes = tokio::fs::read(&path).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(settings) => Some(settings),
        Err(e) => {
            debug!("ignoring corrupt settings record {}: {}", path.display(), e);
            None
        }
    }
}

/// Persists the settings record into the cache directory.
pub async fn store_settings(cache_dir: &Path, settings: &HostSettings) -> Result<()> {
    fsio::ensure_dir(cache_dir).await?;
    let path = cache_dir.join(SETTINGS_FILE_NAME);
    let body = serde_json::to_vec_pretty(settings)
        .map_err(|e| fsio::map_io(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| fsio::map_io(&path, e))
}
