//! Remote descriptor fetch and archive download.
//!
//! Thin layer over the HTTP client: fetch the update descriptor (JSON,
//! optionally nested under a configurable property) and stream an archive
//! to disk with cancellation polled between chunks.

use crate::error::UpdateError;
use crate::Result;
use caplet_manifest::{CancelToken, UpdateDescriptor};
use futures_util::StreamExt;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Request timeout for descriptor fetch and download.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// The descriptor returned by the update endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteDescriptor {
    /// Version offered by the endpoint. Empty means no update available.
    pub version: String,

    /// Force the update even when the version is not strictly greater.
    pub force: bool,

    /// Archive download URL.
    pub url: String,

    /// Query parameters for the archive download.
    pub params: BTreeMap<String, String>,
}

/// HTTP client for update traffic.
#[derive(Debug, Clone)]
pub struct UpdateClient {
    http: reqwest::Client,
}

impl Default for UpdateClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateClient {
    /// Creates a client with the pipeline's timeout policy.
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http }
    }

    /// Fetches and decodes the update descriptor.
    ///
    /// Returns `None` when the endpoint offers no version (absent or
    /// empty `version` field).
    ///
    /// # Errors
    ///
    /// [`UpdateError::Transport`] on request failure,
    /// [`UpdateError::Descriptor`] on an unreadable body.
    pub async fn fetch_descriptor(
        &self,
        descriptor: &UpdateDescriptor,
        cancel: &CancelToken,
    ) -> Result<Option<RemoteDescriptor>> {
        cancel.checkpoint()?;

        let response = self
            .http
            .get(&descriptor.url)
            .query(&descriptor.params)
            .send()
            .await?
            .error_for_status()?;
        let body: serde_json::Value = response.json().await?;

        let nested = match &descriptor.response_path {
            Some(path) => body.get(path).cloned().ok_or_else(|| {
                UpdateError::Descriptor(format!("response has no '{path}' property"))
            })?,
            None => body,
        };
        let remote: RemoteDescriptor = serde_json::from_value(nested)
            .map_err(|e| UpdateError::Descriptor(e.to_string()))?;

        if remote.version.trim().is_empty() {
            debug!("update endpoint offers no version");
            return Ok(None);
        }
        Ok(Some(remote))
    }

    /// Streams an archive download to `dest`, polling cancellation
    /// between chunks.
    pub async fn download(
        &self,
        url: &str,
        params: &BTreeMap<String, String>,
        dest: &Path,
        cancel: &CancelToken,
    ) -> Result<()> {
        cancel.checkpoint()?;

        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await?
            .error_for_status()?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| UpdateError::Transport(format!("cannot create {}: {e}", dest.display())))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            cancel.checkpoint()?;
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| UpdateError::Transport(format!("write failed: {e}")))?;
        }
        file.flush()
            .await
            .map_err(|e| UpdateError::Transport(format!("flush failed: {e}")))?;

        debug!("downloaded {} to {}", url, dest.display());
        Ok(())
    }
}
