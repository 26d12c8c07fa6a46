//! # The Update Pipeline
//!
//! Orchestrates a full update round: read the active manifest's update
//! descriptor, ask the endpoint for a newer version, download and stage
//! it, verify the staged tree, and promote it into place.
//!
//! Promotion is the only step that touches the active package layout and
//! runs under a per-pipeline lock; every earlier step works inside the
//! cache directory. Staging is recreated from scratch on each run, so a
//! re-entrant run is safe, and any failure deletes the staged tree and
//! leaves the previously active version fully operable.

use crate::archive::extract_zip;
use crate::error::UpdateError;
use crate::fetch::{RemoteDescriptor, UpdateClient};
use crate::Result;
use caplet_host::settings::{self, HostSettings};
use caplet_host::{fsio, HostError, LoadOptions, PackageHost};
use caplet_manifest::{compare_versions, parse_manifest, CancelToken, DEFAULT_MANIFEST_NAME};
use caplet_signing::{verify_package, SigningError, VerifyMode};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Decides whether a remote descriptor warrants an update.
///
/// True iff the offered version is strictly greater than the current one,
/// or the descriptor carries the force flag.
///
/// # Example
///
/// ```rust
/// use caplet_update::{update_available, RemoteDescriptor};
///
/// let remote = RemoteDescriptor { version: "1.0".to_string(), ..Default::default() };
/// assert!(!update_available("1.0", &remote));
/// assert!(update_available("0.9", &remote));
/// ```
pub fn update_available(current_version: &str, remote: &RemoteDescriptor) -> bool {
    remote.force || compare_versions(&remote.version, current_version) == Ordering::Greater
}

/// Checks for, stages, verifies, and promotes package updates.
///
/// No two runs for the same package may promote concurrently; promotion
/// is a critical section behind the pipeline's lock.
pub struct UpdatePipeline {
    root_dir: PathBuf,
    manifest_name: String,
    client: UpdateClient,
    promote_lock: Mutex<()>,
}

impl UpdatePipeline {
    /// Creates a pipeline for the package rooted at `root_dir`.
    pub fn new(root_dir: &Path) -> Self {
        Self {
            root_dir: root_dir.to_path_buf(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            client: UpdateClient::new(),
            promote_lock: Mutex::new(()),
        }
    }

    /// Overrides the manifest file name.
    pub fn with_manifest_name(mut self, name: &str) -> Self {
        self.manifest_name = name.to_string();
        self
    }

    /// Runs one full update round.
    ///
    /// Returns the newly promoted version, or `None` when no update is
    /// configured, offered, or warranted.
    ///
    /// The active manifest is read in diagnostic mode so a damaged
    /// current install can still be repaired by an update; the *staged*
    /// content is always verified strictly before promotion.
    ///
    /// # Errors
    ///
    /// Any error after the version check aborts with the active version
    /// untouched.
    pub async fn check_and_update(&self, cancel: &CancelToken) -> Result<Option<String>> {
        let options = LoadOptions {
            verify_mode: VerifyMode::Report,
            require_verified: false,
            manifest_name: self.manifest_name.clone(),
            expected_id: None,
        };
        let host = PackageHost::load(&self.root_dir, options, cancel).await?;

        let Some(descriptor) = host.manifest().update.clone() else {
            debug!("package '{}' declares no update descriptor", host.manifest().id);
            return Ok(None);
        };
        if descriptor.url.trim().is_empty() {
            return Ok(None);
        }

        let Some(remote) = self.client.fetch_descriptor(&descriptor, cancel).await? else {
            return Ok(None);
        };
        let current_version = host.manifest().version.clone();
        if !update_available(&current_version, &remote) {
            debug!(
                "no update: current {} vs offered {}",
                current_version, remote.version
            );
            return Ok(None);
        }
        info!(
            "update available for '{}': {} -> {}{}",
            host.manifest().id,
            current_version,
            remote.version,
            if remote.force { " (forced)" } else { "" }
        );

        if remote.url.trim().is_empty() {
            return Err(UpdateError::Descriptor(
                "descriptor offers a version but no download url".to_string(),
            ));
        }

        let download_dir = host.context().cache_dir.join("download");
        fsio::ensure_dir(&download_dir).await?;
        let archive_path = download_dir.join(format!("package-{}.zip", remote.version.trim()));
        self.client
            .download(&remote.url, &remote.params, &archive_path, cancel)
            .await?;

        let result = self
            .promote_archive(&archive_path, &remote.version, &host.manifest().id, cancel)
            .await;
        let _ = tokio::fs::remove_file(&archive_path).await;
        result?;

        Ok(Some(remote.version.trim().to_string()))
    }

    /// Stages a downloaded archive, verifies it, and promotes it to the
    /// active version.
    ///
    /// Verification happens on staged content prior to promotion, never
    /// after. On any failure the staging directory is deleted and the
    /// previously active version stays untouched.
    pub async fn promote_archive(
        &self,
        archive_path: &Path,
        expected_version: &str,
        expected_id: &str,
        cancel: &CancelToken,
    ) -> Result<()> {
        let cache_dir = self.root_dir.join("cache");
        let staging = cache_dir.join("staging");

        fsio::remove_dir_all_if_exists(&staging).await?;
        fsio::ensure_dir(&staging).await?;

        if let Err(e) = self
            .verify_staged(&staging, archive_path, expected_version, expected_id, cancel)
            .await
        {
            warn!("staged package rejected: {e}");
            let _ = fsio::remove_dir_all_if_exists(&staging).await;
            return Err(e);
        }

        // Critical section: promotion is serialized per pipeline.
        let _guard = self.promote_lock.lock().await;
        cancel.checkpoint()?;
        let target = self.root_dir.join(format!("v{}", expected_version.trim()));
        fsio::remove_dir_all_if_exists(&target).await?;
        fsio::move_dir(&staging, &target).await?;
        settings::store_settings(
            &cache_dir,
            &HostSettings {
                version: expected_version.trim().to_string(),
            },
        )
        .await?;

        info!("promoted version {} at {}", expected_version, target.display());
        Ok(())
    }

    /// Extracts and fully checks staged content: manifest parse, identity,
    /// version match against the descriptor, and strict verification.
    async fn verify_staged(
        &self,
        staging: &Path,
        archive_path: &Path,
        expected_version: &str,
        expected_id: &str,
        cancel: &CancelToken,
    ) -> Result<()> {
        extract_zip(archive_path, staging, cancel).await?;

        let manifest_path = staging.join(&self.manifest_name);
        let manifest = parse_manifest(&fsio::read(&manifest_path).await?)
            .map_err(HostError::from)?;

        if !expected_id.trim().is_empty() && manifest.id.trim() != expected_id.trim() {
            return Err(UpdateError::StagedRejected(format!(
                "staged package id '{}' does not match '{}'",
                manifest.id, expected_id
            )));
        }
        if compare_versions(&manifest.version, expected_version) != Ordering::Equal {
            return Err(UpdateError::StagedRejected(format!(
                "staged version '{}' does not match offered '{}'",
                manifest.version, expected_version
            )));
        }

        match verify_package(staging, &self.manifest_name, VerifyMode::Strict, cancel).await {
            Ok(_) => Ok(()),
            Err(SigningError::Cancelled(c)) => Err(UpdateError::Cancelled(c)),
            Err(e) => Err(UpdateError::StagedRejected(e.to_string())),
        }
    }
}
