//! # Package Host Facade
//!
//! Orchestrates a package load end to end: resolve the active version
//! directory, parse and validate the manifest, verify every shipped file,
//! and expose path mapping and transfer reads to the rest of the system.
//!
//! The load sequence is phase-ordered and fail-closed, in the same shape
//! for initial load and for re-verification:
//!
//! 1. resolve directories (`DirectoryNotFound` on failure);
//! 2. parse the manifest (`ParseError` / `IdentityMismatch`);
//! 3. verify the package (strict error or recorded `Unverified`).
//!
//! A host is only ever returned fully initialized; there is no partially
//! loaded state to misuse.

use crate::error::HostError;
use crate::fsio;
use crate::paths::{PackageContext, ResolvedPath};
use crate::settings;
use crate::Result;
use caplet_manifest::{
    compare_versions, parse_manifest, CancelToken, Manifest, DEFAULT_MANIFEST_NAME,
};
use caplet_signing::{verify_package, VerifyMode, VerifyOutcome};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Options controlling a package load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Package id the caller expects to host; a manifest carrying a
    /// different id is a hard failure.
    pub expected_id: Option<String>,

    /// Manifest file name inside the version directory.
    pub manifest_name: String,

    /// How verification failures surface.
    pub verify_mode: VerifyMode,

    /// Whether an unverified package is refused (`true`) or hosted in
    /// diagnostic mode (`false`). Only meaningful with
    /// [`VerifyMode::Report`]; strict-mode failures always refuse.
    pub require_verified: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            expected_id: None,
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            verify_mode: VerifyMode::Strict,
            require_verified: true,
        }
    }
}

/// A loaded, identity-checked, verification-stamped package host.
///
/// # Concurrency
///
/// After load the host is read-only; dispatcher requests may share it
/// freely behind an `Arc` with no locking.
#[derive(Debug)]
pub struct PackageHost {
    context: PackageContext,
    manifest: Manifest,
    manifest_name: String,
    verify_mode: VerifyMode,
    verified: bool,
}

impl PackageHost {
    /// Loads the package rooted at `root_dir`.
    ///
    /// Ensures `data/` and `cache/` exist, resolves the active version
    /// directory (persisted settings first, then the most recently
    /// created `v*` directory), parses and identity-checks the manifest,
    /// and runs package verification.
    ///
    /// # Errors
    ///
    /// - [`HostError::DirectoryNotFound`] - missing root or no resolvable
    ///   version directory
    /// - [`HostError::IdentityMismatch`] - manifest id differs from
    ///   `options.expected_id`
    /// - [`HostError::Manifest`] - malformed manifest
    /// - [`HostError::Signing`] - strict-mode verification failure
    /// - [`HostError::Unverified`] - report-mode failure with
    ///   `require_verified`
    /// - [`HostError::Cancelled`]
    pub async fn load(
        root_dir: &Path,
        options: LoadOptions,
        cancel: &CancelToken,
    ) -> Result<Self> {
        cancel.checkpoint()?;

        let root_meta = tokio::fs::metadata(root_dir).await;
        if !root_meta.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(HostError::DirectoryNotFound {
                path: root_dir.display().to_string(),
            });
        }

        let data_dir = root_dir.join("data");
        let cache_dir = root_dir.join("cache");
        fsio::ensure_dir(&data_dir).await?;
        fsio::ensure_dir(&cache_dir).await?;

        let version_dir = resolve_version_dir(root_dir, &cache_dir).await?;
        debug!("active version directory: {}", version_dir.display());

        cancel.checkpoint()?;
        let manifest_path = version_dir.join(&options.manifest_name);
        let manifest = parse_manifest(&fsio::read(&manifest_path).await?)?;

        if let Some(expected) = &options.expected_id {
            if expected.trim() != manifest.id.trim() {
                return Err(HostError::IdentityMismatch {
                    expected: expected.clone(),
                    actual: manifest.id.clone(),
                });
            }
        }

        let context = PackageContext::new(&manifest.id, root_dir, &version_dir);
        let outcome =
            verify_package(&version_dir, &options.manifest_name, options.verify_mode, cancel)
                .await?;
        let verified = match outcome {
            VerifyOutcome::Verified => true,
            VerifyOutcome::Unverified(reason) => {
                if options.require_verified {
                    return Err(HostError::Unverified(reason));
                }
                warn!("hosting unverified package '{}': {}", manifest.id, reason);
                false
            }
        };

        info!(
            "package '{}' v{} loaded at origin {} (verified: {})",
            manifest.id, manifest.version, context.origin, verified
        );
        Ok(Self {
            context,
            manifest,
            manifest_name: options.manifest_name,
            verify_mode: options.verify_mode,
            verified,
        })
    }

    /// The immutable package context.
    pub fn context(&self) -> &PackageContext {
        &self.context
    }

    /// The verified manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The manifest file name this host was loaded with.
    pub fn manifest_name(&self) -> &str {
        &self.manifest_name
    }

    /// The package's synthetic origin.
    pub fn origin(&self) -> &str {
        &self.context.origin
    }

    /// The active version directory.
    pub fn version_dir(&self) -> &Path {
        &self.context.version_dir
    }

    /// Whether the last verification pass succeeded.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Re-runs package verification and updates the verified flag.
    pub async fn reverify(&mut self, cancel: &CancelToken) -> Result<bool> {
        let outcome = verify_package(
            &self.context.version_dir,
            &self.manifest_name,
            self.verify_mode,
            cancel,
        )
        .await?;
        self.verified = outcome.is_verified();
        Ok(self.verified)
    }

    /// Resolves a raw reference to a local path or external URL.
    pub fn resolve_local_path(&self, raw: &str) -> ResolvedPath {
        self.context.resolve_local_path(raw)
    }

    /// Maps a raw reference onto the synthetic origin.
    pub fn resolve_virtual_path(&self, raw: &str) -> String {
        self.context.resolve_virtual_path(raw)
    }

    /// Reads a referenced file for transfer to the content host,
    /// tolerating a source locked by another process.
    ///
    /// # Errors
    ///
    /// [`HostError::UnsupportedPath`] for external URLs, otherwise the
    /// mapped filesystem error.
    pub async fn read_for_transfer(&self, raw: &str) -> Result<Vec<u8>> {
        match self.context.resolve_local_path(raw) {
            ResolvedPath::Local(path) => {
                fsio::read_for_transfer(&path, &self.context.scratch_dir()).await
            }
            ResolvedPath::External(url) => Err(HostError::UnsupportedPath { path: url }),
        }
    }
}

/// Resolves the active version directory: the persisted settings record
/// if it names an existing `v*` directory, else the most recently created
/// one, with the highest version name breaking creation-time ties.
async fn resolve_version_dir(root_dir: &Path, cache_dir: &Path) -> Result<PathBuf> {
    if let Some(stored) = settings::load_settings(cache_dir).await {
        if !stored.version.trim().is_empty() {
            let candidate = root_dir.join(format!("v{}", stored.version.trim()));
            if candidate.is_dir() {
                return Ok(candidate);
            }
            warn!(
                "settings name version {} but {} is missing; falling back to discovery",
                stored.version,
                candidate.display()
            );
        }
    }

    let mut candidates: Vec<(PathBuf, Option<SystemTime>, String)> = Vec::new();
    let mut entries = tokio::fs::read_dir(root_dir)
        .await
        .map_err(|e| fsio::map_io(root_dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| fsio::map_io(root_dir, e))?
    {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(version) = name.strip_prefix('v') else {
            continue;
        };
        if version.is_empty() {
            continue;
        }
        let created = entry
            .metadata()
            .await
            .ok()
            .and_then(|m| m.created().or_else(|_| m.modified()).ok());
        candidates.push((path, created, version.to_string()));
    }

    candidates.sort_by(version_dir_order);

    candidates
        .pop()
        .map(|(path, _, _)| path)
        .ok_or_else(|| HostError::DirectoryNotFound {
            path: root_dir.join("v*").display().to_string(),
        })
}

/// Total order over version-directory candidates: creation time first
/// (entries without one sort earliest), version number breaking ties.
fn version_dir_order(
    a: &(PathBuf, Option<SystemTime>, String),
    b: &(PathBuf, Option<SystemTime>, String),
) -> std::cmp::Ordering {
    a.1.cmp(&b.1).then_with(|| compare_versions(&a.2, &b.2))
}
