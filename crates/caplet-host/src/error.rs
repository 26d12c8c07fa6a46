//! Error types for package hosting.

use caplet_manifest::{Cancelled, ManifestError};
use caplet_signing::SigningError;
use thiserror::Error;

/// Errors produced while loading or operating a package host.
#[derive(Debug, Error)]
pub enum HostError {
    /// The package root or a resolvable version directory is missing.
    #[error("Directory not found: {path}")]
    DirectoryNotFound {
        /// The missing directory.
        path: String,
    },

    /// The manifest's package id differs from the caller-supplied
    /// expected id.
    #[error("Package identity mismatch: expected '{expected}', manifest has '{actual}'")]
    IdentityMismatch {
        /// Id the caller expected to host.
        expected: String,
        /// Id the manifest actually carries.
        actual: String,
    },

    /// A referenced file or directory does not exist.
    #[error("Not found: {path}")]
    NotFound {
        /// The missing path.
        path: String,
    },

    /// The filesystem refused access.
    #[error("Permission denied: {path}")]
    PermissionDenied {
        /// The refused path.
        path: String,
    },

    /// A path reference cannot be resolved to a local file.
    #[error("Unsupported path: {path}")]
    UnsupportedPath {
        /// The raw reference.
        path: String,
    },

    /// Verification failed and the caller required a verified package.
    #[error("Package is not verified: {0}")]
    Unverified(String),

    /// Any other filesystem failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path being accessed.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Manifest parse failure passthrough.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Signature verification failure passthrough.
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// The operation was cancelled.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}
