//! Error types for the update pipeline.

use caplet_host::HostError;
use caplet_manifest::Cancelled;
use thiserror::Error;

/// Errors produced by the update pipeline.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Descriptor fetch or archive download failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The update descriptor is malformed or incomplete.
    #[error("Update descriptor error: {0}")]
    Descriptor(String),

    /// The downloaded archive could not be extracted safely.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Staged content failed the pre-promotion checks.
    #[error("Staged package rejected: {0}")]
    StagedRejected(String),

    /// Host-layer failure passthrough (load, verify, filesystem).
    #[error(transparent)]
    Host(#[from] HostError),

    /// The update was cancelled.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl From<reqwest::Error> for UpdateError {
    fn from(e: reqwest::Error) -> Self {
        UpdateError::Transport(e.to_string())
    }
}
