//! # Caplet Update - Staged, Verified Package Updates
//!
//! The update pipeline checks a remote descriptor, downloads and stages a
//! new package version, re-verifies the staged content end to end, and
//! atomically promotes it to the active version.
//!
//! ## Pipeline
//!
//! ```text
//! descriptor ──▶ version compare ──▶ download ──▶ extract to staging
//!                                                       │
//!       promote ◀── persist settings ◀── verify staged ─┘
//! ```
//!
//! ## Security Notes
//!
//! - Verification happens on staged content *prior* to promotion, never
//!   after. A staged version that fails identity, version, or signature
//!   checks is deleted, and the active version stays untouched.
//! - Promotion is a critical section behind a per-pipeline lock; a second
//!   concurrent run is idempotent-safe (staging is recreated from
//!   scratch, promotion serializes).
//! - Failure or cancellation anywhere after the version check leaves the
//!   previously active version fully operable; there is no partial
//!   upgrade state.

pub mod archive;
pub mod error;
pub mod fetch;
pub mod pipeline;

pub use error::UpdateError;
pub use fetch::{RemoteDescriptor, UpdateClient};
pub use pipeline::{update_available, UpdatePipeline};

/// Crate-local result type for update operations.
pub type Result<T> = std::result::Result<T, UpdateError>;
