//! # Caplet Host - Verified Package Hosting
//!
//! The package host locates the installed version of a package, parses
//! and validates its manifest, verifies every shipped file, and exposes
//! path mapping between the package's synthetic origin and the local
//! filesystem.
//!
//! ## Load State Machine
//!
//! ```text
//! Start ──▶ DirectoryResolved ──▶ ManifestParsed ──▶ Verified
//!   │               │                    │               │
//!   └─ DirectoryNotFound                 └─ IdentityMismatch / ParseError
//!                                                        │
//!                                        VerificationFailed (refused or
//!                                        hosted in diagnostic mode)
//! ```
//!
//! Terminal states are a fully operable [`PackageHost`] or an error;
//! `load` never returns a half-initialized host.
//!
//! ## Directory Layout
//!
//! ```text
//! <root>/
//!   v1.4.2/            active version directory (read-only package tree)
//!   v1.5.0/            another installed version
//!   data/              user data, survives updates
//!   cache/             ephemeral: settings.json, scratch/, staging/
//! ```
//!
//! ## Security Notes
//!
//! - Identity is checked before verification: a manifest whose id differs
//!   from the caller-supplied expectation is a hard failure, never a
//!   silent fallback.
//! - `.data:` paths resolve under the data directory and deliberately
//!   cross version boundaries; everything else stays under the version
//!   tree or passes through as an external URL.

pub mod error;
pub mod fsio;
pub mod host;
pub mod paths;
pub mod settings;

pub use error::HostError;
pub use host::{LoadOptions, PackageHost};
pub use paths::{PackageContext, ResolvedPath};
pub use settings::{HostSettings, SETTINGS_FILE_NAME};

/// Crate-local result type for host operations.
pub type Result<T> = std::result::Result<T, HostError>;
