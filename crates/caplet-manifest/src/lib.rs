//! # Caplet Manifest - Package Descriptor Model and Trust Primitives
//!
//! This crate holds the pure, I/O-free foundations of the Caplet package
//! host: the typed manifest model, path-source classification, synthetic
//! origin derivation, dotted-numeric version ordering, and the cooperative
//! cancellation token shared by every long-running operation.
//!
//! ## Purpose
//!
//! Four core capabilities:
//!
//! 1. **Manifest Model** - Typed representation of the package descriptor
//!    (`edgeplatform.json`): identity, file records, data bindings, host
//!    compatibility constraints, and the update descriptor.
//!
//! 2. **Path Classification** - Every file path written by a package author
//!    is classified exactly once into Embedded / Online / SameOrigin /
//!    Unsupported before anything else is allowed to interpret it.
//!
//! 3. **Origin Derivation** - A deterministic, package-derived hostname
//!    ("synthetic origin") scopes trust without relying on real network
//!    identity. Requests are trusted iff their host equals that origin.
//!
//! 4. **Version Ordering** - Segment-wise numeric comparison of dotted
//!    version strings, used by the update pipeline to decide promotion.
//!
//! ## Threat Model
//!
//! | Threat | Description | Defense |
//! |--------|-------------|---------|
//! | Path confusion | Prefixed paths escaping the package root | Single-pass classification, ambiguity aborts as Unsupported |
//! | Origin spoofing | Foreign content claiming package identity | Exact host equality against the derived origin |
//! | Identity smuggling | Empty/whitespace package id | Manifest rejected at parse, never partially accepted |
//!
//! ## Security Notes
//!
//! - Classification is a pure function of the literal path string; callers
//!   must never re-derive it from mutated intermediates.
//! - An empty or unconfigured origin never yields trust.
//! - Origins are collision-prone by design: two packages sharing a first id
//!   segment share an origin. Callers must not rely on origin uniqueness
//!   beyond same-package identification.

pub mod cancel;
pub mod classify;
pub mod models;
pub mod origin;
pub mod version;

pub use cancel::{CancelToken, Cancelled};
pub use classify::{classify, Classified, SourceType};
pub use models::{
    DataBinding, FileRecord, HostBinding, Manifest, ManifestError, UpdateDescriptor,
    DEFAULT_MANIFEST_NAME,
};
pub use models::parse_manifest;
pub use origin::{derive_origin, host_of, is_trusted, ORIGIN_SUFFIX};
pub use version::compare_versions;

/// Crate-local result type for manifest operations.
pub type Result<T> = std::result::Result<T, ManifestError>;
