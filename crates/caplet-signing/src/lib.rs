//! # Caplet Signing - File Integrity Verification
//!
//! This crate proves that the files a package ships are the files its
//! publisher signed, before any of them is trusted by the content host.
//!
//! ## Purpose
//!
//! Two layers of verification:
//!
//! 1. **Per-File Verification** - Each file streams through SHA-256 and is
//!    checked against an RSA PKCS#1 v1.5 signature recorded in the
//!    signature manifest. Streaming keeps memory bounded for arbitrarily
//!    large packages.
//!
//! 2. **Package-Level Verification** - The signature manifest must exactly
//!    partition the shipped asset set: every signed record verifies, and
//!    every asset file on disk is covered by exactly one record. Extra
//!    unsigned files are never silently allowed.
//!
//! ## Threat Model
//!
//! | Threat | Description | Defense |
//! |--------|-------------|---------|
//! | Tampered asset | Bytes modified after signing | Per-file RSA signature check |
//! | Smuggled asset | Unsigned file added to the package | Strict partition (`MissingSignature`) |
//! | Dropped record | Signature record deleted to hide an asset | Strict partition (`MissingSignature`) |
//! | Hostile record path | Record pointing outside the package | Classification gate (`UnsupportedPath`) |
//!
//! ## Security Notes
//!
//! - Online-classified records carry no local bytes and are trust-exempt
//!   for the verifier; the dispatcher still treats their hosts as
//!   untrusted.
//! - An empty signature is valid only for a zero-length file; this is an
//!   explicit "intentionally unsigned but must be empty" policy.
//! - Verification failures surface in one of two caller-chosen modes:
//!   `Strict` (errors) or `Report` (a reported `Unverified` outcome).

pub mod models;
pub mod package;
pub mod verifier;

pub use models::{
    sign_manifest_name, SignManifest, SignRecord, SigningError, VerifyMode, VerifyOutcome,
};
pub use package::{verify_package, ASSET_EXTENSIONS};
pub use verifier::FileVerifier;

/// Crate-local result type for signing operations.
pub type Result<T> = std::result::Result<T, SigningError>;
