//! Data models for the signature manifest and verification outcomes.
//!
//! The signature manifest is a sibling of the main manifest with `.files`
//! inserted before the extension (`edgeplatform.json` →
//! `edgeplatform.files.json`): `{ signKey, files: [{ src, sign,
//! description }] }`. `signKey` is the base64-encoded DER (SPKI) public
//! key; each `sign` is a URL-safe base64 RSA signature over the file's
//! SHA-256 digest.

use caplet_manifest::Cancelled;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors produced during signature verification.
#[derive(Debug, Error)]
pub enum SigningError {
    /// A signed file exists on disk but its bytes do not match the
    /// recorded signature.
    #[error("Signature mismatch: {path}")]
    SignatureMismatch {
        /// Package-relative path of the failing file.
        path: String,
    },

    /// An asset file on disk is not covered by any signature record, or a
    /// recorded asset lost its record.
    #[error("Missing signature record for asset: {path}")]
    MissingSignature {
        /// Package-relative path of the uncovered file.
        path: String,
    },

    /// A signature record path classified as neither Embedded, SameOrigin,
    /// nor Online.
    #[error("Unsupported path in signature record: {path}")]
    UnsupportedPath {
        /// Raw record path as written.
        path: String,
    },

    /// The signing public key could not be decoded.
    #[error("Signing key error: {0}")]
    Key(String),

    /// The signature manifest is missing or malformed.
    #[error("Signature manifest error: {0}")]
    Format(String),

    /// Filesystem failure while enumerating package assets.
    #[error("I/O failure during verification: {0}")]
    Io(String),

    /// Verification was cancelled by the caller.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// Internal task join failure during concurrent verification.
    #[error("Verification task failed: {0}")]
    Join(String),
}

/// How package-level verification reports failures.
///
/// The wire format's callers are inconsistent about whether verification
/// failures should abort or merely flag; this is surfaced as an explicit
/// two-mode API instead of a hidden flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    /// Failures surface as [`SigningError`] values.
    #[default]
    Strict,

    /// Failures downgrade to [`VerifyOutcome::Unverified`] with the reason
    /// text (diagnostic mode).
    Report,
}

/// Result of verifying a whole package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Every record verified and the asset partition is exact.
    Verified,

    /// Verification failed; the reason is carried for diagnostics.
    Unverified(String),
}

impl VerifyOutcome {
    /// Returns true for [`VerifyOutcome::Verified`].
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// The signature manifest shipped next to the package manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignManifest {
    /// Base64-encoded DER (SPKI) RSA public key.
    pub sign_key: String,

    /// One record per signed file.
    pub files: Vec<SignRecord>,
}

/// A single file signature record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignRecord {
    /// Raw path of the signed file, as written by the packaging tool.
    pub src: String,

    /// URL-safe base64 signature. Empty means "intentionally unsigned,
    /// must be zero-length".
    pub sign: String,

    /// Optional packaging-tool note.
    pub description: String,
}

/// Derives the signature manifest file name from the main manifest name
/// by inserting `.files` before the extension.
///
/// # Example
///
/// ```rust
/// use caplet_signing::sign_manifest_name;
///
/// assert_eq!(sign_manifest_name("edgeplatform.json"), "edgeplatform.files.json");
/// assert_eq!(sign_manifest_name("manifest"), "manifest.files");
/// ```
pub fn sign_manifest_name(manifest_name: &str) -> String {
    match Path::new(manifest_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let stem = &manifest_name[..manifest_name.len() - ext.len() - 1];
            format!("{stem}.files.{ext}")
        }
        None => format!("{manifest_name}.files"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_manifest_name() {
        assert_eq!(sign_manifest_name("edgeplatform.json"), "edgeplatform.files.json");
        assert_eq!(sign_manifest_name("custom.manifest.json"), "custom.manifest.files.json");
        assert_eq!(sign_manifest_name("bare"), "bare.files");
    }

    #[test]
    fn test_sign_manifest_parses() {
        let bytes = br#"{
            "signKey": "QUJD",
            "files": [
                { "src": "index.html", "sign": "c2ln", "description": "entry" },
                { "src": "empty.js", "sign": "" }
            ]
        }"#;
        let parsed: SignManifest = serde_json::from_slice(bytes).unwrap();
        assert_eq!(parsed.sign_key, "QUJD");
        assert_eq!(parsed.files.len(), 2);
        assert!(parsed.files[1].sign.is_empty());
    }

    #[test]
    fn test_outcome_helpers() {
        assert!(VerifyOutcome::Verified.is_verified());
        assert!(!VerifyOutcome::Unverified("reason".into()).is_verified());
    }
}
