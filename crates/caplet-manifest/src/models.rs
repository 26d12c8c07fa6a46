//! # Core Data Models for the Package Manifest
//!
//! This module defines the typed shape of a package descriptor. A package
//! is a versioned directory tree of web assets; its manifest declares
//! identity, the signed file set, data bindings, host compatibility
//! constraints, and where to look for updates.
//!
//! ## Threat Model
//!
//! The types here defend against:
//!
//! - **Partial Acceptance**: `parse_manifest` either yields a complete,
//!   identity-bearing manifest or an error. There is no half-parsed state.
//! - **Identity Smuggling**: An empty or whitespace `id` is rejected at
//!   parse time, before any caller can derive an origin from it.
//!
//! ## External Format
//!
//! The manifest file is JSON with camelCase keys, default name
//! `edgeplatform.json`. All fields except the overall shape are optional
//! and default to empty, matching how package authors actually write them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Default file name of the package manifest inside a version directory.
pub const DEFAULT_MANIFEST_NAME: &str = "edgeplatform.json";

/// Errors produced while parsing a package manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The document could not be parsed into the expected shape, or the
    /// parsed manifest carries an empty identity.
    #[error("Manifest format error: {0}")]
    Format(String),
}

/// A package descriptor.
///
/// Invariant: `id` is never empty once a manifest is considered loaded.
/// [`parse_manifest`] enforces this; manifests failing it are rejected,
/// not partially accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Manifest {
    /// Package identity, e.g. `contoso.assistant`. The first `.`/`/`
    /// segment seeds the synthetic origin.
    pub id: String,

    /// Human-readable package name.
    pub name: String,

    /// Dotted-numeric version string, e.g. `"1.4.2"`.
    pub version: String,

    /// Human-readable description.
    pub description: String,

    /// Publishing organization.
    pub publisher: String,

    /// Publisher or product website.
    pub website: String,

    /// Entry document served when the content host navigates to the
    /// package origin, relative to the version directory.
    pub homepage_path: String,

    /// Page-asset file records, in author order.
    pub files: Vec<FileRecord>,

    /// Named JSON data files shipped with the package.
    pub json_bindings: Vec<DataBinding>,

    /// Named text data files shipped with the package.
    pub text_bindings: Vec<DataBinding>,

    /// Compatibility constraints against the embedding host.
    pub host_binding: Option<HostBinding>,

    /// Where and how to look for newer versions.
    pub update: Option<UpdateDescriptor>,

    /// Free-form tags.
    pub tags: Vec<String>,
}

/// A single file reference as written by the package author.
///
/// The raw `path` is classified once by [`crate::classify::classify`];
/// the derived source type and normalized form are never stored here,
/// keeping the record a plain value with no hidden lazy state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRecord {
    /// Raw path, exactly as written in the manifest.
    #[serde(alias = "src")]
    pub path: String,

    /// Optional author note.
    pub description: String,
}

/// A named data-file record (JSON or text binding).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataBinding {
    /// Binding name the embedded content refers to.
    pub name: String,

    /// File path, subject to the same classification rules as assets.
    pub path: String,
}

/// Compatibility constraints against the embedding host application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostBinding {
    /// Identity of the host application this package targets.
    pub app_id: String,

    /// Host framework kind, e.g. `"webview2"`.
    pub framework: String,

    /// Minimum compatible host version (dotted-numeric), empty = unbounded.
    pub min_version: String,

    /// Maximum compatible host version (dotted-numeric), empty = unbounded.
    pub max_version: String,
}

/// Where the update pipeline looks for a newer package version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateDescriptor {
    /// Remote descriptor URL. Empty means updates are not configured.
    pub url: String,

    /// Query parameters appended to the descriptor request.
    pub params: BTreeMap<String, String>,

    /// Property name under which the descriptor is nested in the response
    /// body. `None` means the body itself is the descriptor.
    pub response_path: Option<String>,
}

/// Parses a package manifest from raw bytes.
///
/// Parsing is total and side-effect-free: the result is either a complete
/// [`Manifest`] or a [`ManifestError::Format`].
///
/// # Errors
///
/// Returns `ManifestError::Format` if the document is not valid JSON of
/// the expected shape, or if `id` is empty/whitespace after parse.
///
/// # Example
///
/// ```rust
/// use caplet_manifest::parse_manifest;
///
/// let bytes = br#"{ "id": "contoso.assistant", "version": "1.0" }"#;
/// let manifest = parse_manifest(bytes).unwrap();
/// assert_eq!(manifest.id, "contoso.assistant");
/// assert!(parse_manifest(br#"{ "id": "  " }"#).is_err());
/// ```
pub fn parse_manifest(bytes: &[u8]) -> Result<Manifest, ManifestError> {
    let manifest: Manifest =
        serde_json::from_slice(bytes).map_err(|e| ManifestError::Format(e.to_string()))?;

    if manifest.id.trim().is_empty() {
        return Err(ManifestError::Format(
            "manifest id is empty or whitespace".to_string(),
        ));
    }

    Ok(manifest)
}
