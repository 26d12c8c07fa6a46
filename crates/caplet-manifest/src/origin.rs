//! # Synthetic Origin Derivation and Request Trust
//!
//! A package never gets a real network identity. Instead, a deterministic
//! hostname is derived from its package id and the content host maps that
//! hostname onto the package directory. Trust is then a pure string
//! question: a request is fully trusted iff its host component equals the
//! package's synthetic origin exactly.
//!
//! ## Security Notes
//!
//! - Derivation is collision-prone by design: `contoso.assistant` and
//!   `contoso.notes` share the origin `contoso.localhost`. Callers must
//!   not rely on origin uniqueness beyond same-package identification.
//! - An empty or unconfigured origin never yields trust.

/// Fixed suffix domain appended to the derived first segment.
pub const ORIGIN_SUFFIX: &str = "localhost";

/// Derives the synthetic origin hostname for a package id.
///
/// The id is trimmed, one leading `@` is stripped, the result is
/// lower-cased, and the first `.`/`/`-delimited segment is taken and
/// suffixed with `.localhost`.
///
/// Returns an empty string if no usable segment remains; an empty origin
/// is never trusted.
///
/// # Example
///
/// ```rust
/// use caplet_manifest::derive_origin;
///
/// assert_eq!(derive_origin("contoso.assistant"), "contoso.localhost");
/// assert_eq!(derive_origin("@Contoso/notes"), "contoso.localhost");
/// assert_eq!(derive_origin("  "), "");
/// ```
pub fn derive_origin(package_id: &str) -> String {
    let id = package_id.trim();
    let id = id.strip_prefix('@').unwrap_or(id);
    let lowered = id.to_lowercase();

    let first = lowered
        .split(['.', '/'])
        .next()
        .unwrap_or_default()
        .trim();
    if first.is_empty() {
        return String::new();
    }

    format!("{first}.{ORIGIN_SUFFIX}")
}

/// Extracts the host component of a request URI.
///
/// Accepts `scheme://host/...` and protocol-relative `//host/...` forms.
/// The host ends at the first `/`, `?`, `#`, or `:` (port) after the
/// authority marker. Returns `None` when no authority is present.
pub fn host_of(uri: &str) -> Option<&str> {
    let trimmed = uri.trim();
    let rest = if let Some(rest) = trimmed.strip_prefix("//") {
        rest
    } else {
        let idx = trimmed.find("://")?;
        &trimmed[idx + 3..]
    };

    let end = rest
        .find(['/', '?', '#', ':'])
        .unwrap_or(rest.len());
    let host = &rest[..end];
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Returns true iff the request URI originates from the package origin.
///
/// The comparison is exact (case-sensitive after the same lowering used
/// by [`derive_origin`]); an empty origin never trusts anything.
///
/// # Example
///
/// ```rust
/// use caplet_manifest::is_trusted;
///
/// assert!(is_trusted("https://contoso.localhost/index.html", "contoso.localhost"));
/// assert!(!is_trusted("https://evil.example.com/", "contoso.localhost"));
/// assert!(!is_trusted("https://contoso.localhost/", ""));
/// ```
pub fn is_trusted(request_uri: &str, origin: &str) -> bool {
    if origin.is_empty() {
        return false;
    }
    match host_of(request_uri) {
        Some(host) => host == origin,
        None => false,
    }
}
