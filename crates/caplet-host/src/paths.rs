//! # Path Resolution Against the Package Context
//!
//! Raw references from manifests and protocol messages resolve through a
//! priority-ordered rewrite over an immutable [`PackageContext`]. The
//! ordering is load-bearing: `.data:` must be checked before generic
//! `.`-prefix handling, or data paths would be misrouted into the
//! read-only package tree.
//!
//! | Priority | Prefix | Resolves against |
//! |---|---|---|
//! | 1 | `../` | parent of the version directory |
//! | 2 | `.data:` | data directory (survives updates) |
//! | 3 | `.asset:` | version directory |
//! | 4 | `~` | version directory |
//! | 5 | `%NAME%` | OS special folder / environment |
//! | 6 | `scheme://` | passes through unchanged |
//! | 7 | anything else | version directory |

use caplet_manifest::{classify, derive_origin, SourceType};
use std::path::{Path, PathBuf};

/// Immutable per-package resolution context, shared by reference.
///
/// Built once per load; path resolution and classification are pure
/// functions over this value, with no hidden lazy state.
#[derive(Debug, Clone)]
pub struct PackageContext {
    /// Package id from the verified manifest.
    pub package_id: String,

    /// Synthetic origin derived from the package id.
    pub origin: String,

    /// Package root containing version, data, and cache directories.
    pub root_dir: PathBuf,

    /// The active version directory.
    pub version_dir: PathBuf,

    /// User data directory; survives updates.
    pub data_dir: PathBuf,

    /// Ephemeral cache directory; may be purged.
    pub cache_dir: PathBuf,
}

/// Result of resolving a raw reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// A path on the local filesystem.
    Local(PathBuf),

    /// An absolute URL, passed through unchanged.
    External(String),
}

impl PackageContext {
    /// Builds the context for a package rooted at `root_dir` with the
    /// given active version directory.
    pub fn new(package_id: &str, root_dir: &Path, version_dir: &Path) -> Self {
        Self {
            package_id: package_id.to_string(),
            origin: derive_origin(package_id),
            root_dir: root_dir.to_path_buf(),
            version_dir: version_dir.to_path_buf(),
            data_dir: root_dir.join("data"),
            cache_dir: root_dir.join("cache"),
        }
    }

    /// Scratch area for locked-file transfer copies.
    pub fn scratch_dir(&self) -> PathBuf {
        self.cache_dir.join("scratch")
    }

    /// Resolves a raw reference to a local path or external URL.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// match ctx.resolve_local_path(".data:settings.json") {
    ///     ResolvedPath::Local(p) => assert!(p.starts_with(&ctx.data_dir)),
    ///     ResolvedPath::External(_) => unreachable!(),
    /// }
    /// ```
    pub fn resolve_local_path(&self, raw: &str) -> ResolvedPath {
        let trimmed = raw.trim();

        if let Some(rest) = strip_any(trimmed, &["../", "..\\"]) {
            let parent = self
                .version_dir
                .parent()
                .unwrap_or(&self.version_dir)
                .to_path_buf();
            return ResolvedPath::Local(parent.join(relative(rest)));
        }
        // Checked before generic dot handling: data crosses versions.
        if let Some(rest) = trimmed.strip_prefix(".data:") {
            return ResolvedPath::Local(self.data_dir.join(relative(rest)));
        }
        if let Some(rest) = trimmed.strip_prefix(".asset:") {
            return ResolvedPath::Local(self.version_dir.join(relative(rest)));
        }
        if let Some(rest) = strip_any(trimmed, &["~/", "~\\"]) {
            return ResolvedPath::Local(self.version_dir.join(relative(rest)));
        }
        if let Some(resolved) = resolve_special_folder(trimmed) {
            return ResolvedPath::Local(resolved);
        }
        if trimmed.contains("://") || trimmed.starts_with("//") {
            return ResolvedPath::External(trimmed.to_string());
        }

        ResolvedPath::Local(self.version_dir.join(relative(trimmed)))
    }

    /// Maps a raw reference to a URL on the package's synthetic origin.
    ///
    /// Embedded references land under `https://<origin>/`; absolute URLs
    /// keep their classified normal form; unsupported input echoes back
    /// unchanged.
    pub fn resolve_virtual_path(&self, raw: &str) -> String {
        let classified = classify(raw);
        match classified.source {
            SourceType::Embedded => {
                format!("https://{}/{}", self.origin, classified.formatted.replace('\\', "/"))
            }
            SourceType::Online | SourceType::SameOrigin => classified.formatted,
            SourceType::Unsupported => raw.to_string(),
        }
    }
}

/// Strips the first matching prefix, if any.
fn strip_any<'a>(value: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|p| value.strip_prefix(p))
}

/// Removes a single leading `./` / separator so joins stay relative.
fn relative(rest: &str) -> PathBuf {
    let rest = rest.trim();
    let rest = strip_any(rest, &["./", ".\\"]).unwrap_or(rest);
    let rest = rest.trim_start_matches(['/', '\\']);
    PathBuf::from(rest)
}

/// Resolves `%NAME%`-prefixed OS-special-folder tokens. `%TEMP%`/`%TMP%`
/// map to the OS temp directory; other names are looked up in the
/// environment. Unknown tokens resolve to nothing and fall through.
fn resolve_special_folder(raw: &str) -> Option<PathBuf> {
    let rest = raw.strip_prefix('%')?;
    let end = rest.find('%')?;
    let name = &rest[..end];
    let remainder = relative(&rest[end + 1..]);

    let base = if name.eq_ignore_ascii_case("temp") || name.eq_ignore_ascii_case("tmp") {
        std::env::temp_dir()
    } else {
        PathBuf::from(std::env::var_os(name)?)
    };
    Some(base.join(remainder))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PackageContext {
        PackageContext::new(
            "contoso.assistant",
            Path::new("/pkg/root"),
            Path::new("/pkg/root/v1.0"),
        )
    }

    fn local(ctx: &PackageContext, raw: &str) -> PathBuf {
        match ctx.resolve_local_path(raw) {
            ResolvedPath::Local(path) => path,
            ResolvedPath::External(url) => panic!("expected local path, got {url}"),
        }
    }

    #[test]
    fn test_context_layout() {
        let ctx = ctx();
        assert_eq!(ctx.origin, "contoso.localhost");
        assert_eq!(ctx.data_dir, Path::new("/pkg/root/data"));
        assert_eq!(ctx.cache_dir, Path::new("/pkg/root/cache"));
        assert_eq!(ctx.scratch_dir(), Path::new("/pkg/root/cache/scratch"));
    }

    #[test]
    fn test_parent_relative() {
        let ctx = ctx();
        assert_eq!(local(&ctx, "../shared/common.css"), Path::new("/pkg/root/shared/common.css"));
    }

    #[test]
    fn test_data_prefix_resolves_under_data_dir() {
        let ctx = ctx();
        assert_eq!(local(&ctx, ".data:settings.json"), Path::new("/pkg/root/data/settings.json"));
        assert_eq!(local(&ctx, ".data:/notes/a.txt"), Path::new("/pkg/root/data/notes/a.txt"));
    }

    #[test]
    fn test_data_checked_before_generic_dot() {
        // Would misroute into the version tree if ordering regressed.
        let ctx = ctx();
        let resolved = local(&ctx, ".data:x.json");
        assert!(resolved.starts_with(&ctx.data_dir));
        assert!(!resolved.starts_with(&ctx.version_dir));
    }

    #[test]
    fn test_asset_and_tilde_resolve_under_version_dir() {
        let ctx = ctx();
        assert_eq!(local(&ctx, ".asset:img/logo.svg"), Path::new("/pkg/root/v1.0/img/logo.svg"));
        assert_eq!(local(&ctx, "~/index.html"), Path::new("/pkg/root/v1.0/index.html"));
    }

    #[test]
    fn test_plain_relative_resolves_under_version_dir() {
        let ctx = ctx();
        assert_eq!(local(&ctx, "scripts/app.js"), Path::new("/pkg/root/v1.0/scripts/app.js"));
        assert_eq!(local(&ctx, "./scripts/app.js"), Path::new("/pkg/root/v1.0/scripts/app.js"));
    }

    #[test]
    fn test_absolute_urls_pass_through() {
        let ctx = ctx();
        assert_eq!(
            ctx.resolve_local_path("https://cdn.contoso.com/lib.js"),
            ResolvedPath::External("https://cdn.contoso.com/lib.js".to_string())
        );
    }

    #[test]
    fn test_temp_token() {
        let ctx = ctx();
        let resolved = local(&ctx, "%TEMP%/caplet/x.bin");
        assert!(resolved.starts_with(std::env::temp_dir()));
        assert!(resolved.ends_with("caplet/x.bin"));
    }

    #[test]
    fn test_virtual_path_mapping() {
        let ctx = ctx();
        assert_eq!(
            ctx.resolve_virtual_path("./index.html"),
            "https://contoso.localhost/index.html"
        );
        assert_eq!(
            ctx.resolve_virtual_path("https://cdn.contoso.com/lib.js"),
            "https://cdn.contoso.com/lib.js"
        );
        assert_eq!(
            ctx.resolve_virtual_path("//contoso.localhost/app.html"),
            "https://contoso.localhost/app.html"
        );
    }

    #[test]
    fn test_data_resolution_is_version_independent() {
        let before = ctx();
        let after = PackageContext::new(
            "contoso.assistant",
            Path::new("/pkg/root"),
            Path::new("/pkg/root/v2.0"),
        );
        assert_eq!(
            before.resolve_local_path(".data:notes.json"),
            after.resolve_local_path(".data:notes.json")
        );
    }
}
