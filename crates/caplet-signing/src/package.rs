//! # Package-Level Verification
//!
//! Verifies a whole version directory against its signature manifest.
//! The signature records must exactly partition the shipped asset set:
//!
//! 1. every record classifies as Embedded, SameOrigin, or Online;
//! 2. Online records are trust-exempt (no local bytes to hash);
//! 3. every local record's file verifies against its signature;
//! 4. every asset file on disk is covered by exactly one record;
//!    duplicate records for one path are rejected.
//!
//! Per-file verification fans out on a `JoinSet` with no ordering
//! requirement between files; the verdict is only declared after joining
//! all of them.
//!
//! ## Security Notes
//!
//! - Extra unsigned asset files are never silently allowed
//!   (`MissingSignature`).
//! - The two reporting modes differ only in how failures surface; the
//!   checks themselves are identical. Cancellation always unwinds as an
//!   error, even in `Report` mode.

use crate::models::{sign_manifest_name, SignManifest, SigningError, VerifyMode, VerifyOutcome};
use crate::verifier::FileVerifier;
use crate::Result;
use caplet_manifest::{classify, CancelToken, SourceType};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Asset extensions a package is allowed to ship as signed page content
/// (document/script/style types). Files outside this set are not part of
/// the signature partition.
pub const ASSET_EXTENSIONS: [&str; 5] = ["html", "htm", "js", "mjs", "css"];

/// Verifies every signed file of a package and checks that signatures
/// exactly partition the shipped asset set.
///
/// # Arguments
///
/// * `version_dir` - The package version directory to verify
/// * `manifest_name` - Main manifest file name; the signature manifest is
///   its `.files` sibling
/// * `mode` - `Strict` surfaces failures as errors, `Report` downgrades
///   them to [`VerifyOutcome::Unverified`]
/// * `cancel` - Cooperative cancellation token
///
/// # Errors
///
/// In `Strict` mode: [`SigningError::Format`], [`SigningError::Key`],
/// [`SigningError::UnsupportedPath`], [`SigningError::SignatureMismatch`],
/// [`SigningError::MissingSignature`], [`SigningError::Io`]. In either
/// mode: [`SigningError::Cancelled`].
pub async fn verify_package(
    version_dir: &Path,
    manifest_name: &str,
    mode: VerifyMode,
    cancel: &CancelToken,
) -> Result<VerifyOutcome> {
    cancel.checkpoint()?;

    let sign_path = version_dir.join(sign_manifest_name(manifest_name));
    let bytes = match tokio::fs::read(&sign_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return fail(
                mode,
                SigningError::Format(format!("cannot read {}: {e}", sign_path.display())),
            )
        }
    };
    let sign_manifest: SignManifest = match serde_json::from_slice(&bytes) {
        Ok(manifest) => manifest,
        Err(e) => return fail(mode, SigningError::Format(e.to_string())),
    };
    let verifier = match FileVerifier::from_base64_spki(&sign_manifest.sign_key) {
        Ok(verifier) => Arc::new(verifier),
        Err(e) => return fail(mode, e),
    };

    // Resolve each record to a package-relative path. Unsupported records
    // fail immediately; Online records are trust-exempt.
    let mut covered: BTreeSet<String> = BTreeSet::new();
    let mut jobs: Vec<(String, String)> = Vec::new();
    for record in &sign_manifest.files {
        let classified = classify(&record.src);
        let rel = match classified.source {
            SourceType::Online => {
                debug!("trust-exempt online record: {}", record.src);
                continue;
            }
            SourceType::Embedded => classified.formatted,
            SourceType::SameOrigin => match strip_origin_prefix(&classified.formatted) {
                Some(rel) => rel,
                None => {
                    return fail(mode, SigningError::UnsupportedPath { path: record.src.clone() })
                }
            },
            SourceType::Unsupported => {
                return fail(mode, SigningError::UnsupportedPath { path: record.src.clone() })
            }
        };

        let rel = normalize_separators(&rel);
        // Exactly one record per file: a second record for the same
        // normalized path makes the partition ambiguous.
        if !covered.insert(rel.clone()) {
            return fail(
                mode,
                SigningError::Format(format!("duplicate signature record for '{rel}'")),
            );
        }
        jobs.push((rel, record.sign.clone()));
    }

    // Fan out per-file verification; join on all before any verdict.
    let mut set: JoinSet<(String, Result<bool>)> = JoinSet::new();
    for (rel, sign) in jobs {
        let abs = version_dir.join(&rel);
        if !abs.is_file() {
            // A record whose file never shipped covers nothing locally.
            continue;
        }
        let verifier = Arc::clone(&verifier);
        let cancel = cancel.clone();
        set.spawn(async move {
            let outcome = verifier.verify_file(&abs, &sign, &cancel).await;
            (rel, outcome)
        });
    }

    let mut mismatched: Vec<String> = Vec::new();
    while let Some(joined) = set.join_next().await {
        let (rel, outcome) = joined.map_err(|e| SigningError::Join(e.to_string()))?;
        if !outcome? {
            warn!("signature mismatch: {rel}");
            mismatched.push(rel);
        }
    }
    mismatched.sort();
    if let Some(path) = mismatched.into_iter().next() {
        return fail(mode, SigningError::SignatureMismatch { path });
    }

    // Strict partition: every asset on disk must carry a record.
    for rel in collect_assets(version_dir, cancel).await? {
        if !covered.contains(&rel) {
            warn!("unsigned asset on disk: {rel}");
            return fail(mode, SigningError::MissingSignature { path: rel });
        }
    }

    debug!("package verified: {}", version_dir.display());
    Ok(VerifyOutcome::Verified)
}

/// Maps a failure onto the caller-chosen reporting mode.
fn fail(mode: VerifyMode, error: SigningError) -> Result<VerifyOutcome> {
    match mode {
        VerifyMode::Strict => Err(error),
        VerifyMode::Report => Ok(VerifyOutcome::Unverified(error.to_string())),
    }
}

/// Strips the `scheme://host/` prefix of a same-origin URL, leaving the
/// package-relative remainder.
fn strip_origin_prefix(url: &str) -> Option<String> {
    let rest = &url[url.find("://")? + 3..];
    let slash = rest.find('/')?;
    let rel = rest[slash + 1..].trim();
    if rel.is_empty() {
        None
    } else {
        Some(rel.to_string())
    }
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

fn is_asset(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ASSET_EXTENSIONS.iter().any(|a| *a == ext)
        })
        .unwrap_or(false)
}

/// Recursively lists asset files under the version directory as
/// slash-normalized relative paths.
async fn collect_assets(version_dir: &Path, cancel: &CancelToken) -> Result<Vec<String>> {
    let mut assets = Vec::new();
    let mut stack: Vec<PathBuf> = vec![version_dir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        cancel.checkpoint()?;
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| SigningError::Io(format!("cannot list {}: {e}", dir.display())))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SigningError::Io(format!("cannot list {}: {e}", dir.display())))?
        {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_asset(&path) {
                if let Ok(rel) = path.strip_prefix(version_dir) {
                    assets.push(normalize_separators(&rel.to_string_lossy()));
                }
            }
        }
    }

    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use base64::Engine;
    use rsa::pkcs1v15::SigningKey;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::signature::{SignatureEncoding, Signer};
    use rsa::RsaPrivateKey;
    use serde_json::json;
    use sha2::Sha256;
    use tempfile::TempDir;

    const MANIFEST_NAME: &str = "edgeplatform.json";

    struct Fixture {
        dir: TempDir,
        signing: SigningKey<Sha256>,
        sign_key: String,
    }

    impl Fixture {
        fn new() -> Self {
            let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
            let spki = private.to_public_key().to_public_key_der().unwrap();
            Self {
                dir: TempDir::new().unwrap(),
                signing: SigningKey::new(private),
                sign_key: STANDARD.encode(spki.as_bytes()),
            }
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        async fn write(&self, rel: &str, bytes: &[u8]) {
            let path = self.root().join(rel);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.unwrap();
            }
            tokio::fs::write(path, bytes).await.unwrap();
        }

        fn record(&self, src: &str, bytes: &[u8]) -> serde_json::Value {
            let sign = URL_SAFE_NO_PAD.encode(self.signing.sign(bytes).to_bytes());
            json!({ "src": src, "sign": sign })
        }

        async fn write_sign_manifest(&self, files: Vec<serde_json::Value>) {
            let doc = json!({ "signKey": self.sign_key, "files": files });
            self.write("edgeplatform.files.json", doc.to_string().as_bytes())
                .await;
        }
    }

    async fn standard_package() -> Fixture {
        let fx = Fixture::new();
        fx.write("index.html", b"<html><body>hi</body></html>").await;
        fx.write("scripts/app.js", b"console.log('app');").await;
        fx.write("styles/site.css", b"body { margin: 0; }").await;
        let records = vec![
            fx.record("index.html", b"<html><body>hi</body></html>"),
            fx.record("./scripts/app.js", b"console.log('app');"),
            fx.record("~/styles/site.css", b"body { margin: 0; }"),
        ];
        fx.write_sign_manifest(records).await;
        fx
    }

    #[tokio::test]
    async fn test_intact_package_verifies() {
        let fx = standard_package().await;
        let cancel = CancelToken::new();
        let outcome = verify_package(fx.root(), MANIFEST_NAME, VerifyMode::Strict, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);
    }

    #[tokio::test]
    async fn test_corrupted_file_is_mismatch() {
        let fx = standard_package().await;
        fx.write("scripts/app.js", b"console.log('tampered');").await;

        let cancel = CancelToken::new();
        let err = verify_package(fx.root(), MANIFEST_NAME, VerifyMode::Strict, &cancel)
            .await
            .unwrap_err();
        match err {
            SigningError::SignatureMismatch { path } => assert_eq!(path, "scripts/app.js"),
            other => panic!("expected SignatureMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_report_mode_downgrades_to_unverified() {
        let fx = standard_package().await;
        fx.write("scripts/app.js", b"tampered").await;

        let cancel = CancelToken::new();
        let outcome = verify_package(fx.root(), MANIFEST_NAME, VerifyMode::Report, &cancel)
            .await
            .unwrap();
        match outcome {
            VerifyOutcome::Unverified(reason) => assert!(reason.contains("scripts/app.js")),
            VerifyOutcome::Verified => panic!("tampered package must not verify"),
        }
    }

    #[tokio::test]
    async fn test_extra_unsigned_asset_breaks_partition() {
        let fx = standard_package().await;
        fx.write("scripts/injected.js", b"alert('gotcha');").await;

        let cancel = CancelToken::new();
        let err = verify_package(fx.root(), MANIFEST_NAME, VerifyMode::Strict, &cancel)
            .await
            .unwrap_err();
        match err {
            SigningError::MissingSignature { path } => assert_eq!(path, "scripts/injected.js"),
            other => panic!("expected MissingSignature, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_removed_record_breaks_partition() {
        let fx = standard_package().await;
        // Rewrite the signature manifest without the css record.
        let records = vec![
            fx.record("index.html", b"<html><body>hi</body></html>"),
            fx.record("scripts/app.js", b"console.log('app');"),
        ];
        fx.write_sign_manifest(records).await;

        let cancel = CancelToken::new();
        let err = verify_package(fx.root(), MANIFEST_NAME, VerifyMode::Strict, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::MissingSignature { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_record_for_one_file_rejected() {
        let fx = standard_package().await;
        let records = vec![
            fx.record("index.html", b"<html><body>hi</body></html>"),
            fx.record("./scripts/app.js", b"console.log('app');"),
            fx.record("~/styles/site.css", b"body { margin: 0; }"),
            // Same file again through a different prefix spelling.
            fx.record("./index.html", b"<html><body>hi</body></html>"),
        ];
        fx.write_sign_manifest(records).await;

        let cancel = CancelToken::new();
        let err = verify_package(fx.root(), MANIFEST_NAME, VerifyMode::Strict, &cancel)
            .await
            .unwrap_err();
        match err {
            SigningError::Format(reason) => assert!(reason.contains("index.html")),
            other => panic!("expected Format error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_online_records_are_trust_exempt() {
        let fx = standard_package().await;
        let mut records = vec![
            fx.record("index.html", b"<html><body>hi</body></html>"),
            fx.record("scripts/app.js", b"console.log('app');"),
            fx.record("~/styles/site.css", b"body { margin: 0; }"),
        ];
        records.push(json!({ "src": "https://cdn.contoso.com/vendor.js", "sign": "" }));
        fx.write_sign_manifest(records).await;

        let cancel = CancelToken::new();
        let outcome = verify_package(fx.root(), MANIFEST_NAME, VerifyMode::Strict, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);
    }

    #[tokio::test]
    async fn test_unsupported_record_fails_immediately() {
        let fx = standard_package().await;
        let records = vec![json!({ "src": "ftp://files.contoso.com/x.js", "sign": "" })];
        fx.write_sign_manifest(records).await;

        let cancel = CancelToken::new();
        let err = verify_package(fx.root(), MANIFEST_NAME, VerifyMode::Strict, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::UnsupportedPath { .. }));
    }

    #[tokio::test]
    async fn test_non_asset_files_outside_partition() {
        let fx = standard_package().await;
        fx.write("README.txt", b"notes").await;
        fx.write("data/records.json", b"{}").await;

        let cancel = CancelToken::new();
        let outcome = verify_package(fx.root(), MANIFEST_NAME, VerifyMode::Strict, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);
    }

    #[tokio::test]
    async fn test_missing_sign_manifest_reported() {
        let fx = Fixture::new();
        fx.write("index.html", b"<html></html>").await;

        let cancel = CancelToken::new();
        assert!(
            verify_package(fx.root(), MANIFEST_NAME, VerifyMode::Strict, &cancel)
                .await
                .is_err()
        );
        let outcome = verify_package(fx.root(), MANIFEST_NAME, VerifyMode::Report, &cancel)
            .await
            .unwrap();
        assert!(!outcome.is_verified());
    }

    #[tokio::test]
    async fn test_same_origin_record_strips_prefix() {
        let fx = Fixture::new();
        fx.write("index.html", b"<html>o</html>").await;
        let records = vec![fx.record("//contoso.localhost/index.html", b"<html>o</html>")];
        fx.write_sign_manifest(records).await;

        let cancel = CancelToken::new();
        let outcome = verify_package(fx.root(), MANIFEST_NAME, VerifyMode::Strict, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);
    }

    #[tokio::test]
    async fn test_cancellation_propagates_in_report_mode() {
        let fx = standard_package().await;
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = verify_package(fx.root(), MANIFEST_NAME, VerifyMode::Report, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::Cancelled(_)));
    }
}
