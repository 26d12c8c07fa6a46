//! # Streaming Per-File Signature Verification
//!
//! Files stream through SHA-256 in fixed-size chunks and the digest is
//! checked against an RSA PKCS#1 v1.5 signature, so arbitrarily large
//! packages verify with bounded memory.
//!
//! ## Security Notes
//!
//! - Any decode, I/O, or verification failure is reported as `false`,
//!   never propagated as a crash. The only error that unwinds out of a
//!   verify call is cancellation.
//! - PKCS#1 v1.5 padding is deterministic: the same key, digest, and
//!   signature always produce the same answer.
//! - An empty expected signature is valid iff the file is zero-length.

use crate::models::SigningError;
use crate::Result;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use caplet_manifest::CancelToken;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::DigestVerifier;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::debug;

/// Chunk size for streaming file reads during verification.
const VERIFY_CHUNK_SIZE: usize = 64 * 1024;

/// Verifies file signatures against a configured RSA public key.
///
/// # Example
///
/// ```rust,ignore
/// let verifier = FileVerifier::from_base64_spki(&sign_manifest.sign_key)?;
/// let ok = verifier.verify_file(&path, &record.sign, &cancel).await?;
/// ```
#[derive(Debug, Clone)]
pub struct FileVerifier {
    key: VerifyingKey<Sha256>,
}

impl FileVerifier {
    /// Builds a verifier from a base64-encoded DER (SPKI) public key, the
    /// `signKey` field of the signature manifest.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Key`] if the key does not decode.
    pub fn from_base64_spki(sign_key: &str) -> Result<Self> {
        let der = STANDARD
            .decode(sign_key.trim())
            .map_err(|e| SigningError::Key(format!("key is not valid base64: {e}")))?;
        let key = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| SigningError::Key(format!("key is not valid DER: {e}")))?;
        Ok(Self {
            key: VerifyingKey::new(key),
        })
    }

    /// Verifies a file against a URL-safe base64 signature.
    ///
    /// The file streams through SHA-256 in 64 KiB chunks; the token is
    /// polled between chunks. An empty expected signature is
    /// valid iff the file is zero-length.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if the signature matches, `Ok(false)` on any mismatch,
    /// decode failure, or I/O failure.
    ///
    /// # Errors
    ///
    /// Only [`SigningError::Cancelled`].
    pub async fn verify_file(
        &self,
        path: &Path,
        signature_b64url: &str,
        cancel: &CancelToken,
    ) -> Result<bool> {
        cancel.checkpoint()?;

        let sig_text = signature_b64url.trim().trim_end_matches('=');
        if sig_text.is_empty() {
            // Intentionally unsigned: must be zero-length.
            return Ok(match tokio::fs::metadata(path).await {
                Ok(meta) => meta.is_file() && meta.len() == 0,
                Err(_) => false,
            });
        }

        let sig_bytes = match URL_SAFE_NO_PAD.decode(sig_text) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("signature for {} is not valid base64url: {}", path.display(), e);
                return Ok(false);
            }
        };
        let signature = match Signature::try_from(sig_bytes.as_slice()) {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };

        let digest = match self.digest_file(path, cancel).await? {
            Some(digest) => digest,
            None => return Ok(false),
        };

        Ok(self.key.verify_digest(digest, &signature).is_ok())
    }

    /// Streams a file through SHA-256. `None` on any I/O failure.
    async fn digest_file(&self, path: &Path, cancel: &CancelToken) -> Result<Option<Sha256>> {
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                debug!("cannot open {} for verification: {}", path.display(), e);
                return Ok(None);
            }
        };

        let mut reader = BufReader::new(file);
        let mut digest = Sha256::new();
        let mut buf = vec![0u8; VERIFY_CHUNK_SIZE];
        loop {
            cancel.checkpoint()?;
            let n = match reader.read(&mut buf).await {
                Ok(n) => n,
                Err(_) => return Ok(None),
            };
            if n == 0 {
                break;
            }
            digest.update(&buf[..n]);
        }

        Ok(Some(digest))
    }
}
