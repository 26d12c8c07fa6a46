//! Cooperative cancellation for long-running package operations.
//!
//! Every long operation in the host (manifest load, verification fan-out,
//! download, extraction) takes a [`CancelToken`] and polls it at loop
//! boundaries. Cancellation mid-update carries the same guarantee as
//! failure: the previously active version remains untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Error returned when an operation observes a cancelled token.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

/// A cloneable cancellation flag shared between a caller and the
/// operations it starts.
///
/// Cancellation is cooperative: operations call [`CancelToken::checkpoint`]
/// at loop boundaries and unwind with [`Cancelled`] when the flag is set.
///
/// # Example
///
/// ```rust
/// use caplet_manifest::CancelToken;
///
/// let token = CancelToken::new();
/// assert!(token.checkpoint().is_ok());
/// token.cancel();
/// assert!(token.checkpoint().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent; observed by all clones.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` if cancellation has been requested.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
