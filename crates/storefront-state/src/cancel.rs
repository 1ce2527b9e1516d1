//! # Cancellation Token
//!
//! A teardown signal shared between a UI scope and the operations it owns.
//!
//! ```text
//! scope mounts ──► CancelToken::new() ──┬──► AsyncOperation::with_token
//!                                       ├──► RetryPolicy::with_token
//!                                       └──► PaginatedLoader::with_token
//!
//! scope unmounts ──► token.cancel()
//!                      │
//!                      ├── every later state write is dropped
//!                      └── scheduled retries wake up and abort
//! ```
//!
//! Cancelling never aborts a request that's already in flight. It only
//! stops that request from touching state once it comes back.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable teardown flag. All clones observe the same cancellation.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        CancelToken { tx: Arc::new(tx) }
    }

    /// Flips the flag. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is cancelled (immediately if it already is).
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
