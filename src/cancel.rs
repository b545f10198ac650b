//! Cancellation signal threaded through every store round trip.
//!
//! A token wraps a `watch` channel. Store futures are raced against the signal
//! with `tokio::select!`; losing the race drops the store future, which aborts
//! the outstanding request.

use crate::error::RepositoryError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable cancellation signal. All clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { state: Arc::new(tx) }
    }

    /// Signal cancellation to every holder of this token.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so `wait_for` only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Run `fut` unless the token fires first.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, RepositoryError>
    where
        F: Future,
    {
        if self.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(RepositoryError::Cancelled),
            output = fut => Ok(output),
        }
    }
}
