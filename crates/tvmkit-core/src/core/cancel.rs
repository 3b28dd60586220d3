//! Cooperative cancellation for blocking motion loops

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag checked by every poll iteration of a blocking operation.
///
/// Clones observe the same flag. Cancelling does not abort motion already
/// under way on the controller; it only stops the caller from waiting on it.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation so the token can be reused
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
