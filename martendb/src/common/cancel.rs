use crate::errors::{ErrorKind, MartenError, MartenResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal for long-running scans.
///
/// The core performs no blocking I/O of its own; cancellation/timeout policy
/// belongs to the transport layer, which trips the token. Command handlers
/// check it between document batches and abort with an `Interrupted` error.
///
/// Cloning shares the underlying flag.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    pub fn new() -> Self {
        CancellationToken {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Trips the token. All clones observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns an `Interrupted` error if the token has been tripped.
    pub fn checkpoint(&self) -> MartenResult<()> {
        if self.is_cancelled() {
            log::debug!("operation interrupted by cancellation token");
            return Err(MartenError::new(
                "operation was interrupted",
                ErrorKind::Interrupted,
            ));
        }
        Ok(())
    }
}
