//! # Cancellation token
//!
//! A shared flag asking the control loop to stop. The loop checks it once at the top of every
//! cycle, whoever holds a clone may set it from another thread.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cloneable handle to a shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop. Cancelling more than once has no further effect.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
