//! Per-call cancellation
//!
//! Every adapter call takes a [`Context`]. Adapters check it before issuing a
//! request and again before interpreting the response, so a cancellation or
//! an expired deadline aborts the in-flight call with `Error::Canceled`.
//!
//! There are no timers: the deadline is compared against the clock at each
//! check point.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag
///
/// Clones observe the same flag, so one handle can cancel calls running on
/// other threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not canceled
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every holder of this token
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was signalled
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

/// Cancellation token and deadline of one logical operation
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl Context {
    /// Context that is never canceled
    pub fn background() -> Self {
        Self::default()
    }

    /// Attach a cancellation token
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Attach an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Deadline of this context, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail if the context is canceled or past its deadline
    ///
    /// # Errors
    ///
    /// Returns `Canceled` with the reason.
    pub fn check(&self) -> Result<()> {
        if let Some(token) = &self.token {
            if token.is_canceled() {
                return Err(Error::canceled("context canceled"));
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::canceled("deadline exceeded"));
            }
        }
        Ok(())
    }
}
