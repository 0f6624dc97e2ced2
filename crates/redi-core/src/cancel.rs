//! Cooperative cancellation (§5): "every CRUD, migration, and raw operation
//! accepts a context carrying deadline and cancellation." Generalizes the
//! teacher's `CancelSupport` capability enum (`engine/types.rs`) from a
//! per-driver capability flag to an actual token callers pass down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What a driver can actually do about a cancellation request mid-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelSupport {
    /// The driver ignores cancellation once a statement is in flight.
    None,
    /// The driver checks the token at its next suspension point.
    BestEffort,
    /// The underlying client library can abort the in-flight call directly.
    Driver,
}

/// A cheap, cloneable handle a caller can flip to ask a running operation to
/// stop at its next suspension point. Checking before execution and seeing
/// it already set must return without side effects (§5).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
