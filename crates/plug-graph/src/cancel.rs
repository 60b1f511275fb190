//! Cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{PlugGraphError, Result};

/// Shared cancellation flag for one evaluation request.
///
/// Clones observe the same flag. Long-running `compute` implementations
/// poll it through `ComputeContext::check_cancelled`.
#[derive(Debug, Clone, Default)]
pub struct Canceller {
    flag: Arc<AtomicBool>,
}

impl Canceller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation has been requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PlugGraphError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let canceller = Canceller::new();
        let clone = canceller.clone();
        assert!(clone.check().is_ok());

        canceller.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(clone.check(), Err(PlugGraphError::Cancelled));
    }
}
