use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::ShutdownPolicy;

/// Deferred difficulty change owed after an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DifficultyAdjustment {
    Decrement,
}

impl DifficultyAdjustment {
    pub(crate) fn apply(self, value: u32) -> u32 {
        match self {
            Self::Decrement => value.saturating_sub(1),
        }
    }
}

/// Cooperative cancellation token. [`request`](Self::request) is the only
/// method the signal handler calls: it flips atomics and never blocks or
/// locks. Everything heavier happens on the foreground loop.
#[derive(Debug)]
pub(crate) struct ShutdownController {
    requested: AtomicBool,
    adjustment_pending: AtomicBool,
    policy: ShutdownPolicy,
}

impl ShutdownController {
    pub(crate) fn new(policy: ShutdownPolicy) -> Self {
        Self {
            requested: AtomicBool::new(false),
            adjustment_pending: AtomicBool::new(false),
            policy,
        }
    }

    /// Marks shutdown. Returns `true` only for the first request; later
    /// requests leave all state untouched.
    pub(crate) fn request(&self) -> bool {
        if self.requested.swap(true, Ordering::SeqCst) {
            return false;
        }
        if self.policy == ShutdownPolicy::Decrement {
            self.adjustment_pending.store(true, Ordering::SeqCst);
        }
        true
    }

    pub(crate) fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Hands the owed adjustment to the caller at most once per process.
    pub(crate) fn take_pending_adjustment(&self) -> Option<DifficultyAdjustment> {
        self.adjustment_pending
            .swap(false, Ordering::SeqCst)
            .then_some(DifficultyAdjustment::Decrement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_request_triggers() {
        let shutdown = ShutdownController::new(ShutdownPolicy::Decrement);
        assert!(!shutdown.is_requested());
        assert!(shutdown.request());
        assert!(!shutdown.request());
        assert!(!shutdown.request());
        assert!(shutdown.is_requested());
    }

    #[test]
    fn decrement_policy_yields_adjustment_once() {
        let shutdown = ShutdownController::new(ShutdownPolicy::Decrement);
        assert_eq!(shutdown.take_pending_adjustment(), None);

        shutdown.request();
        shutdown.request();
        assert_eq!(
            shutdown.take_pending_adjustment(),
            Some(DifficultyAdjustment::Decrement)
        );
        assert_eq!(shutdown.take_pending_adjustment(), None);
    }

    #[test]
    fn keep_policy_never_adjusts() {
        let shutdown = ShutdownController::new(ShutdownPolicy::Keep);
        shutdown.request();
        assert_eq!(shutdown.take_pending_adjustment(), None);
    }

    #[test]
    fn decrement_saturates() {
        assert_eq!(DifficultyAdjustment::Decrement.apply(1727), 1726);
        assert_eq!(DifficultyAdjustment::Decrement.apply(0), 0);
    }
}
