use std::sync::atomic::{AtomicBool, Ordering};

use crate::events::Occurrence;

/// Per-job memory of whether the current error streak was already reported.
///
/// The first error of a streak is a [`Occurrence::First`] (logged loudly),
/// the following ones are [`Occurrence::Repeat`] (logged quietly) until a
/// probe returns normally again.
#[derive(Debug, Default)]
pub struct FailureTracker {
    logged: AtomicBool,
}

impl FailureTracker {
    /// Tracker with no error streak.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error and classifies it.
    pub fn record_error(&self) -> Occurrence {
        if self.logged.swap(true, Ordering::SeqCst) {
            Occurrence::Repeat
        } else {
            Occurrence::First
        }
    }

    /// Records a normal probe return. Returns `true` if it ended an error streak.
    pub fn record_success(&self) -> bool {
        self.logged.swap(false, Ordering::SeqCst)
    }

    /// True while an error streak is ongoing.
    pub fn is_failing(&self) -> bool {
        self.logged.load(Ordering::SeqCst)
    }
}
