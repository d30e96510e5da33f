//! Task lifecycle states.
//!
//! ```text
//! Unsubmitted ──► Submitted ──► Running ──► Done
//!      │              │            │
//!      └──────────────┴────────────┴──────► Cancelled
//! ```

/// Lifecycle state of a [`Task`](crate::Task).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Built but not yet handed to an executor.
    Unsubmitted,
    /// Handed to an executor, waiting to run (or for a concurrency permit).
    Submitted,
    /// Body is executing.
    Running,
    /// Body finished; the outcome (value or error) is captured.
    Done,
    /// Cancelled before or while running.
    Cancelled,
}

impl TaskState {
    /// True for `Done` and `Cancelled`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Done | TaskState::Cancelled)
    }

    /// True once the task has been handed to an executor.
    #[inline]
    pub fn is_submitted(self) -> bool {
        !matches!(self, TaskState::Unsubmitted)
    }

    /// Returns a short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            TaskState::Unsubmitted => "unsubmitted",
            TaskState::Submitted => "submitted",
            TaskState::Running => "running",
            TaskState::Done => "done",
            TaskState::Cancelled => "cancelled",
        }
    }
}
