//! Error types used by the pollvisor engine and the tasks it runs.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`]: errors raised by the engine itself (shutdown, lifecycle misuse).
//! - [`TaskError`]: outcomes of individual task executions and probes.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the pollvisor engine.
///
/// Lifecycle misuse (`Poller*` variants) is a programmer error: it is returned
/// synchronously and never retried.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The executor refuses new submissions.
    #[error("executor is shut down; submission refused")]
    Shutdown,

    /// A job was registered on a poller that has already been started.
    #[error("poller already started; jobs can no longer be registered")]
    PollerStarted,

    /// `start()` was called on a running poller.
    #[error("poller already started")]
    PollerAlreadyStarted,

    /// `stop()` was called on a poller that was never started.
    #[error("poller not started")]
    PollerNotStarted,

    /// Shutdown grace period was exceeded; some tasks were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the tasks that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use pollvisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::PollerNotStarted.as_label(), "poller_not_started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Shutdown => "runtime_shutdown",
            RuntimeError::PollerStarted => "poller_started",
            RuntimeError::PollerAlreadyStarted => "poller_already_started",
            RuntimeError::PollerNotStarted => "poller_not_started",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck tasks={stuck:?}")
            }
            other => other.to_string(),
        }
    }

    /// True for errors caused by calling poller lifecycle methods out of order.
    pub fn is_illegal_state(&self) -> bool {
        matches!(
            self,
            RuntimeError::PollerStarted
                | RuntimeError::PollerAlreadyStarted
                | RuntimeError::PollerNotStarted
        )
    }
}

/// # Errors produced by task execution.
///
/// Captured as the outcome of a [`Task`](crate::Task). The type is `Clone` so
/// the same outcome can be handed to every waiter.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task body (or probe) failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task was cancelled before or while running.
    #[error("task cancelled")]
    Canceled,

    /// Task body panicked; the panic was contained.
    #[error("task panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// A child queued by a dynamic task failed and failures were not swallowed.
    #[error("child task {child} failed: {error}")]
    ChildFailed {
        /// Display name (or id) of the failing child.
        child: String,
        /// The child's error message.
        error: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    ///
    /// # Example
    /// ```
    /// use pollvisor::TaskError;
    ///
    /// let err = TaskError::fail("connection refused");
    /// assert_eq!(err.as_label(), "task_failed");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::ChildFailed { .. } => "task_child_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Canceled => "cancelled".to_string(),
            TaskError::Panicked { info } => format!("panic: {info}"),
            TaskError::ChildFailed { child, error } => format!("child {child}: {error}"),
        }
    }

    /// True when the error represents cancellation rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }

    /// Renders a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let info = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        TaskError::Panicked { info }
    }
}

impl From<RuntimeError> for TaskError {
    fn from(err: RuntimeError) -> Self {
        TaskError::fail(err)
    }
}
