//! # Type-erased task handle.
//!
//! [`TaskHandle`] lets the engine keep heterogeneous tasks (`Task<u32>`,
//! `Task<()>`, ...) in one collection: an execution context's history, a
//! queueing context's children. [`TaskRef`] is the shared form.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::{TaskId, TaskState};

/// Object-safe view of a [`Task`](crate::Task), independent of its value type.
#[async_trait]
pub trait TaskHandle: Send + Sync + 'static {
    /// Task identity.
    fn id(&self) -> TaskId;

    /// Display name, falling back to the task id.
    fn label(&self) -> String;

    /// Snapshot of the task tags.
    fn tags(&self) -> BTreeSet<String>;

    /// Current lifecycle state.
    fn state(&self) -> TaskState;

    /// Captured error of a terminated task (`Canceled` for cancelled tasks).
    fn error(&self) -> Option<TaskError>;

    /// Requests cancellation; see [`Task::cancel`](crate::Task::cancel).
    fn cancel(&self, may_interrupt_if_running: bool) -> bool;

    /// Waits until terminal or `timeout` elapses; returns the state observed.
    async fn block(&self, timeout: Option<Duration>) -> TaskState;

    /// True once the task is `Done` or `Cancelled`.
    fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// True if the task terminated with an error (cancellation included).
    fn is_error(&self) -> bool {
        self.error().is_some()
    }
}

/// Shared, type-erased task handle.
pub type TaskRef = Arc<dyn TaskHandle>;
