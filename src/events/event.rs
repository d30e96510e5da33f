//! # Runtime events emitted by the executor, schedules and pollers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Task lifecycle**: submitted, starting, stopped, failed, cancelled
//! - **Schedules**: a tick fired, a schedule terminated
//! - **Polling**: a probe raised an error (first occurrence or repeat)
//! - **Runtime**: shutdown and subscriber health
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task
//! name, owner, reasons and iteration counts.
//!
//! ## Ordering
//! `seq` comes from one process-wide counter: a later publish always carries a larger `seq`.
//!
//! ## Example
//! ```rust
//! use pollvisor::{Event, EventKind, Occurrence};
//!
//! let ev = Event::new(EventKind::PollFailed)
//!     .with_task("http-latency")
//!     .with_owner("web-1")
//!     .with_reason("connection refused")
//!     .with_occurrence(Occurrence::First);
//!
//! assert_eq!(ev.kind, EventKind::PollFailed);
//! assert_eq!(ev.task.as_deref(), Some("http-latency"));
//! assert_eq!(ev.occurrence, Some(Occurrence::First));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::tasks::TaskId;

/// Source of [`Event::seq`].
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // --- subscribers ---
    /// A subscriber's `on_event` panicked; the worker keeps running.
    ///
    /// Fields: `task` = subscriber name, `reason` = rendered panic payload.
    SubscriberPanicked,

    /// An event could not be queued for a subscriber.
    ///
    /// Fields: `task` = subscriber name, `reason` = `"full"` or `"closed"` detail.
    SubscriberOverflow,

    // === Shutdown events ===
    /// Executor shutdown requested.
    ShutdownRequested,

    /// All tasks stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some tasks did not stop in time.
    ///
    /// Sets:
    /// - `reason`: names of the stuck tasks
    GraceExceeded,

    // === Task lifecycle events ===
    /// Task handed to the executor.
    ///
    /// Sets:
    /// - `task`, `task_id`
    TaskSubmitted,

    /// Task body is about to run.
    ///
    /// Sets:
    /// - `task`, `task_id`
    TaskStarting,

    /// Task body finished with a value.
    ///
    /// Sets:
    /// - `task`, `task_id`
    TaskStopped,

    /// Task body finished with an error (or panicked).
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `reason`: error message
    TaskFailed,

    /// Task was cancelled, before or while running.
    ///
    /// Sets:
    /// - `task`, `task_id`
    TaskCancelled,

    // === Schedule events ===
    /// A schedule tick completed.
    ///
    /// Sets:
    /// - `task`: schedule display name
    /// - `iteration`: ticks completed so far (1-based)
    ScheduleFired,

    /// A schedule stopped producing ticks on its own (error or iteration limit).
    ///
    /// Sets:
    /// - `task`: schedule display name
    /// - `iteration`: ticks completed
    /// - `reason`: why the schedule terminated
    ScheduleTerminated,

    // === Polling events ===
    /// A probe raised an error during a tick.
    ///
    /// Sets:
    /// - `task`: handler description
    /// - `owner`: poller owner name
    /// - `reason`: probe error
    /// - `occurrence`: first occurrence or consecutive repeat
    PollFailed,
}

/// Whether a poll error is the first of a run of consecutive errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// First error since the job last returned normally.
    First,
    /// Consecutive error after an already reported one.
    Repeat,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task (or schedule, handler, subscriber), if applicable.
    pub task: Option<Arc<str>>,
    /// Identity of the task, if applicable.
    pub task_id: Option<TaskId>,
    /// Name of the owner the work runs for.
    pub owner: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Schedule tick count.
    pub iteration: Option<u64>,
    /// Poll error classification.
    pub occurrence: Option<Occurrence>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            task_id: None,
            owner: None,
            reason: None,
            iteration: None,
            occurrence: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a task identity.
    #[inline]
    pub fn with_task_id(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }

    /// Attaches an owner name.
    #[inline]
    pub fn with_owner(mut self, owner: impl Into<Arc<str>>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Attaches a schedule iteration count.
    #[inline]
    pub fn with_iteration(mut self, n: u64) -> Self {
        self.iteration = Some(n);
        self
    }

    /// Attaches a poll error classification.
    #[inline]
    pub fn with_occurrence(mut self, occurrence: Occurrence) -> Self {
        self.occurrence = Some(occurrence);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}
