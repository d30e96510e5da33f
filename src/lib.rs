//! # pollvisor
//!
//! **Pollvisor** is a task execution and polling library for Rust.
//!
//! It provides single-use cancellable [`Task`]s, owner-scoped
//! [`ExecutionContext`]s, recurring [`ScheduledTask`]s and a [`Poller`] that
//! multiplexes periodic health probes for one owner, all running on a shared
//! [`Executor`] over the caller's tokio runtime.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌────────────┐  ┌────────────┐  ┌────────────┐
//!  │ Poller (A) │  │ Poller (B) │  │ user code  │
//!  └─────┬──────┘  └─────┬──────┘  └─────┬──────┘
//!        │ one-off Task  │ ScheduledTask │ Task / Task::dynamic
//!        ▼               ▼               ▼
//!  ┌─────────────────────────────────────────────────────────────┐
//!  │ ExecutionContext (owner name + tags + history)              │
//!  └──────────────────────────────┬──────────────────────────────┘
//!                                 ▼
//!  ┌─────────────────────────────────────────────────────────────┐
//!  │ Executor                                                    │
//!  │  - root CancellationToken   - TaskTracker (grace shutdown)  │
//!  │  - optional Semaphore       - Bus (broadcast events)        │
//!  └──────┬───────────────────────────────────────────┬──────────┘
//!         ▼                                           ▼
//!   runner::run_task (one per task)         subscriber_listener
//!   - permit → Running → body                        │
//!   - catch panics, drain children                   ▼
//!   - publish TaskStarting / Stopped /          SubscriberSet
//!     Failed / Cancelled                     (per-sub queues)
//! ```
//!
//! ### Task lifecycle
//! ```text
//! Unsubmitted ──submit──► Submitted ──permit──► Running ──► Done
//!      │                      │                    │
//!      └───── cancel ─────────┴────── cancel ──────┴──────► Cancelled
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                               |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------------|
//! | **Tasks**         | Single-use async work with state, outcome and cancellation. | [`Task`], [`TaskHandle`], [`TaskProps`]          |
//! | **Submission**    | Owner-scoped submission with tags and history.               | [`ExecutionContext`], [`Executor`]               |
//! | **Dynamic tasks** | Tasks that queue and drain child tasks.                      | [`QueueingContext`]                              |
//! | **Scheduling**    | Fixed-rate re-execution of a task factory.                   | [`ScheduledTask`], [`ScheduleState`]             |
//! | **Polling**       | Per-owner probes with handlers and failure-noise control.    | [`Poller`], [`PollHandler`], [`PollOwner`]       |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics).               | [`Subscribe`]                                    |
//! | **Errors**        | Typed errors for lifecycle misuse and task outcomes.        | [`TaskError`], [`RuntimeError`]                  |
//! | **Configuration** | Engine and poller settings.                                  | [`ExecutorConfig`], [`PollerConfig`]             |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] subscriber rendering events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pollvisor::{BasicOwner, Executor, ExecutorConfig, FnHandler, Poller, PollerConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let exec = Executor::builder(ExecutorConfig::default()).build();
//!     let owner = BasicOwner::new("db-primary", &exec);
//!     owner.set_service_up(true);
//!
//!     let mut poller: Poller<Duration> =
//!         Poller::with_config(owner.clone(), PollerConfig::only_if_service_up());
//!     poller.schedule_at_fixed_rate(
//!         || async { Ok(Duration::from_millis(3)) },
//!         Arc::new(
//!             FnHandler::new("replication lag")
//!                 .with_check(|lag: &Duration| *lag < Duration::from_secs(1))
//!                 .with_failure(|lag| eprintln!("replica lagging by {lag:?}")),
//!         ),
//!         Duration::from_secs(10),
//!     )?;
//!
//!     poller.start()?;
//!     tokio::time::sleep(Duration::from_millis(10)).await;
//!     poller.stop()?;
//!
//!     exec.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod poller;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use crate::core::{
    ExecutionContext, Executor, ExecutorBuilder, SCHEDULE_TAG, ScheduleState, ScheduledTask,
    ScheduledTaskBuilder, TRANSIENT_TAG,
};
pub use config::{ExecutorConfig, PollerConfig};
pub use error::{RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind, Occurrence};
pub use poller::{BasicOwner, FailureTracker, FnHandler, POLL_TAG, PollHandler, PollOwner, Poller};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    QueueingContext, Task, TaskContext, TaskHandle, TaskId, TaskProps, TaskRef, TaskState,
};

// Optional: expose a built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
