//! Runtime core: the shared execution engine.
//!
//! Public API of this module:
//! - [`Executor`]: owns the event bus, the cancellation root and every spawned task;
//! - [`ExecutionContext`]: submission facade scoped to one owner;
//! - [`ScheduledTask`]: a task factory re-run at a fixed period.
//!
//! Internal modules:
//! - [`runner`]: runs one task body with cancellation and publishes its lifecycle events;
//! - [`builder`]: wires bus, subscribers and the concurrency cap into an [`Executor`].

mod builder;
mod context;
mod executor;
mod runner;
mod scheduled;

pub use builder::ExecutorBuilder;
pub use context::ExecutionContext;
pub use executor::Executor;
pub use scheduled::{ScheduleState, ScheduledTask, ScheduledTaskBuilder};

/// Tag carried by tasks that are not kept in an execution context's history
/// once they terminate (one tag per poll tick would otherwise accumulate).
pub const TRANSIENT_TAG: &str = "transient";

/// Tag carried by the driver task of a [`ScheduledTask`].
pub const SCHEDULE_TAG: &str = "schedule";
