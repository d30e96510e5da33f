//! # Task abstractions.
//!
//! This module provides the task-related types:
//! - [`Task`] - single-use, cancellable unit of async work producing a value
//! - [`TaskProps`] - display name, description and tags
//! - [`TaskState`] - lifecycle state
//! - [`TaskHandle`] / [`TaskRef`] - type-erased shared view of any task
//! - [`TaskContext`] - what a running body sees (token, execution context, queue)
//! - [`QueueingContext`] - children queued by a dynamic task, and `drain`

mod context;
mod handle;
mod props;
mod queue;
mod state;
mod task;

pub use context::TaskContext;
pub use handle::{TaskHandle, TaskRef};
pub use props::TaskProps;
pub use queue::QueueingContext;
pub use state::TaskState;
pub use task::{Task, TaskId};
pub(crate) use task::TaskBody;
