//! # Context handed to a running task body.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::ExecutionContext;
use crate::error::RuntimeError;
use crate::tasks::{QueueingContext, Task, TaskRef};

/// What a task body can see of its surroundings.
///
/// - the cancellation token (cancelled on interrupt or executor shutdown),
/// - the [`ExecutionContext`] that submitted the task,
/// - the [`QueueingContext`] when the task was built with [`Task::dynamic`].
#[derive(Clone)]
pub struct TaskContext {
    task: TaskRef,
    token: CancellationToken,
    exec: ExecutionContext,
    queue: Option<Arc<QueueingContext>>,
}

impl TaskContext {
    pub(crate) fn new(
        task: TaskRef,
        token: CancellationToken,
        exec: ExecutionContext,
        queue: Option<Arc<QueueingContext>>,
    ) -> Self {
        Self {
            task,
            token,
            exec,
            queue,
        }
    }

    /// Handle to the task this body belongs to.
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Cancellation token for cooperative shutdown.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once the body should stop.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the body should stop.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// The context that submitted this task.
    pub fn execution_context(&self) -> &ExecutionContext {
        &self.exec
    }

    /// Queueing capability of a dynamic task.
    pub fn queueing_context(&self) -> Option<&Arc<QueueingContext>> {
        self.queue.as_ref()
    }

    /// Queues `task` as a child when this task is dynamic, otherwise submits it.
    pub fn queue<U: Send + 'static>(&self, task: Task<U>) -> Result<Task<U>, RuntimeError> {
        match &self.queue {
            Some(queue) => queue.queue(task),
            None => self.exec.submit(task),
        }
    }
}
