//! # Queueing context: dynamic children of a running task.
//!
//! A task built with [`Task::dynamic`] owns a [`QueueingContext`]. While the
//! body runs it can [`queue`](QueueingContext::queue) child tasks and later
//! [`drain`](QueueingContext::drain) them.
//!
//! ## Hand-off
//! ```text
//! queue(child)
//!   ├─► record child (insertion order)
//!   ├─► owner bound to an ExecutionContext? ─► submit(child)
//!   │                                          (no-op if child already submitted)
//!   └─► not yet bound ─► keep pending; submitted when the owner is submitted
//! ```
//!
//! ## Rules
//! - Children are accounted exactly once per `queue` call and dispatched at
//!   most once overall: the task's atomic submit transition decides.
//! - A child that cannot be submitted (executor shut down) is cancelled so
//!   that `drain` never waits on it forever.
//! - `drain` re-reads the queue as it goes, so children queued while draining
//!   are waited for too.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time;
use tracing::debug;

use crate::core::ExecutionContext;
use crate::error::{RuntimeError, TaskError};
use crate::tasks::{Task, TaskRef, TaskState};

type Dispatch = Box<dyn FnOnce(&ExecutionContext) + Send>;

#[derive(Default)]
struct QueueState {
    children: Vec<TaskRef>,
    pending: Vec<Dispatch>,
}

/// Ordered set of child tasks accumulated by a dynamic task.
pub struct QueueingContext {
    state: Mutex<QueueState>,
    exec: OnceLock<ExecutionContext>,
    swallow: AtomicBool,
    primary: watch::Receiver<TaskState>,
}

impl QueueingContext {
    pub(crate) fn new(primary: watch::Receiver<TaskState>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            exec: OnceLock::new(),
            swallow: AtomicBool::new(false),
            primary,
        }
    }

    /// Binds the context the owning task was submitted through and flushes
    /// children queued before that.
    pub(crate) fn bind(&self, exec: &ExecutionContext) {
        if self.exec.set(exec.clone()).is_err() {
            return;
        }
        let pending = std::mem::take(&mut self.state.lock().pending);
        for dispatch in pending {
            dispatch(exec);
        }
    }

    /// Appends `task` to the queue and submits it unless it was already submitted.
    pub fn queue<U: Send + 'static>(&self, task: Task<U>) -> Result<Task<U>, RuntimeError> {
        let exec = {
            let mut state = self.state.lock();
            state.children.push(task.handle());
            match self.exec.get() {
                Some(exec) => exec.clone(),
                None => {
                    let child = task.clone();
                    state
                        .pending
                        .push(Box::new(move |exec| submit_or_cancel(exec, child)));
                    return Ok(task);
                }
            }
        };
        match exec.submit(task.clone()) {
            Ok(task) => Ok(task),
            Err(err) => {
                task.cancel(false);
                Err(err)
            }
        }
    }

    /// Snapshot of queued children, in insertion order.
    pub fn queue_snapshot(&self) -> Vec<TaskRef> {
        self.state.lock().children.clone()
    }

    /// Number of queued children.
    pub fn len(&self) -> usize {
        self.state.lock().children.len()
    }

    /// True if nothing was queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// From now on, failing children never fail the owning task.
    pub fn swallow_children_failures(&self) {
        self.swallow.store(true, Ordering::SeqCst);
    }

    /// True once [`swallow_children_failures`](Self::swallow_children_failures) was called.
    pub fn is_swallowing_children_failures(&self) -> bool {
        self.swallow.load(Ordering::SeqCst)
    }

    /// Waits for every queued child (and, with `include_primary`, the owning task).
    ///
    /// Returns `Ok(true)` when everything waited for is terminal, `Ok(false)` if
    /// `timeout` elapsed first. With `throw_first_error`, the first child error in
    /// queue order is returned instead.
    ///
    /// Under a concurrency cap ([`ExecutorConfig::max_concurrent`](crate::ExecutorConfig)),
    /// calling this from inside the owning task's body keeps its permit while
    /// children wait for one of their own: with every permit held that way,
    /// nothing progresses. Queue children and return instead; the runner drains
    /// them after the body has released its permit.
    pub async fn drain(
        &self,
        timeout: Option<Duration>,
        include_primary: bool,
        throw_first_error: bool,
    ) -> Result<bool, TaskError> {
        let wait = async {
            let mut next = self.wait_children(0).await;
            if include_primary {
                let mut primary = self.primary.clone();
                let _ = primary.wait_for(|s| s.is_terminal()).await;
                next = self.wait_children(next).await;
            }
            next
        };
        let completed = match timeout {
            Some(dur) => time::timeout(dur, wait).await.is_ok(),
            None => {
                wait.await;
                true
            }
        };
        if throw_first_error {
            if let Some(err) = self.first_error() {
                return Err(err);
            }
        }
        Ok(completed)
    }

    /// First error among terminated children, in queue order.
    pub fn first_error(&self) -> Option<TaskError> {
        self.queue_snapshot().iter().find_map(|child| child.error())
    }

    /// Error the owning task should fail with, if any.
    pub(crate) fn children_failure(&self) -> Option<TaskError> {
        if self.is_swallowing_children_failures() {
            return None;
        }
        self.queue_snapshot().iter().find_map(|child| {
            child.error().map(|err| TaskError::ChildFailed {
                child: child.label(),
                error: err.as_message(),
            })
        })
    }

    /// Cancels every queued child that has not terminated.
    pub(crate) fn cancel_children(&self, may_interrupt_if_running: bool) {
        for child in self.queue_snapshot() {
            child.cancel(may_interrupt_if_running);
        }
    }

    async fn wait_children(&self, mut idx: usize) -> usize {
        loop {
            let child = self.state.lock().children.get(idx).cloned();
            match child {
                Some(child) => {
                    child.block(None).await;
                    idx += 1;
                }
                None => return idx,
            }
        }
    }
}

fn submit_or_cancel<U: Send + 'static>(exec: &ExecutionContext, task: Task<U>) {
    if let Err(err) = exec.submit(task.clone()) {
        debug!(task = %task.label(), error = %err, "queued child could not be submitted");
        task.cancel(false);
    }
}
