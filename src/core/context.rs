//! # Execution context: the submission facade of one owner.
//!
//! An [`ExecutionContext`] wraps the shared [`Executor`] with an optional
//! owner name and a set of tags. Everything submitted through it is tagged,
//! recorded in its history and dispatched to the executor. Clones share the
//! same history.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{Executor, ScheduledTask, TRANSIENT_TAG};
use crate::error::{RuntimeError, TaskError};
use crate::events::Event;
use crate::tasks::{Task, TaskProps, TaskRef};

struct Submitted {
    task: TaskRef,
    transient: bool,
}

/// Owner-scoped submission facade over an [`Executor`].
#[derive(Clone)]
pub struct ExecutionContext {
    executor: Executor,
    owner: Option<Arc<str>>,
    tags: Arc<BTreeSet<String>>,
    submitted: Arc<Mutex<Vec<Submitted>>>,
}

impl ExecutionContext {
    pub(crate) fn new(executor: Executor, owner: Option<Arc<str>>, tags: BTreeSet<String>) -> Self {
        Self {
            executor,
            owner,
            tags: Arc::new(tags),
            submitted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The underlying executor.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Owner name, if the context was created with [`Executor::owner_context`].
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Tags added to every submitted task.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Submits `task` for asynchronous execution and returns it.
    ///
    /// Submitting a task that was already submitted records it again but
    /// never runs it twice.
    ///
    /// # Errors
    /// [`RuntimeError::Shutdown`] once the executor is shut down.
    pub fn submit<T: Send + 'static>(&self, task: Task<T>) -> Result<Task<T>, RuntimeError> {
        if self.executor.is_shutdown() {
            return Err(RuntimeError::Shutdown);
        }
        for tag in self.tags.iter() {
            task.add_tag(tag);
        }
        self.record(task.handle());
        self.executor.dispatch(task.clone(), self)?;
        Ok(task)
    }

    /// Wraps a plain async function in a task and submits it.
    pub fn submit_fn<T, F, Fut>(&self, props: TaskProps, f: F) -> Result<Task<T>, RuntimeError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.submit(Task::new(props, move |_ctx| f()))
    }

    /// Submits a procedure: a body without result that cannot fail.
    pub fn run<F, Fut>(&self, props: TaskProps, f: F) -> Result<Task<()>, RuntimeError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.submit(Task::new(props, move |_ctx| async move {
            f().await;
            Ok(())
        }))
    }

    /// Starts `scheduled` and returns it.
    ///
    /// # Errors
    /// [`RuntimeError::Shutdown`] once the executor is shut down.
    pub fn schedule<T: Send + 'static>(
        &self,
        scheduled: ScheduledTask<T>,
    ) -> Result<ScheduledTask<T>, RuntimeError> {
        scheduled.start(self)?;
        Ok(scheduled)
    }

    /// Snapshot of the tasks submitted through this context, in submission order.
    ///
    /// Terminated tasks tagged [`TRANSIENT_TAG`] are not retained.
    pub fn tasks(&self) -> Vec<TaskRef> {
        self.submitted
            .lock()
            .iter()
            .filter(|s| !(s.transient && s.task.is_done()))
            .map(|s| Arc::clone(&s.task))
            .collect()
    }

    /// True once the executor is shut down.
    pub fn is_shutdown(&self) -> bool {
        self.executor.is_shutdown()
    }

    /// Publishes `ev`, stamped with this context's owner.
    pub(crate) fn publish(&self, ev: Event) {
        let ev = match &self.owner {
            Some(owner) if ev.owner.is_none() => ev.with_owner(Arc::clone(owner)),
            _ => ev,
        };
        self.executor.bus().publish(ev);
    }

    fn record(&self, task: TaskRef) {
        let transient = task.tags().contains(TRANSIENT_TAG);
        let mut submitted = self.submitted.lock();
        submitted.retain(|s| !(s.transient && s.task.is_done()));
        submitted.push(Submitted { task, transient });
    }
}
