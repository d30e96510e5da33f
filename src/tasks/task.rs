//! # Single-use, cancellable unit of asynchronous work.
//!
//! A [`Task<T>`] bundles an identity, display metadata, a body producing
//! `Result<T, TaskError>` and a lifecycle state. `Task` is a cheap handle:
//! clones share the same underlying task.
//!
//! ## Rules
//! - The body is `FnOnce` and is taken out on first run: a task executes **at most once**.
//! - Submission is a one-shot atomic transition `Unsubmitted → Submitted`;
//!   submitting again is recorded by the caller but never re-dispatched.
//! - Outcomes are captured before the state turns `Done`, so a waiter that
//!   observes `Done` always finds the outcome.
//!
//! ## Example
//! ```rust
//! use pollvisor::{Executor, ExecutorConfig, Task, TaskProps, TaskState};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let exec = Executor::new(ExecutorConfig::default());
//! let ctx = exec.context();
//!
//! let task = Task::new(TaskProps::named("answer"), |_ctx| async { Ok(42) });
//! assert_eq!(task.state(), TaskState::Unsubmitted);
//!
//! let task = ctx.submit(task)?;
//! assert_eq!(task.get().await?, 42);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::{QueueingContext, TaskContext, TaskHandle, TaskProps, TaskRef, TaskState};

static TASK_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique task identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

pub(crate) type TaskBody<T> =
    Box<dyn FnOnce(TaskContext) -> BoxFuture<'static, Result<T, TaskError>> + Send>;

#[derive(Default)]
struct Timestamps {
    submitted: Option<SystemTime>,
    started: Option<SystemTime>,
    ended: Option<SystemTime>,
}

struct TaskInner<T> {
    id: TaskId,
    props: TaskProps,
    tags: Mutex<BTreeSet<String>>,
    body: Mutex<Option<TaskBody<T>>>,
    state: watch::Sender<TaskState>,
    outcome: Mutex<Option<Result<T, TaskError>>>,
    token: CancellationToken,
    queue: Option<Arc<QueueingContext>>,
    times: Mutex<Timestamps>,
}

/// Handle to a single-use asynchronous task producing `T`.
pub struct Task<T> {
    inner: Arc<TaskInner<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("display_name", &self.inner.props.display_name)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

impl<T: Send + 'static> Task<T> {
    /// Creates an unsubmitted task from an async body.
    ///
    /// The body receives a [`TaskContext`] giving access to the cancellation
    /// token and the submitting [`ExecutionContext`](crate::ExecutionContext).
    pub fn new<F, Fut>(props: TaskProps, f: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        Self::build(props, Box::new(move |ctx| Box::pin(f(ctx))), false)
    }

    /// Creates a task that can queue child tasks while it runs.
    ///
    /// After the body returns successfully the engine drains the queued
    /// children; unless [`QueueingContext::swallow_children_failures`] was
    /// called, the first failed child fails this task with
    /// [`TaskError::ChildFailed`].
    pub fn dynamic<F, Fut>(props: TaskProps, f: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        Self::build(props, Box::new(move |ctx| Box::pin(f(ctx))), true)
    }

    fn build(props: TaskProps, body: TaskBody<T>, dynamic: bool) -> Self {
        let (state, _rx) = watch::channel(TaskState::Unsubmitted);
        let queue = dynamic.then(|| Arc::new(QueueingContext::new(state.subscribe())));
        Self {
            inner: Arc::new(TaskInner {
                id: TaskId::next(),
                tags: Mutex::new(props.tags.clone()),
                props,
                body: Mutex::new(Some(body)),
                state,
                outcome: Mutex::new(None),
                token: CancellationToken::new(),
                queue,
                times: Mutex::new(Timestamps::default()),
            }),
        }
    }

    /// Type-erased shared handle to this task.
    pub fn handle(&self) -> TaskRef {
        Arc::new(self.clone())
    }
}

impl<T> Task<T> {
    /// Task identity.
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Display name, if set.
    pub fn display_name(&self) -> Option<&str> {
        self.inner.props.display_name.as_deref()
    }

    /// Description, if set.
    pub fn description(&self) -> Option<&str> {
        self.inner.props.description.as_deref()
    }

    /// Display name, falling back to the task id.
    pub fn label(&self) -> String {
        match self.display_name() {
            Some(name) => name.to_string(),
            None => self.inner.id.to_string(),
        }
    }

    /// Snapshot of the task tags (construction tags plus tags added on submission).
    pub fn tags(&self) -> BTreeSet<String> {
        self.inner.tags.lock().clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        *self.inner.state.borrow()
    }

    /// True once the task is `Done` or `Cancelled`.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// True if the task was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// True if the task terminated with an error (cancellation included).
    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }

    /// The captured error of a terminated task; `Canceled` for cancelled tasks.
    pub fn error(&self) -> Option<TaskError> {
        match self.state() {
            TaskState::Cancelled => Some(TaskError::Canceled),
            TaskState::Done => match &*self.inner.outcome.lock() {
                Some(Err(e)) => Some(e.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Queueing capability, present for tasks built with [`Task::dynamic`].
    pub fn queueing_context(&self) -> Option<&Arc<QueueingContext>> {
        self.inner.queue.as_ref()
    }

    /// When the task was handed to an executor.
    pub fn submitted_at(&self) -> Option<SystemTime> {
        self.inner.times.lock().submitted
    }

    /// When the body started.
    pub fn started_at(&self) -> Option<SystemTime> {
        self.inner.times.lock().started
    }

    /// When the task reached a terminal state.
    pub fn ended_at(&self) -> Option<SystemTime> {
        self.inner.times.lock().ended
    }

    /// Requests cancellation.
    ///
    /// - Not yet running: transitions straight to `Cancelled`; the body never runs.
    /// - Running and `may_interrupt_if_running`: the body is dropped at its next
    ///   await point (best-effort).
    /// - Running without interrupt: marked `Cancelled`, the body runs to
    ///   completion and its outcome is discarded.
    ///
    /// Returns `false` if the task had already terminated.
    pub fn cancel(&self, may_interrupt_if_running: bool) -> bool {
        let mut was_running = false;
        let changed = self.inner.state.send_if_modified(|s| match *s {
            TaskState::Unsubmitted | TaskState::Submitted => {
                *s = TaskState::Cancelled;
                true
            }
            TaskState::Running => {
                was_running = true;
                *s = TaskState::Cancelled;
                true
            }
            TaskState::Done | TaskState::Cancelled => false,
        });
        if changed {
            self.inner.times.lock().ended = Some(SystemTime::now());
            if !was_running || may_interrupt_if_running {
                self.inner.token.cancel();
            }
            if !was_running {
                let body = self.inner.body.lock().take();
                drop(body);
            }
        }
        changed
    }

    /// Waits until the task terminates or `timeout` elapses; returns the state observed.
    pub async fn block(&self, timeout: Option<Duration>) -> TaskState {
        let mut rx = self.inner.state.subscribe();
        let wait = async {
            let _ = rx.wait_for(|s| s.is_terminal()).await;
        };
        match timeout {
            Some(dur) => {
                let _ = time::timeout(dur, wait).await;
            }
            None => wait.await,
        }
        self.state()
    }

    // ---- engine-side transitions ----

    pub(crate) fn try_mark_submitted(&self) -> bool {
        let changed = self.inner.state.send_if_modified(|s| {
            if *s == TaskState::Unsubmitted {
                *s = TaskState::Submitted;
                true
            } else {
                false
            }
        });
        if changed {
            self.inner.times.lock().submitted = Some(SystemTime::now());
        }
        changed
    }

    pub(crate) fn mark_running(&self) -> bool {
        let changed = self.inner.state.send_if_modified(|s| {
            if *s == TaskState::Submitted {
                *s = TaskState::Running;
                true
            } else {
                false
            }
        });
        if changed {
            self.inner.times.lock().started = Some(SystemTime::now());
        }
        changed
    }

    /// Stores the outcome and turns `Running` into `Done`.
    ///
    /// Returns `false` when the task was cancelled meanwhile; the outcome is then ignored.
    pub(crate) fn complete(&self, outcome: Result<T, TaskError>) -> bool {
        *self.inner.outcome.lock() = Some(outcome);
        let done = self.inner.state.send_if_modified(|s| {
            if *s == TaskState::Running {
                *s = TaskState::Done;
                true
            } else {
                false
            }
        });
        if done {
            self.inner.times.lock().ended = Some(SystemTime::now());
        }
        done
    }

    pub(crate) fn mark_cancelled(&self) -> bool {
        let changed = self.inner.state.send_if_modified(|s| {
            if s.is_terminal() {
                false
            } else {
                *s = TaskState::Cancelled;
                true
            }
        });
        if changed {
            self.inner.times.lock().ended = Some(SystemTime::now());
            let body = self.inner.body.lock().take();
            drop(body);
        }
        changed
    }

    pub(crate) fn add_tag(&self, tag: &str) {
        self.inner.tags.lock().insert(tag.to_string());
    }

    pub(crate) fn take_body(&self) -> Option<TaskBody<T>> {
        self.inner.body.lock().take()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.inner.token
    }
}

impl<T: Clone> Task<T> {
    /// Waits until the task terminates, then returns its value or its error.
    ///
    /// A cancelled task yields [`TaskError::Canceled`].
    pub async fn get(&self) -> Result<T, TaskError> {
        match self.block(None).await {
            TaskState::Cancelled => Err(TaskError::Canceled),
            _ => self
                .inner
                .outcome
                .lock()
                .clone()
                .unwrap_or_else(|| Err(TaskError::fail("task finished without an outcome"))),
        }
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> TaskHandle for Task<T> {
    fn id(&self) -> TaskId {
        Task::id(self)
    }

    fn label(&self) -> String {
        Task::label(self)
    }

    fn tags(&self) -> BTreeSet<String> {
        Task::tags(self)
    }

    fn state(&self) -> TaskState {
        Task::state(self)
    }

    fn error(&self) -> Option<TaskError> {
        Task::error(self)
    }

    fn cancel(&self, may_interrupt_if_running: bool) -> bool {
        Task::cancel(self, may_interrupt_if_running)
    }

    async fn block(&self, timeout: Option<Duration>) -> TaskState {
        Task::block(self, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Task<u32> {
        Task::new(TaskProps::named("noop"), |_ctx| async { Ok(1) })
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(noop().id(), noop().id());
    }

    #[test]
    fn test_cancel_unsubmitted_is_immediate() {
        let task = noop();
        assert!(task.cancel(false));
        assert_eq!(task.state(), TaskState::Cancelled);
        assert_eq!(task.error(), Some(TaskError::Canceled));
        assert!(task.ended_at().is_some());

        // Already terminal: second cancel is a no-op, submission is refused.
        assert!(!task.cancel(true));
        assert!(!task.try_mark_submitted());
    }

    #[test]
    fn test_submission_is_one_shot() {
        let task = noop();
        assert!(task.try_mark_submitted());
        assert!(!task.try_mark_submitted());
        assert_eq!(task.state(), TaskState::Submitted);
        assert!(task.submitted_at().is_some());
    }

    #[test]
    fn test_cancel_before_run_releases_body() {
        let task = noop();
        assert!(task.try_mark_submitted());
        assert!(task.cancel(false));
        assert!(task.take_body().is_none());
    }

    #[test]
    fn test_body_is_taken_once() {
        let task = noop();
        assert!(task.take_body().is_some());
        assert!(task.take_body().is_none());
    }

    #[test]
    fn test_complete_after_cancel_discards_outcome() {
        let task = noop();
        assert!(task.try_mark_submitted());
        assert!(task.mark_running());
        assert!(task.cancel(false));
        assert!(!task.token().is_cancelled());

        assert!(!task.complete(Ok(5)));
        assert_eq!(task.state(), TaskState::Cancelled);
    }

    #[test]
    fn test_label_falls_back_to_id() {
        let task: Task<()> = Task::new(TaskProps::new(), |_ctx| async { Ok(()) });
        assert_eq!(task.label(), task.id().to_string());
        assert!(task.label().starts_with("task-"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_times_out_on_unfinished_task() {
        let task = noop();
        let state = task.block(Some(Duration::from_millis(50))).await;
        assert_eq!(state, TaskState::Unsubmitted);
    }

    #[tokio::test]
    async fn test_get_returns_captured_outcome() {
        let task = noop();
        assert!(task.try_mark_submitted());
        assert!(task.mark_running());
        assert!(task.complete(Err(TaskError::fail("boom"))));

        assert_eq!(task.get().await, Err(TaskError::fail("boom")));
        assert!(task.is_error());
    }
}
