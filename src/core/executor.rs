//! # Executor: the shared engine that runs every submitted task.
//!
//! The [`Executor`] owns the event bus, the root cancellation token, a task
//! tracker and the optional global concurrency semaphore. It is a cheap,
//! cloneable handle; everything a task, a schedule or a poller submits ends
//! up in [`Executor::dispatch`].
//!
//! ## Architecture
//! ```text
//! ExecutionContext::submit(task)
//!     └─► Executor::dispatch(task)
//!            ├─ shut down?           → Err(RuntimeError::Shutdown)
//!            ├─ already submitted?   → Ok (never dispatched twice)
//!            ├─ bind QueueingContext (flush pending children)
//!            ├─ publish TaskSubmitted
//!            └─ tracker.spawn_on(runner::run_task(task))
//!
//! Event flow:
//!   runner / schedules / pollers ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!
//! Shutdown path:
//!   Executor::shutdown()
//!       └─► publish ShutdownRequested
//!       └─► root.cancel()      → every body token observes cancellation
//!       └─► wait tracker up to cfg.grace:
//!              ├─ all finished  → publish AllStoppedWithin
//!              └─ timeout       → publish GraceExceeded, Err(GraceExceeded{stuck})
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use pollvisor::{Executor, ExecutorConfig, TaskProps};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut cfg = ExecutorConfig::default();
//! cfg.grace = Duration::from_secs(1);
//! let exec = Executor::new(cfg);
//!
//! let task = exec
//!     .context()
//!     .submit_fn(TaskProps::named("hello"), || async { Ok("hi") })?;
//! assert_eq!(task.get().await?, "hi");
//!
//! exec.shutdown().await?;
//! assert!(exec.is_shutdown());
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, broadcast};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::config::ExecutorConfig;
use crate::core::{ExecutionContext, ExecutorBuilder, runner};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{Task, TaskId};

struct ExecutorInner {
    cfg: ExecutorConfig,
    bus: Bus,
    root: CancellationToken,
    tracker: TaskTracker,
    semaphore: Option<Arc<Semaphore>>,
    runtime: Handle,
    shutdown: AtomicBool,
    running: Mutex<HashMap<TaskId, String>>,
}

/// Shared execution engine. Clones refer to the same engine.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<ExecutorInner>,
}

impl Executor {
    /// Creates an executor without subscribers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(cfg: ExecutorConfig) -> Self {
        ExecutorBuilder::new(cfg).build()
    }

    /// Returns a builder to attach subscribers before starting.
    pub fn builder(cfg: ExecutorConfig) -> ExecutorBuilder {
        ExecutorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: ExecutorConfig,
        bus: Bus,
        semaphore: Option<Arc<Semaphore>>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                cfg,
                bus,
                root: CancellationToken::new(),
                tracker: TaskTracker::new(),
                semaphore,
                runtime,
                shutdown: AtomicBool::new(false),
                running: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Configuration the executor was built with.
    pub fn config(&self) -> &ExecutorConfig {
        &self.inner.cfg
    }

    /// New receiver of every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// A context without owner.
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::new(self.clone(), None, BTreeSet::new())
    }

    /// A context for `owner`: its events carry the owner name and every task
    /// submitted through it is tagged `owner:<name>`.
    pub fn owner_context(&self, owner: &str) -> ExecutionContext {
        let tags = BTreeSet::from([format!("owner:{owner}")]);
        ExecutionContext::new(self.clone(), Some(Arc::from(owner)), tags)
    }

    /// True once [`shutdown`](Self::shutdown) was called.
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    /// Labels of the tasks whose body is currently running, sorted.
    pub fn running_tasks(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.running.lock().values().cloned().collect();
        names.sort();
        names
    }

    /// Stops accepting work, cancels every task and waits up to the grace period.
    ///
    /// Calling it again after the first call returns `Ok(())` immediately.
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] listing the bodies still running when
    /// the grace period elapsed.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        if self.inner.shutdown.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("executor shutdown requested");
        self.inner.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.inner.root.cancel();
        self.inner.tracker.close();

        let grace = self.inner.cfg.grace;
        match time::timeout(grace, self.inner.tracker.wait()).await {
            Ok(()) => {
                self.inner.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                let stuck = self.running_tasks();
                warn!(?grace, stuck = ?stuck, "tasks still running after grace period");
                self.inner
                    .bus
                    .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Hands `task` to the engine. A task that was already submitted is left alone.
    pub(crate) fn dispatch<T: Send + 'static>(
        &self,
        task: Task<T>,
        ctx: &ExecutionContext,
    ) -> Result<(), RuntimeError> {
        if self.is_shutdown() {
            return Err(RuntimeError::Shutdown);
        }
        if !task.try_mark_submitted() {
            return Ok(());
        }
        if let Some(queue) = task.queueing_context() {
            queue.bind(ctx);
        }
        ctx.publish(
            Event::new(EventKind::TaskSubmitted)
                .with_task(task.label())
                .with_task_id(task.id()),
        );
        self.inner
            .tracker
            .spawn_on(runner::run_task(task, ctx.clone()), &self.inner.runtime);
        Ok(())
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    pub(crate) fn root_token(&self) -> &CancellationToken {
        &self.inner.root
    }

    pub(crate) fn semaphore(&self) -> Option<Arc<Semaphore>> {
        self.inner.semaphore.clone()
    }

    pub(crate) fn track_running(&self, id: TaskId, label: &str) {
        self.inner.running.lock().insert(id, label.to_string());
    }

    pub(crate) fn untrack_running(&self, id: TaskId) {
        self.inner.running.lock().remove(&id);
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("cfg", &self.inner.cfg)
            .field("shutdown", &self.is_shutdown())
            .field("tasks", &self.inner.tracker.len())
            .finish()
    }
}
