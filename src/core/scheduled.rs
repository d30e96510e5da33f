//! # Scheduled task: a task factory re-run at a fixed period.
//!
//! A [`ScheduledTask<T>`] is a recurring job. On every tick it builds a fresh
//! [`Task<T>`] from its factory, submits it through the scheduling
//! [`ExecutionContext`] and waits for it before the next tick.
//!
//! ## Lifecycle
//! ```text
//! Created ──schedule()──► Scheduled ──tick──► Firing ──task done──► Scheduled ─┐
//!                             ▲                                                │
//!                             └────────────────────────────────────────────────┘
//!
//! Firing ── task failed && cancel_on_exception ──► Terminated
//! Firing ── max_iterations reached / zero period ─► Terminated
//! any non-terminal ── cancel() / executor shutdown ─► Cancelled
//! ```
//!
//! ## Rules
//! - Ticks never overlap: the next tick waits for the previous task.
//! - A late tick fires once, then the period restarts from it.
//! - A zero period fires exactly once.
//! - The loop runs inside a *driver* task tagged [`SCHEDULE_TAG`], so it is
//!   tracked and cancelled like any other task.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use pollvisor::{Executor, ExecutorConfig, ScheduledTask, ScheduleState, Task, TaskProps};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let exec = Executor::new(ExecutorConfig::default());
//! let sched = ScheduledTask::builder(|| Task::new(TaskProps::named("tick"), |_ctx| async { Ok(()) }))
//!     .period(Duration::from_millis(10))
//!     .max_iterations(3)
//!     .build();
//!
//! let sched = exec.context().schedule(sched)?;
//! assert_eq!(sched.block(None).await, ScheduleState::Terminated);
//! assert_eq!(sched.run_count(), 3);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::select;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::{ExecutionContext, SCHEDULE_TAG};
use crate::error::{RuntimeError, TaskError};
use crate::events::{Event, EventKind};
use crate::tasks::{Task, TaskContext, TaskProps, TaskState};

/// Lifecycle of a [`ScheduledTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// Built, not yet handed to an execution context.
    Created,
    /// Waiting for the next tick.
    Scheduled,
    /// A tick's task is running.
    Firing,
    /// Stopped by [`ScheduledTask::cancel`] or executor shutdown.
    Cancelled,
    /// Stopped on its own: a failed tick, the iteration limit or a zero period.
    Terminated,
}

impl ScheduleState {
    /// True for `Cancelled` and `Terminated`.
    pub fn is_terminal(self) -> bool {
        matches!(self, ScheduleState::Cancelled | ScheduleState::Terminated)
    }
}

type Factory<T> = Box<dyn Fn() -> Task<T> + Send + Sync>;

struct ScheduleInner<T> {
    props: TaskProps,
    factory: Factory<T>,
    period: Duration,
    delay: Duration,
    cancel_on_exception: bool,
    max_iterations: Option<u64>,

    state: watch::Sender<ScheduleState>,
    run_count: AtomicU64,
    last: Mutex<Option<Task<T>>>,
    driver: Mutex<Option<Task<()>>>,
    token: CancellationToken,
}

/// Recurring task. Clones refer to the same schedule.
pub struct ScheduledTask<T> {
    inner: Arc<ScheduleInner<T>>,
}

impl<T> Clone for ScheduledTask<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder for [`ScheduledTask`].
pub struct ScheduledTaskBuilder<T> {
    props: TaskProps,
    factory: Factory<T>,
    period: Duration,
    delay: Duration,
    cancel_on_exception: bool,
    max_iterations: Option<u64>,
}

impl<T: Send + 'static> ScheduledTaskBuilder<T> {
    /// Time between two ticks. `Duration::ZERO` fires once.
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Wait before the first tick.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Whether a failed tick terminates the schedule (default `true`).
    pub fn cancel_on_exception(mut self, cancel: bool) -> Self {
        self.cancel_on_exception = cancel;
        self
    }

    /// Terminate after this many ticks.
    pub fn max_iterations(mut self, n: u64) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Display name of the schedule and of its driver task.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.props = self.props.with_display_name(name);
        self
    }

    /// Replaces the driver task properties.
    pub fn props(mut self, props: TaskProps) -> Self {
        self.props = props;
        self
    }

    /// Builds the schedule in state `Created`.
    pub fn build(self) -> ScheduledTask<T> {
        let (state, _rx) = watch::channel(ScheduleState::Created);
        ScheduledTask {
            inner: Arc::new(ScheduleInner {
                props: self.props,
                factory: self.factory,
                period: self.period,
                delay: self.delay,
                cancel_on_exception: self.cancel_on_exception,
                max_iterations: self.max_iterations,
                state,
                run_count: AtomicU64::new(0),
                last: Mutex::new(None),
                driver: Mutex::new(None),
                token: CancellationToken::new(),
            }),
        }
    }
}

impl<T: Send + 'static> ScheduledTask<T> {
    /// Starts a builder around `factory`, called once per tick.
    pub fn builder<F>(factory: F) -> ScheduledTaskBuilder<T>
    where
        F: Fn() -> Task<T> + Send + Sync + 'static,
    {
        ScheduledTaskBuilder {
            props: TaskProps::new(),
            factory: Box::new(factory),
            period: Duration::ZERO,
            delay: Duration::ZERO,
            cancel_on_exception: true,
            max_iterations: None,
        }
    }

    /// Submits the driver task. Only the first call on a `Created` schedule has an effect.
    pub(crate) fn start(&self, ctx: &ExecutionContext) -> Result<(), RuntimeError> {
        let driver = {
            let mut slot = self.inner.driver.lock();
            if slot.is_some() {
                return Ok(());
            }
            if !self.transition(ScheduleState::Created, ScheduleState::Scheduled) {
                return Ok(());
            }
            let me = self.clone();
            let props = self.inner.props.clone().with_tag(SCHEDULE_TAG);
            let driver = Task::new(props, move |task_ctx| me.drive(task_ctx));
            *slot = Some(driver.clone());
            driver
        };
        if let Err(err) = ctx.submit(driver.clone()) {
            driver.cancel(false);
            self.inner.state.send_replace(ScheduleState::Cancelled);
            return Err(err);
        }
        Ok(())
    }

    async fn drive(self, ctx: TaskContext) -> Result<(), TaskError> {
        let exec = ctx.execution_context().clone();
        let stop = ctx.token().clone();
        let own = self.inner.token.clone();

        if !self.inner.delay.is_zero() {
            select! {
                biased;
                _ = own.cancelled() => return Ok(()),
                _ = stop.cancelled() => return Err(self.halt()),
                _ = time::sleep(self.inner.delay) => {}
            }
        }

        let mut ticker = (!self.inner.period.is_zero()).then(|| {
            let mut ticker = time::interval(self.inner.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            if let Some(ticker) = ticker.as_mut() {
                select! {
                    biased;
                    _ = own.cancelled() => return Ok(()),
                    _ = stop.cancelled() => return Err(self.halt()),
                    _ = ticker.tick() => {}
                }
            }
            if !self.transition(ScheduleState::Scheduled, ScheduleState::Firing) {
                return Ok(());
            }

            let task = (self.inner.factory)();
            *self.inner.last.lock() = Some(task.clone());
            if let Err(err) = exec.submit(task.clone()) {
                task.cancel(false);
                self.terminate(&exec, &err.as_message());
                return Err(err.into());
            }
            select! {
                biased;
                _ = own.cancelled() => return Ok(()),
                _ = stop.cancelled() => {
                    task.cancel(true);
                    return Err(self.halt());
                }
                _ = task.block(None) => {}
            }

            let count = self.inner.run_count.fetch_add(1, Ordering::SeqCst) + 1;
            exec.publish(
                Event::new(EventKind::ScheduleFired)
                    .with_task(self.label())
                    .with_iteration(count),
            );

            if self.inner.cancel_on_exception {
                if let Some(err) = task.error() {
                    self.terminate(&exec, &err.as_message());
                    return Err(err);
                }
            }
            if ticker.is_none() {
                self.terminate(&exec, "single run completed");
                return Ok(());
            }
            if self.inner.max_iterations.is_some_and(|max| count >= max) {
                self.terminate(&exec, "iteration limit reached");
                return Ok(());
            }
            if !self.transition(ScheduleState::Firing, ScheduleState::Scheduled) {
                return Ok(());
            }
        }
    }
}

impl<T> ScheduledTask<T> {
    /// Current lifecycle state.
    pub fn state(&self) -> ScheduleState {
        *self.inner.state.borrow()
    }

    /// True once `Cancelled` or `Terminated`.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// True if the schedule was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state() == ScheduleState::Cancelled
    }

    /// True while the driver is submitted or running and the schedule has not stopped.
    pub fn is_active(&self) -> bool {
        !self.is_done()
            && self
                .driver()
                .is_some_and(|d| matches!(d.state(), TaskState::Submitted | TaskState::Running))
    }

    /// Number of completed ticks.
    pub fn run_count(&self) -> u64 {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Task created by the most recent tick.
    pub fn last_task(&self) -> Option<Task<T>> {
        self.inner.last.lock().clone()
    }

    /// Driver task, once the schedule was started.
    pub fn driver(&self) -> Option<Task<()>> {
        self.inner.driver.lock().clone()
    }

    /// Configured period.
    pub fn period(&self) -> Duration {
        self.inner.period
    }

    /// Configured initial delay.
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Display name, if set.
    pub fn display_name(&self) -> Option<&str> {
        self.inner.props.display_name.as_deref()
    }

    /// Display name, falling back to `"schedule"`.
    pub fn label(&self) -> String {
        self.display_name().unwrap_or(SCHEDULE_TAG).to_string()
    }

    /// Stops the schedule: no further ticks; the in-flight tick and the driver
    /// are cancelled with the same `may_interrupt_if_running` flag.
    ///
    /// Returns `false` if the schedule had already stopped.
    pub fn cancel(&self, may_interrupt_if_running: bool) -> bool {
        let changed = self.inner.state.send_if_modified(|s| {
            if s.is_terminal() {
                false
            } else {
                *s = ScheduleState::Cancelled;
                true
            }
        });
        if changed {
            self.inner.token.cancel();
            if let Some(last) = self.last_task() {
                last.cancel(may_interrupt_if_running);
            }
            if let Some(driver) = self.driver() {
                driver.cancel(may_interrupt_if_running);
            }
        }
        changed
    }

    /// Waits until the schedule stops or `timeout` elapses; returns the state observed.
    pub async fn block(&self, timeout: Option<Duration>) -> ScheduleState {
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

    fn transition(&self, from: ScheduleState, to: ScheduleState) -> bool {
        self.inner.state.send_if_modified(|s| {
            if *s == from {
                *s = to;
                true
            } else {
                false
            }
        })
    }

    /// Marks the schedule cancelled after executor shutdown.
    fn halt(&self) -> TaskError {
        self.inner.state.send_if_modified(|s| {
            if s.is_terminal() {
                false
            } else {
                *s = ScheduleState::Cancelled;
                true
            }
        });
        TaskError::Canceled
    }

    fn terminate(&self, exec: &ExecutionContext, reason: &str) {
        let changed = self.inner.state.send_if_modified(|s| {
            if s.is_terminal() {
                false
            } else {
                *s = ScheduleState::Terminated;
                true
            }
        });
        if changed {
            exec.publish(
                Event::new(EventKind::ScheduleTerminated)
                    .with_task(self.label())
                    .with_iteration(self.run_count())
                    .with_reason(reason),
            );
        }
    }
}

impl<T> fmt::Debug for ScheduledTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("display_name", &self.display_name())
            .field("period", &self.inner.period)
            .field("state", &self.state())
            .field("run_count", &self.run_count())
            .finish()
    }
}
