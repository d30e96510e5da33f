use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::select;
use tracing::{debug, warn};

use crate::config::PollerConfig;
use crate::core::{ScheduledTask, TRANSIENT_TAG};
use crate::error::{RuntimeError, TaskError};
use crate::poller::job::{PollJob, probe_fn};
use crate::poller::{POLL_TAG, PollHandler, PollOwner};
use crate::tasks::{Task, TaskProps};

type OneOff = Arc<dyn Fn() -> BoxFuture<'static, Result<(), TaskError>> + Send + Sync>;

/// Multiplexes one-off and periodic poll jobs for one owner.
///
/// Jobs are registered while stopped; [`start`](Self::start) turns them into
/// live tasks and schedules, [`stop`](Self::stop) cancels those.
pub struct Poller<V> {
    owner: Arc<dyn PollOwner>,
    config: PollerConfig,
    oneoff_jobs: Vec<OneOff>,
    poll_jobs: Vec<PollJob<V>>,
    started: bool,
    oneoff_tasks: Vec<Task<()>>,
    scheduled: Vec<ScheduledTask<()>>,
}

impl<V: Send + 'static> Poller<V> {
    /// Empty poller for `owner` with default config.
    pub fn new(owner: Arc<dyn PollOwner>) -> Self {
        Self::with_config(owner, PollerConfig::default())
    }

    /// Empty poller for `owner`.
    pub fn with_config(owner: Arc<dyn PollOwner>, config: PollerConfig) -> Self {
        Self {
            owner,
            config,
            oneoff_jobs: Vec::new(),
            poll_jobs: Vec::new(),
            started: false,
            oneoff_tasks: Vec::new(),
            scheduled: Vec::new(),
        }
    }

    /// Registers a job run once on every [`start`](Self::start).
    ///
    /// # Errors
    /// [`RuntimeError::PollerStarted`] while started.
    pub fn submit<F, Fut>(&mut self, job: F) -> Result<(), RuntimeError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        if self.started {
            return Err(RuntimeError::PollerStarted);
        }
        self.oneoff_jobs.push(Arc::new(move || job().boxed()));
        Ok(())
    }

    /// Registers `probe` to be run every `period`, its outcome routed through `handler`.
    ///
    /// A zero period is accepted but never scheduled.
    ///
    /// # Errors
    /// [`RuntimeError::PollerStarted`] while started.
    pub fn schedule_at_fixed_rate<P, Fut>(
        &mut self,
        probe: P,
        handler: Arc<dyn PollHandler<V>>,
        period: Duration,
    ) -> Result<(), RuntimeError>
    where
        P: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, TaskError>> + Send + 'static,
    {
        if self.started {
            return Err(RuntimeError::PollerStarted);
        }
        if period.is_zero() {
            debug!(
                owner = self.owner.name(),
                job = %handler.description(),
                "zero poll period; job kept but never scheduled"
            );
        }
        self.poll_jobs.push(PollJob::new(probe_fn(probe), handler, period));
        Ok(())
    }

    /// Submits every one-off job, then schedules every periodic job with a positive period.
    ///
    /// # Errors
    /// - [`RuntimeError::PollerAlreadyStarted`] while started.
    /// - The first submission error (executor shut down); handles created so
    ///   far are kept and cancelled by [`stop`](Self::stop).
    pub fn start(&mut self) -> Result<(), RuntimeError> {
        if self.started {
            return Err(RuntimeError::PollerAlreadyStarted);
        }
        self.started = true;

        let ctx = self.owner.execution_context().clone();
        debug!(
            owner = self.owner.name(),
            oneoff = self.oneoff_jobs.len(),
            periodic = self.poll_jobs.len(),
            "starting poller"
        );
        let mut first_err = None;

        for job in &self.oneoff_jobs {
            let job = Arc::clone(job);
            let props = TaskProps::named("Poll").with_tag(POLL_TAG);
            let task = Task::new(props, move |_ctx| job());
            self.oneoff_tasks.push(task.clone());
            if let Err(err) = ctx.submit(task) {
                first_err.get_or_insert(err);
            }
        }

        for job in self.poll_jobs.iter().filter(|j| !j.period().is_zero()) {
            let scheduled = periodic(job, &self.owner, &self.config);
            self.scheduled.push(scheduled.clone());
            if let Err(err) = ctx.schedule(scheduled) {
                first_err.get_or_insert(err);
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<V> Poller<V> {
    /// Cancels every live task and schedule. Does not wait for work to cease.
    ///
    /// # Errors
    /// [`RuntimeError::PollerNotStarted`] when not started.
    pub fn stop(&mut self) -> Result<(), RuntimeError> {
        if !self.started {
            return Err(RuntimeError::PollerNotStarted);
        }
        debug!(owner = self.owner.name(), "stopping poller");
        for task in self.oneoff_tasks.drain(..) {
            task.cancel(true);
        }
        for scheduled in self.scheduled.drain(..) {
            scheduled.cancel(true);
        }
        self.started = false;
        Ok(())
    }

    /// True if started and at least one schedule is active.
    pub fn is_running(&self) -> bool {
        let active = self.scheduled.iter().any(ScheduledTask::is_active);
        if !self.started && active {
            warn!(
                owner = self.owner.name(),
                "poller not started but scheduled tasks are still active"
            );
        }
        self.started && active
    }

    /// True if no periodic job is registered.
    pub fn is_empty(&self) -> bool {
        self.poll_jobs.is_empty()
    }

    /// True between [`start`](Self::start) and [`stop`](Self::stop).
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Owner the poller works for.
    pub fn owner(&self) -> &Arc<dyn PollOwner> {
        &self.owner
    }

    /// Live one-off tasks (empty while stopped).
    pub fn oneoff_tasks(&self) -> &[Task<()>] {
        &self.oneoff_tasks
    }

    /// Live schedules (empty while stopped).
    pub fn scheduled_tasks(&self) -> &[ScheduledTask<()>] {
        &self.scheduled
    }
}

/// Builds the schedule of one periodic job; every tick is a fresh task.
fn periodic<V: Send + 'static>(
    job: &PollJob<V>,
    owner: &Arc<dyn PollOwner>,
    config: &PollerConfig,
) -> ScheduledTask<()> {
    let description = job.description();
    let gated = config.only_if_service_up;
    let tick_job = job.clone();
    let owner = Arc::clone(owner);

    ScheduledTask::builder(move || {
        let job = tick_job.clone();
        let owner = Arc::clone(&owner);
        let props = TaskProps::named(job.description()).with_tags([POLL_TAG, TRANSIENT_TAG]);
        Task::new(props, move |ctx| async move {
            if gated && owner.service_up() != Some(true) {
                return Ok(());
            }
            select! {
                biased;
                _ = ctx.cancelled() => {}
                _ = job.tick(ctx.execution_context()) => {}
            }
            Ok(())
        })
    })
    .period(job.period())
    .cancel_on_exception(false)
    .display_name(description)
    .build()
}

impl<V> fmt::Debug for Poller<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("owner", &self.owner.name())
            .field("oneoff_jobs", &self.oneoff_jobs.len())
            .field("poll_jobs", &self.poll_jobs.len())
            .field("started", &self.started)
            .finish()
    }
}
