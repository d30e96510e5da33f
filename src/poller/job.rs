//! # One periodic poll job and its tick.
//!
//! ## Tick flow
//! ```text
//! probe() ──► Ok(v)  ──► record_success ──► check_success / on_success / on_failure
//!   │                                         (panic ─┐)
//!   └───────► Err(e) ─────────────────────────────────┴─► report(e) ──► on_exception(&e)
//!
//! report(e):
//!   FailureTracker::record_error()
//!     ├─ First  → warn!   + PollFailed{occurrence: First}
//!     └─ Repeat → debug!  + PollFailed{occurrence: Repeat}
//! ```
//!
//! A tick never fails: errors and panics stop at `on_exception`.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::core::ExecutionContext;
use crate::error::TaskError;
use crate::events::{Event, EventKind, Occurrence};
use crate::poller::{FailureTracker, PollHandler};

pub(crate) type Probe<V> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<V, TaskError>> + Send + Sync>;

/// Boxes an async probe closure.
pub(crate) fn probe_fn<V, P, Fut>(probe: P) -> Probe<V>
where
    P: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, TaskError>> + Send + 'static,
{
    Arc::new(move || probe().boxed())
}

/// Probe, handler and period of one periodic job.
pub(crate) struct PollJob<V> {
    probe: Probe<V>,
    handler: Arc<dyn PollHandler<V>>,
    period: Duration,
    failures: Arc<FailureTracker>,
}

impl<V> Clone for PollJob<V> {
    fn clone(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
            handler: Arc::clone(&self.handler),
            period: self.period,
            failures: Arc::clone(&self.failures),
        }
    }
}

impl<V: Send + 'static> PollJob<V> {
    pub(crate) fn new(probe: Probe<V>, handler: Arc<dyn PollHandler<V>>, period: Duration) -> Self {
        Self {
            probe,
            handler,
            period,
            failures: Arc::new(FailureTracker::new()),
        }
    }

    pub(crate) fn period(&self) -> Duration {
        self.period
    }

    pub(crate) fn description(&self) -> String {
        self.handler.description()
    }

    /// Runs the probe once and routes the outcome through the handler.
    pub(crate) async fn tick(&self, ctx: &ExecutionContext) {
        let outcome = AssertUnwindSafe((self.probe)())
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)));

        let failure = match outcome {
            Ok(value) => {
                if self.failures.record_success() {
                    debug!(job = %self.description(), "poll recovered");
                }
                let handler = &self.handler;
                panic::catch_unwind(AssertUnwindSafe(move || {
                    if handler.check_success(&value) {
                        handler.on_success(value);
                    } else {
                        handler.on_failure(value);
                    }
                }))
                .err()
                .map(TaskError::from_panic)
            }
            Err(err) => Some(err),
        };

        if let Some(err) = failure {
            self.report(ctx, &err);
            let handler = &self.handler;
            if panic::catch_unwind(AssertUnwindSafe(|| handler.on_exception(&err))).is_err() {
                warn!(job = %self.description(), "poll exception handler panicked");
            }
        }
    }

    fn report(&self, ctx: &ExecutionContext, err: &TaskError) {
        let job = self.description();
        let owner = ctx.owner().unwrap_or("-");
        let occurrence = self.failures.record_error();
        match occurrence {
            Occurrence::First => warn!(
                owner,
                job = %job,
                error = %err,
                "poll failed; repeats are logged at debug until it recovers"
            ),
            Occurrence::Repeat => debug!(owner, job = %job, error = %err, "poll failed again"),
        }
        ctx.publish(
            Event::new(EventKind::PollFailed)
                .with_task(job)
                .with_reason(err.as_message())
                .with_occurrence(occurrence),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::config::ExecutorConfig;
    use crate::core::Executor;
    use crate::poller::FnHandler;

    #[tokio::test]
    async fn test_handler_panic_is_reported_as_exception() {
        let exec = Executor::new(ExecutorConfig::default());
        let ctx = exec.owner_context("svc");
        let mut rx = exec.subscribe();
        let exceptions = Arc::new(AtomicU32::new(0));

        let seen = Arc::clone(&exceptions);
        let handler = FnHandler::new("explosive")
            .with_success(|_v: u8| panic!("handler bug"))
            .with_exception(move |_e| {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        let probe = probe_fn(|| async { Ok(1u8) });
        let job = PollJob::new(probe, Arc::new(handler), Duration::from_secs(1));

        job.tick(&ctx).await;
        assert_eq!(exceptions.load(Ordering::SeqCst), 1);

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::PollFailed);
        assert_eq!(ev.owner.as_deref(), Some("svc"));
        assert_eq!(ev.occurrence, Some(Occurrence::First));
    }

    #[tokio::test]
    async fn test_error_streak_resets_on_normal_return() {
        let exec = Executor::new(ExecutorConfig::default());
        let ctx = exec.context();
        let mut rx = exec.subscribe();
        let script = Arc::new(Mutex::new(vec![Err("a"), Ok(()), Err("b"), Err("c")]));

        let probe = probe_fn(move || {
            let next = script.lock().remove(0);
            async move { next.map_err(TaskError::fail) }
        });
        let handler = Arc::new(FnHandler::<()>::new("scripted"));
        let job = PollJob::new(probe, handler, Duration::from_secs(1));
        for _ in 0..4 {
            job.tick(&ctx).await;
        }

        let mut occurrences = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            occurrences.push(ev.occurrence);
        }
        assert_eq!(
            occurrences,
            vec![
                Some(Occurrence::First),
                Some(Occurrence::First),
                Some(Occurrence::Repeat)
            ]
        );
    }
}
