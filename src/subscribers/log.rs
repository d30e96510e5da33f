//! # LogWriter: renders events through `tracing`.
//!
//! Lifecycle noise (submitted/starting/stopped) goes to `trace` and task
//! failures to `warn`. Poll errors are logged where they happen, so their
//! events only go to `trace` here.

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::TaskSubmitted | EventKind::TaskStarting | EventKind::TaskStopped => {
                trace!(kind = ?e.kind, task, seq = e.seq, "task lifecycle");
            }
            EventKind::TaskCancelled => {
                debug!(task, "task cancelled");
            }
            EventKind::TaskFailed => {
                warn!(task, error = reason, "task failed");
            }
            EventKind::ScheduleFired => {
                trace!(task, iteration = ?e.iteration, "schedule fired");
            }
            EventKind::ScheduleTerminated => {
                info!(task, iteration = ?e.iteration, reason, "schedule terminated");
            }
            // Already logged at the poll site with noise control.
            EventKind::PollFailed => {
                let owner = e.owner.as_deref().unwrap_or("-");
                trace!(owner, job = task, error = reason, occurrence = ?e.occurrence, "poll failed");
            }
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::AllStoppedWithin => info!("all tasks stopped within grace"),
            EventKind::GraceExceeded => warn!(stuck = reason, "shutdown grace exceeded"),
            EventKind::SubscriberOverflow => {
                warn!(subscriber = task, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                warn!(subscriber = task, info = reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing::span::{Attributes, Id, Record};
    use tracing::{Level, Metadata};

    use super::*;
    use crate::events::Occurrence;

    /// Counts events above `trace`.
    #[derive(Default)]
    struct Loud(AtomicUsize);

    impl tracing::Subscriber for Loud {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }
        fn new_span(&self, _: &Attributes<'_>) -> Id {
            Id::from_u64(1)
        }
        fn record(&self, _: &Id, _: &Record<'_>) {}
        fn record_follows_from(&self, _: &Id, _: &Id) {}
        fn event(&self, event: &tracing::Event<'_>) {
            if *event.metadata().level() != Level::TRACE {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        fn enter(&self, _: &Id) {}
        fn exit(&self, _: &Id) {}
    }

    #[tokio::test]
    async fn test_poll_failures_stay_at_trace() {
        let loud = Arc::new(Loud::default());
        let _guard = tracing::subscriber::set_default(Arc::clone(&loud));
        let writer = LogWriter::new();

        for occurrence in [Occurrence::First, Occurrence::Repeat] {
            let ev = Event::new(EventKind::PollFailed)
                .with_task("http")
                .with_owner("web-1")
                .with_reason("connection refused")
                .with_occurrence(occurrence);
            writer.on_event(&ev).await;
        }
        assert_eq!(loud.0.load(Ordering::SeqCst), 0);

        writer
            .on_event(&Event::new(EventKind::TaskFailed).with_reason("boom"))
            .await;
        assert_eq!(loud.0.load(Ordering::SeqCst), 1);
    }
}
