//! Integration tests for the poller.
//!
//! Run with: cargo test --test poller_integration

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use pollvisor::{
    BasicOwner, EventKind, Executor, ExecutorConfig, FnHandler, Occurrence, PollHandler, Poller,
    PollerConfig, ScheduleState, TaskError, TaskState,
};
use tokio::time;

#[derive(Default)]
struct Recorder {
    successes: Mutex<Vec<u32>>,
    failures: Mutex<Vec<u32>>,
    exceptions: Mutex<Vec<String>>,
}

impl Recorder {
    fn handler(
        self: &Arc<Self>,
        name: &str,
        check: fn(&u32) -> bool,
    ) -> Arc<dyn PollHandler<u32>> {
        let (s, f, e) = (Arc::clone(self), Arc::clone(self), Arc::clone(self));
        Arc::new(
            FnHandler::new(name)
                .with_check(check)
                .with_success(move |v| s.successes.lock().push(v))
                .with_failure(move |v| f.failures.lock().push(v))
                .with_exception(move |err| e.exceptions.lock().push(err.as_message())),
        )
    }
}

fn executor() -> Executor {
    Executor::new(ExecutorConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_failure_noise_follows_error_streaks() {
    let exec = executor();
    let mut rx = exec.subscribe();
    let recorder = Arc::new(Recorder::default());
    let calls = Arc::new(AtomicU32::new(0));

    let mut poller = Poller::new(BasicOwner::new("web-1", &exec));
    let counter = Arc::clone(&calls);
    poller
        .schedule_at_fixed_rate(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    match n {
                        1 | 2 | 4 => Err(TaskError::fail(format!("tick {n} down"))),
                        _ => Ok(n),
                    }
                }
            },
            recorder.handler("http", |_| true),
            Duration::from_secs(1),
        )
        .unwrap();

    poller.start().unwrap();
    while calls.load(Ordering::SeqCst) < 4 {
        time::sleep(Duration::from_millis(500)).await;
    }
    time::sleep(Duration::from_millis(100)).await;
    poller.stop().unwrap();

    let exceptions = recorder.exceptions.lock().clone();
    assert_eq!(
        &exceptions[..3],
        &["error: tick 1 down", "error: tick 2 down", "error: tick 4 down"]
    );
    assert_eq!(recorder.successes.lock()[0], 3);

    let mut occurrences = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        if ev.kind == EventKind::PollFailed {
            assert_eq!(ev.owner.as_deref(), Some("web-1"));
            assert_eq!(ev.task.as_deref(), Some("http"));
            occurrences.push(ev.occurrence);
        }
    }
    assert_eq!(
        &occurrences[..3],
        &[
            Some(Occurrence::First),
            Some(Occurrence::Repeat),
            Some(Occurrence::First)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejected_values_only_reach_on_failure() {
    let exec = executor();
    let recorder = Arc::new(Recorder::default());
    let calls = Arc::new(AtomicU32::new(0));

    let mut poller = Poller::new(BasicOwner::new("db", &exec));
    let counter = Arc::clone(&calls);
    poller
        .schedule_at_fixed_rate(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok(n) }
            },
            recorder.handler("never ok", |_| false),
            Duration::from_secs(1),
        )
        .unwrap();

    poller.start().unwrap();
    time::sleep(Duration::from_millis(4500)).await;
    poller.stop().unwrap();
    time::sleep(Duration::from_secs(5)).await;

    let probed = calls.load(Ordering::SeqCst);
    assert!(probed >= 4);
    assert!(recorder.successes.lock().is_empty());
    assert_eq!(recorder.failures.lock().len() as u32, probed);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_every_handle() {
    let exec = executor();
    let mut poller: Poller<u32> = Poller::new(BasicOwner::new("cache", &exec));
    poller
        .submit(|| async {
            time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
        .unwrap();
    for period in [1, 2] {
        poller
            .schedule_at_fixed_rate(
                || async { Ok(1) },
                Arc::new(FnHandler::<u32>::new("ping")),
                Duration::from_secs(period),
            )
            .unwrap();
    }

    poller.start().unwrap();
    time::sleep(Duration::from_millis(2500)).await;
    assert!(poller.is_running());

    let oneoff = poller.oneoff_tasks().to_vec();
    let scheduled = poller.scheduled_tasks().to_vec();
    assert_eq!((oneoff.len(), scheduled.len()), (1, 2));

    poller.stop().unwrap();
    assert!(!poller.is_running());
    assert!(poller.scheduled_tasks().is_empty());
    for task in &oneoff {
        assert!(task.is_done());
    }
    for sched in &scheduled {
        assert!(sched.is_done());
        assert_eq!(sched.state(), ScheduleState::Cancelled);
    }
}

#[tokio::test]
async fn test_oneoff_job_feeds_handler_once() {
    let exec = executor();
    let recorder = Arc::new(Recorder::default());
    let handler = recorder.handler("answer", |_| true);

    let mut poller: Poller<u32> = Poller::new(BasicOwner::new("svc", &exec));
    poller
        .submit(move || {
            let handler = Arc::clone(&handler);
            async move {
                handler.on_success(42);
                Ok(())
            }
        })
        .unwrap();
    poller.start().unwrap();

    let task = poller.oneoff_tasks()[0].clone();
    assert_eq!(task.display_name(), Some("Poll"));
    assert_eq!(task.block(None).await, TaskState::Done);
    assert_eq!(*recorder.successes.lock(), vec![42]);
    assert!(task.tags().contains("owner:svc"));
    poller.stop().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_zero_period_job_is_kept_but_inert() {
    let exec = executor();
    let calls = Arc::new(AtomicU32::new(0));

    let mut poller = Poller::new(BasicOwner::new("svc", &exec));
    let counter = Arc::clone(&calls);
    poller
        .schedule_at_fixed_rate(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(0u32) }
            },
            Arc::new(FnHandler::<u32>::new("inert")),
            Duration::ZERO,
        )
        .unwrap();

    assert!(!poller.is_empty());
    poller.start().unwrap();
    time::sleep(Duration::from_secs(10)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(poller.scheduled_tasks().is_empty());
    assert!(!poller.is_running());
    poller.stop().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_service_up_gates_ticks() {
    let exec = executor();
    let owner = BasicOwner::new("gated", &exec);
    owner.set_service_up(false);
    let calls = Arc::new(AtomicU32::new(0));

    let mut poller = Poller::with_config(owner.clone(), PollerConfig::only_if_service_up());
    let counter = Arc::clone(&calls);
    poller
        .schedule_at_fixed_rate(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(1u32) }
            },
            Arc::new(FnHandler::<u32>::new("gated probe")),
            Duration::from_secs(1),
        )
        .unwrap();

    poller.start().unwrap();
    time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(poller.scheduled_tasks().len(), 1);
    assert!(poller.scheduled_tasks()[0].run_count() >= 3);

    owner.set_service_up(true);
    time::sleep(Duration::from_secs(2)).await;
    assert!(calls.load(Ordering::SeqCst) >= 1);
    poller.stop().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_probe_panic_is_contained() {
    let exec = executor();
    let recorder = Arc::new(Recorder::default());
    let calls = Arc::new(AtomicU32::new(0));

    let mut poller = Poller::new(BasicOwner::new("svc", &exec));
    let counter = Arc::clone(&calls);
    poller
        .schedule_at_fixed_rate(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 1 {
                        panic!("probe bug");
                    }
                    Ok(n)
                }
            },
            recorder.handler("fragile", |_| true),
            Duration::from_secs(1),
        )
        .unwrap();

    poller.start().unwrap();
    time::sleep(Duration::from_millis(2500)).await;
    assert!(poller.is_running());
    poller.stop().unwrap();

    assert_eq!(recorder.exceptions.lock().len(), 1);
    assert!(recorder.exceptions.lock()[0].contains("probe bug"));
    assert!(!recorder.successes.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_jobs_probe_under_concurrency_cap() {
    let exec = Executor::new(ExecutorConfig {
        max_concurrent: 2,
        ..ExecutorConfig::default()
    });
    let calls = Arc::new(AtomicU32::new(0));

    let mut poller = Poller::new(BasicOwner::new("capped", &exec));
    for name in ["a", "b"] {
        let counter = Arc::clone(&calls);
        poller
            .schedule_at_fixed_rate(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(1u32) }
                },
                Arc::new(FnHandler::<u32>::new(name)),
                Duration::from_millis(10),
            )
            .unwrap();
    }

    poller.start().unwrap();
    time::sleep(Duration::from_millis(500)).await;
    assert!(calls.load(Ordering::SeqCst) >= 20);
    assert!(poller.is_running());
    poller.stop().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_probe_never_overlaps_itself() {
    let exec = executor();
    let active = Arc::new(AtomicU32::new(0));
    let peak = Arc::new(AtomicU32::new(0));
    let calls = Arc::new(AtomicU32::new(0));

    let mut poller = Poller::new(BasicOwner::new("slow", &exec));
    let (a, p, c) = (Arc::clone(&active), Arc::clone(&peak), Arc::clone(&calls));
    poller
        .schedule_at_fixed_rate(
            move || {
                let (active, peak) = (Arc::clone(&a), Arc::clone(&p));
                c.fetch_add(1, Ordering::SeqCst);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    time::sleep(Duration::from_millis(300)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(1u32)
                }
            },
            Arc::new(FnHandler::<u32>::new("sluggish")),
            Duration::from_millis(100),
        )
        .unwrap();

    poller.start().unwrap();
    time::sleep(Duration::from_millis(1500)).await;
    poller.stop().unwrap();

    let probed = calls.load(Ordering::SeqCst);
    assert!((3..=6).contains(&probed), "probed {probed} times");
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_oneoff_jobs_submitted_before_first_tick() {
    let exec = executor();
    let first_tick = Arc::new(Mutex::new(None));

    let mut poller = Poller::new(BasicOwner::new("ordered", &exec));
    poller.submit(|| async { Ok(()) }).unwrap();
    let seen = Arc::clone(&first_tick);
    poller
        .schedule_at_fixed_rate(
            move || {
                seen.lock().get_or_insert_with(SystemTime::now);
                async { Ok(1u32) }
            },
            Arc::new(FnHandler::<u32>::new("after oneoff")),
            Duration::from_secs(1),
        )
        .unwrap();

    poller.start().unwrap();
    time::sleep(Duration::from_millis(100)).await;
    let oneoff = poller.oneoff_tasks()[0].submitted_at().unwrap();
    poller.stop().unwrap();

    let tick = first_tick.lock().expect("periodic job never ticked");
    assert!(oneoff <= tick);
}
