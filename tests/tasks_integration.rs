//! Integration tests for tasks, dynamic tasks and the executor.
//!
//! Run with: cargo test --test tasks_integration

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pollvisor::{
    Event, EventKind, Executor, ExecutorConfig, RuntimeError, Subscribe, Task, TaskError,
    TaskProps, TaskState,
};
use tokio::time;

fn executor() -> Executor {
    Executor::new(ExecutorConfig::default())
}

fn child(name: &str, fail: bool) -> Task<()> {
    Task::new(TaskProps::named(name), move |_ctx| async move {
        time::sleep(Duration::from_millis(10)).await;
        if fail {
            Err(TaskError::fail("child boom"))
        } else {
            Ok(())
        }
    })
}

#[tokio::test]
async fn test_drain_returns_first_child_error() {
    let exec = executor();
    let primary = Task::dynamic(TaskProps::named("primary"), |ctx| async move {
        ctx.queue(child("bad", true))?;
        ctx.queue(child("good", false))?;
        Ok(())
    });
    let primary = exec.context().submit(primary).unwrap();
    let queue = Arc::clone(primary.queueing_context().unwrap());

    let res = queue.drain(None, true, true).await;
    assert_eq!(res, Err(TaskError::fail("child boom")));

    let children = queue.queue_snapshot();
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|c| c.is_done()));
    assert_eq!(children[0].label(), "bad");

    assert_eq!(primary.state(), TaskState::Done);
    assert!(matches!(
        primary.error(),
        Some(TaskError::ChildFailed { ref child, .. }) if child == "bad"
    ));
}

#[tokio::test]
async fn test_swallowed_child_failure_keeps_primary_successful() {
    let exec = executor();
    let primary = Task::dynamic(TaskProps::named("primary"), |ctx| async move {
        let queue = ctx.queueing_context().unwrap();
        queue.swallow_children_failures();
        queue.queue(child("bad", true))?;
        Ok(7)
    });
    let primary = exec.context().submit(primary).unwrap();

    assert_eq!(primary.get().await, Ok(7));
    let queue = primary.queueing_context().unwrap();
    assert!(queue.is_swallowing_children_failures());
    assert_eq!(queue.first_error(), Some(TaskError::fail("child boom")));
}

#[tokio::test]
async fn test_children_queued_before_submission_start_with_owner() {
    let exec = executor();
    let primary: Task<()> = Task::dynamic(TaskProps::named("primary"), |_ctx| async { Ok(()) });
    let early = child("early", false);

    primary.queueing_context().unwrap().queue(early.clone()).unwrap();
    assert_eq!(early.state(), TaskState::Unsubmitted);

    exec.context().submit(primary.clone()).unwrap();
    assert_ne!(early.state(), TaskState::Unsubmitted);
    assert_eq!(primary.block(None).await, TaskState::Done);
    assert_eq!(early.state(), TaskState::Done);
}

#[tokio::test]
async fn test_drain_times_out() {
    let exec = executor();
    let primary: Task<()> = Task::dynamic(TaskProps::named("slow"), |ctx| async move {
        ctx.queue(Task::new(TaskProps::named("forever"), |_ctx| async {
            time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }))?;
        Ok(())
    });
    let primary = exec.context().submit(primary).unwrap();
    tokio::task::yield_now().await;

    let queue = Arc::clone(primary.queueing_context().unwrap());
    let drained = queue.drain(Some(Duration::from_millis(20)), false, false).await;
    assert_eq!(drained, Ok(false));

    assert!(primary.cancel(true));
    for c in queue.queue_snapshot() {
        assert_eq!(c.block(Some(Duration::from_secs(1))).await, TaskState::Cancelled);
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn test_interrupting_cancel_drops_the_body() {
    let exec = executor();
    let dropped = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&dropped);

    let task = exec
        .context()
        .submit(Task::new(TaskProps::named("sleepy"), move |_ctx| async move {
            let _guard = DropFlag(flag);
            time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }))
        .unwrap();
    time::sleep(Duration::from_millis(1)).await;
    assert_eq!(task.state(), TaskState::Running);

    assert!(task.cancel(true));
    assert_eq!(task.get().await, Err(TaskError::Canceled));
    time::sleep(Duration::from_millis(1)).await;
    assert!(dropped.load(Ordering::SeqCst));
    assert!(exec.running_tasks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_soft_cancel_discards_outcome() {
    let exec = executor();
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);

    let task = exec
        .context()
        .submit(Task::new(TaskProps::named("stubborn"), move |_ctx| async move {
            time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(5)
        }))
        .unwrap();
    time::sleep(Duration::from_millis(1)).await;

    assert!(task.cancel(false));
    assert!(task.is_cancelled());
    time::sleep(Duration::from_millis(100)).await;

    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(task.get().await, Err(TaskError::Canceled));
}

#[tokio::test]
async fn test_panicking_body_is_captured() {
    let exec = executor();
    let task: Task<u8> = exec
        .context()
        .submit(Task::new(TaskProps::named("bug"), |_ctx| async {
            let bytes: Vec<u8> = Vec::new();
            Ok(bytes[3])
        }))
        .unwrap();

    match task.get().await {
        Err(TaskError::Panicked { info }) => assert!(info.contains("index out of bounds")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(task.is_error());

    // The engine keeps working.
    let next = exec
        .context()
        .submit_fn(TaskProps::named("after"), || async { Ok(1) })
        .unwrap();
    assert_eq!(next.get().await, Ok(1));
}

#[tokio::test]
async fn test_run_procedure_and_timestamps() {
    let exec = executor();
    let task = exec
        .context()
        .run(TaskProps::named("proc").with_description("side effect"), || async {})
        .unwrap();

    assert_eq!(task.get().await, Ok(()));
    assert_eq!(task.description(), Some("side effect"));
    let (submitted, started, ended) = (
        task.submitted_at().unwrap(),
        task.started_at().unwrap(),
        task.ended_at().unwrap(),
    );
    assert!(submitted <= started && started <= ended);
}

struct Collect(Mutex<Vec<EventKind>>);

#[async_trait]
impl Subscribe for Collect {
    async fn on_event(&self, ev: &Event) {
        self.0.lock().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "collect"
    }
}

#[tokio::test]
async fn test_subscribers_see_task_lifecycle() {
    let collect = Arc::new(Collect(Mutex::new(Vec::new())));
    let subs: Vec<Arc<dyn Subscribe>> = vec![collect.clone()];
    let exec = Executor::builder(ExecutorConfig::default())
        .with_subscribers(subs)
        .build();

    let ok = exec
        .context()
        .submit_fn(TaskProps::named("ok"), || async { Ok(()) })
        .unwrap();
    ok.block(None).await;

    for _ in 0..100 {
        if collect.0.lock().len() >= 3 {
            break;
        }
        time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(
        collect.0.lock()[..3],
        [
            EventKind::TaskSubmitted,
            EventKind::TaskStarting,
            EventKind::TaskStopped
        ]
    );
}

#[tokio::test]
async fn test_shutdown_refuses_new_work() {
    let exec = executor();
    let ctx = exec.owner_context("svc");
    exec.shutdown().await.unwrap();

    assert!(ctx.is_shutdown());
    let res = ctx.submit_fn(TaskProps::named("late"), || async { Ok(()) });
    assert_eq!(res.unwrap_err(), RuntimeError::Shutdown);
}
