//! # Run a single task body.
//!
//! Drives one submitted [`Task`] from `Submitted` to a terminal state and
//! publishes its lifecycle events to the executor bus.
//!
//! ## Event flow
//!
//! ```text
//! Success:
//!   permit → mark_running → TaskStarting → body → Ok(v)  → Done      → TaskStopped
//!
//! Failure / panic:
//!   permit → mark_running → TaskStarting → body → Err(e) → Done      → TaskFailed
//!
//! Cancellation:
//!   before start            → Cancelled (body never runs)            → TaskCancelled
//!   cancel(interrupt=true)  → body dropped, children cancelled       → TaskCancelled
//!   cancel(interrupt=false) → body runs on, outcome discarded        → TaskCancelled
//!   body returns Canceled   → Cancelled                              → TaskCancelled
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event per started runner.
//! - The body gets a **child token** of the executor root: shutdown is
//!   cooperative and bounded by the executor grace period.
//! - Panics inside the body are captured as [`TaskError::Panicked`].
//! - Dynamic tasks drain their queued children before completing. The
//!   concurrency permit is released once the body returns, so the drain
//!   never holds a slot its children need.
//! - Schedule drivers ([`SCHEDULE_TAG`]) take no permit: they only wait on
//!   tick tasks, which take their own.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::select;
use tokio::sync::OwnedSemaphorePermit;

use crate::core::{ExecutionContext, SCHEDULE_TAG};
use crate::error::TaskError;
use crate::events::{Event, EventKind};
use crate::tasks::{QueueingContext, Task, TaskBody, TaskContext};

/// Runs `task` to a terminal state. `ctx` is the context that submitted it.
pub(crate) async fn run_task<T: Send + 'static>(task: Task<T>, ctx: ExecutionContext) {
    let exec = ctx.executor().clone();
    let root = exec.root_token().clone();
    let cancel = task.token().clone();

    if root.is_cancelled() {
        task.mark_cancelled();
        publish_cancelled(&ctx, &task);
        return;
    }

    let semaphore = exec
        .semaphore()
        .filter(|_| !task.tags().contains(SCHEDULE_TAG));
    let permit = match semaphore {
        Some(sem) => {
            select! {
                biased;
                _ = cancel.cancelled() => {
                    publish_cancelled(&ctx, &task);
                    return;
                }
                _ = root.cancelled() => {
                    task.mark_cancelled();
                    publish_cancelled(&ctx, &task);
                    return;
                }
                permit = sem.acquire_owned() => match permit {
                    Ok(p) => Some(p),
                    Err(_closed) => {
                        task.mark_cancelled();
                        publish_cancelled(&ctx, &task);
                        return;
                    }
                },
            }
        }
        None => None,
    };

    if !task.mark_running() {
        publish_cancelled(&ctx, &task);
        return;
    }

    let label = task.label();
    exec.track_running(task.id(), &label);
    ctx.publish(
        Event::new(EventKind::TaskStarting)
            .with_task(label.as_str())
            .with_task_id(task.id()),
    );

    let body_token = root.child_token();
    let queue = task.queueing_context().cloned();
    let task_ctx = TaskContext::new(task.handle(), body_token.clone(), ctx.clone(), queue.clone());
    let work = execute(task.take_body(), task_ctx, queue.clone(), permit);

    let outcome = select! {
        biased;
        _ = cancel.cancelled() => None,
        res = work => Some(res),
    };
    exec.untrack_running(task.id());

    match outcome {
        None => {
            body_token.cancel();
            if let Some(queue) = &queue {
                queue.cancel_children(true);
            }
            publish_cancelled(&ctx, &task);
        }
        Some(Err(TaskError::Canceled)) => {
            task.mark_cancelled();
            if let Some(queue) = &queue {
                queue.cancel_children(true);
            }
            publish_cancelled(&ctx, &task);
        }
        Some(res) => {
            let failure = res.as_ref().err().map(TaskError::as_message);
            if !task.complete(res) {
                publish_cancelled(&ctx, &task);
                return;
            }
            let ev = match failure {
                None => Event::new(EventKind::TaskStopped),
                Some(err) => Event::new(EventKind::TaskFailed).with_reason(err),
            };
            ctx.publish(ev.with_task(label).with_task_id(task.id()));
        }
    }
}

/// Runs the body (capturing panics), releases `permit`, then drains the
/// children of a dynamic task.
async fn execute<T: Send + 'static>(
    body: Option<TaskBody<T>>,
    ctx: TaskContext,
    queue: Option<Arc<QueueingContext>>,
    permit: Option<OwnedSemaphorePermit>,
) -> Result<T, TaskError> {
    let Some(body) = body else {
        return Err(TaskError::fail("task body already consumed"));
    };
    let value = AssertUnwindSafe(async move { body(ctx).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)));
    drop(permit);
    let value = value?;

    if let Some(queue) = queue {
        queue.drain(None, false, false).await?;
        if let Some(err) = queue.children_failure() {
            return Err(err);
        }
    }
    Ok(value)
}

fn publish_cancelled<T>(ctx: &ExecutionContext, task: &Task<T>) {
    ctx.publish(
        Event::new(EventKind::TaskCancelled)
            .with_task(task.label())
            .with_task_id(task.id()),
    );
}
