//! # Poller: periodic health probes for one owner.
//!
//! A [`Poller<V>`] multiplexes many independent jobs for one [`PollOwner`]:
//! - **one-off jobs** ([`Poller::submit`]) run once per start;
//! - **periodic jobs** ([`Poller::schedule_at_fixed_rate`]) run a probe every
//!   period and route each value through a [`PollHandler<V>`].
//!
//! ## Architecture
//! ```text
//! Poller::start()
//!   ├─ one-off job  ──► Task "Poll"        ──► owner ExecutionContext
//!   └─ periodic job ──► ScheduledTask (cancel_on_exception = false)
//!                          └─ every tick: fresh Task
//!                               ├─ gated on owner.service_up() (optional)
//!                               └─ PollJob::tick: probe → handler, errors contained
//!
//! Failure noise (per job, FailureTracker):
//!   error #1 → warn!  + PollFailed{First}
//!   error #n → debug! + PollFailed{Repeat}
//!   normal return → streak reset
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pollvisor::{BasicOwner, Executor, ExecutorConfig, FnHandler, Poller};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let exec = Executor::new(ExecutorConfig::default());
//! let owner = BasicOwner::new("web-1", &exec);
//!
//! let mut poller: Poller<u16> = Poller::new(owner);
//! poller.schedule_at_fixed_rate(
//!     || async { Ok(200) },
//!     Arc::new(FnHandler::new("http status").with_check(|code: &u16| *code < 500)),
//!     Duration::from_secs(5),
//! )?;
//!
//! poller.start()?;
//! assert!(poller.is_running());
//! poller.stop()?;
//! assert!(!poller.is_running());
//! # Ok(())
//! # }
//! ```

mod engine;
mod handler;
mod job;
mod noise;
mod owner;

pub use engine::Poller;
pub use handler::{FnHandler, PollHandler};
pub use noise::FailureTracker;
pub use owner::{BasicOwner, PollOwner};

/// Tag carried by every task a poller submits.
pub const POLL_TAG: &str = "poll";
