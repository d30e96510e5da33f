//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`], [`Occurrence`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `core::runner`, `ScheduledTask` drivers, `Poller` ticks, `Executor`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the executor's subscriber listener (fans out to `SubscriberSet`)
//!   and any receiver obtained from [`Executor::subscribe`](crate::Executor::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, Occurrence};
