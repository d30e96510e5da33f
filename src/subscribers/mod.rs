//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and, behind the `logging` feature, the built-in [`LogWriter`].
//!
//! ```text
//!   runner / schedule / poller ── publish(Event) ──► Bus ──► SubscriberSet
//!                                                            ├──► LogWriter
//!                                                            └──► custom ...
//! ```

#[cfg(feature = "logging")]
mod log;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
