//! # Reactions to poll outcomes.
//!
//! A [`PollHandler<V>`] classifies each probe value and reacts to it. Its
//! methods are synchronous and run inside the tick task: keep them short and
//! hand heavy work to a separate task.
//!
//! ```text
//! probe() ── Ok(v) ──► check_success(&v) ── true  ──► on_success(v)
//!    │                                    └─ false ──► on_failure(v)
//!    └──── Err(e) ───────────────────────────────────► on_exception(&e)
//! ```

use std::fmt;

use crate::error::TaskError;

/// Classification and reactions for the values of one periodic probe.
pub trait PollHandler<V>: Send + Sync + 'static {
    /// True if `value` counts as a successful poll. Defaults to always `true`.
    fn check_success(&self, value: &V) -> bool {
        let _ = value;
        true
    }

    /// Called with a value classified as success.
    fn on_success(&self, value: V);

    /// Called with a value classified as failure.
    fn on_failure(&self, value: V);

    /// Called when the probe (or a reaction above) failed.
    fn on_exception(&self, error: &TaskError);

    /// Human-readable description; names the schedule and the tick tasks.
    fn description(&self) -> String;
}

type Check<V> = Box<dyn Fn(&V) -> bool + Send + Sync>;
type React<V> = Box<dyn Fn(V) + Send + Sync>;
type Exception = Box<dyn Fn(&TaskError) + Send + Sync>;

/// [`PollHandler`] assembled from closures.
///
/// Unset reactions do nothing; the default check accepts every value.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use pollvisor::{FnHandler, PollHandler};
///
/// let handler = FnHandler::new("http status")
///     .with_check(|code: &u16| *code < 500)
///     .with_failure(|code| eprintln!("server error {code}"));
///
/// assert!(handler.check_success(&200));
/// assert!(!handler.check_success(&503));
/// let _shared: Arc<dyn PollHandler<u16>> = Arc::new(handler);
/// ```
pub struct FnHandler<V> {
    description: String,
    check: Check<V>,
    success: React<V>,
    failure: React<V>,
    exception: Exception,
}

impl<V: 'static> FnHandler<V> {
    /// A handler that accepts everything and ignores every outcome.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            check: Box::new(|_| true),
            success: Box::new(|_| {}),
            failure: Box::new(|_| {}),
            exception: Box::new(|_| {}),
        }
    }

    /// Sets the success classifier.
    pub fn with_check<F>(mut self, f: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.check = Box::new(f);
        self
    }

    /// Sets the reaction to successful values.
    pub fn with_success<F>(mut self, f: F) -> Self
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        self.success = Box::new(f);
        self
    }

    /// Sets the reaction to failed values.
    pub fn with_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        self.failure = Box::new(f);
        self
    }

    /// Sets the reaction to probe errors.
    pub fn with_exception<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskError) + Send + Sync + 'static,
    {
        self.exception = Box::new(f);
        self
    }
}

impl<V: 'static> PollHandler<V> for FnHandler<V> {
    fn check_success(&self, value: &V) -> bool {
        (self.check)(value)
    }

    fn on_success(&self, value: V) {
        (self.success)(value)
    }

    fn on_failure(&self, value: V) {
        (self.failure)(value)
    }

    fn on_exception(&self, error: &TaskError) {
        (self.exception)(error)
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

impl<V> fmt::Debug for FnHandler<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler")
            .field("description", &self.description)
            .finish()
    }
}
