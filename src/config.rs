//! # Engine and poller configuration.
//!
//! Provides [`ExecutorConfig`], the settings of the shared execution engine,
//! and [`PollerConfig`], the per-poller knobs.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no global semaphore created)
//! - `grace = 0s` → shutdown does not wait for running tasks

use std::time::Duration;

/// Configuration for the [`Executor`](crate::Executor).
///
/// ## Field semantics
/// - `grace`: Maximum wait for running tasks during shutdown (`0s` = no wait)
/// - `max_concurrent`: Limit on task bodies running at once (`0` = unlimited)
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Maximum time to wait for in-flight tasks on shutdown.
    ///
    /// On shutdown every task is cancelled; the executor then waits up to
    /// `grace` and returns `RuntimeError::GraceExceeded` if tasks remain.
    pub grace: Duration,

    /// Maximum number of task bodies running concurrently.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = at most `n` bodies run simultaneously; the rest stay `Submitted`
    pub max_concurrent: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages skip
    /// older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,
}

impl ExecutorConfig {
    /// Returns the global concurrency limit as an `Option`.
    ///
    /// - `None` → unlimited (no semaphore)
    /// - `Some(n)` → at most `n` concurrent task bodies
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ExecutorConfig {
    /// Default configuration:
    ///
    /// - `grace = 30s`
    /// - `max_concurrent = 0` (unlimited)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            max_concurrent: 0,
            bus_capacity: 1024,
        }
    }
}

/// Per-poller configuration.
#[derive(Clone, Debug, Default)]
pub struct PollerConfig {
    /// Skip every periodic tick while the owner's "service up" flag is not `true`.
    ///
    /// One-off jobs are not gated.
    pub only_if_service_up: bool,
}

impl PollerConfig {
    /// Config that gates periodic ticks on the owner's service-up flag.
    pub fn only_if_service_up() -> Self {
        Self {
            only_if_service_up: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        let mut cfg = ExecutorConfig::default();
        assert_eq!(cfg.concurrency_limit(), None);

        cfg.max_concurrent = 4;
        assert_eq!(cfg.concurrency_limit(), Some(4));

        cfg.bus_capacity = 0;
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_poller_config_defaults_to_ungated() {
        assert!(!PollerConfig::default().only_if_service_up);
        assert!(PollerConfig::only_if_service_up().only_if_service_up);
    }
}
