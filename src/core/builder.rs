use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{self, broadcast::error::RecvError};
use tracing::warn;

use crate::{
    config::ExecutorConfig,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

use super::Executor;

/// Builder for constructing an [`Executor`] with event subscribers.
pub struct ExecutorBuilder {
    cfg: ExecutorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ExecutorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: ExecutorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive runtime events (task lifecycle, schedule ticks,
    /// poll failures) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the executor on the current tokio runtime.
    ///
    /// # Panics
    /// When called outside a tokio runtime.
    pub fn build(self) -> Executor {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let semaphore = self
            .cfg
            .concurrency_limit()
            .map(sync::Semaphore::new)
            .map(Arc::new);

        if !self.subscribers.is_empty() {
            let subs = SubscriberSet::new(self.subscribers, bus.clone());
            subscriber_listener(&bus, subs);
        }
        Executor::new_internal(self.cfg, bus, semaphore, Handle::current())
    }
}

/// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
fn subscriber_listener(bus: &Bus, set: SubscriberSet) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => set.emit(&ev),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber listener lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    });
}
