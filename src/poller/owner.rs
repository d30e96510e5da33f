//! # Poll owners.
//!
//! The entity a poller works for. It supplies the [`ExecutionContext`] every
//! job is submitted through and, optionally, a "service up" flag that gates
//! periodic ticks (see [`PollerConfig::only_if_service_up`](crate::PollerConfig::only_if_service_up)).

use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::{ExecutionContext, Executor};

/// Owner of a [`Poller`](crate::Poller).
pub trait PollOwner: Send + Sync + 'static {
    /// Owner name, used in logs and events.
    fn name(&self) -> &str;

    /// Context jobs are submitted through.
    fn execution_context(&self) -> &ExecutionContext;

    /// Service-up flag; `None` while unknown.
    fn service_up(&self) -> Option<bool> {
        None
    }
}

/// Ready-made [`PollOwner`] with a settable service-up flag.
pub struct BasicOwner {
    name: String,
    ctx: ExecutionContext,
    service_up: RwLock<Option<bool>>,
}

impl BasicOwner {
    /// Creates an owner with its own [`Executor::owner_context`]; service-up unknown.
    pub fn new(name: impl Into<String>, exec: &Executor) -> Arc<Self> {
        let name = name.into();
        let ctx = exec.owner_context(&name);
        Arc::new(Self {
            name,
            ctx,
            service_up: RwLock::new(None),
        })
    }

    /// Sets the service-up flag.
    pub fn set_service_up(&self, up: bool) {
        *self.service_up.write() = Some(up);
    }

    /// Resets the service-up flag to unknown.
    pub fn clear_service_up(&self) {
        *self.service_up.write() = None;
    }
}

impl PollOwner for BasicOwner {
    fn name(&self) -> &str {
        &self.name
    }

    fn execution_context(&self) -> &ExecutionContext {
        &self.ctx
    }

    fn service_up(&self) -> Option<bool> {
        *self.service_up.read()
    }
}
