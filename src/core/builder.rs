use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use super::config::Config;
use super::replier::Replier;
use crate::error::ConfigError;
use crate::events::Bus;
use crate::replies::Queue;
use crate::subscribers::{LogWriter, Subscribe, SubscriberSet};
use crate::transport::Transport;

/// Builder for constructing a [`Replier`].
pub struct ReplierBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    transport: Option<Arc<dyn Transport>>,
    default_queue: Queue,
}

impl ReplierBuilder {
    /// Creates a new builder with the given configuration.
    ///
    /// Defaults: a single [`LogWriter`] subscriber, no controller-level queue,
    /// and the NATS transport when the `nats` feature is enabled (the
    /// in-process [`MemoryTransport`](crate::MemoryTransport) otherwise).
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: vec![Arc::new(LogWriter::new())],
            transport: None,
            default_queue: Queue::Inherit,
        }
    }

    /// Replaces the event subscribers.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with
    /// bounded queues. An empty list disables event logging.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the bus transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the controller-level default queue, ranked above [`Config::default_queue`].
    pub fn with_default_queue(mut self, queue: impl Into<Queue>) -> Self {
        self.default_queue = queue.into();
        self
    }

    /// Validates the configuration and builds the [`Replier`].
    ///
    /// Must be called from within a tokio runtime: subscriber workers are spawned here.
    pub fn build(self) -> Result<Arc<Replier>, ConfigError> {
        self.cfg.validate()?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers));
        if !subs.is_empty() {
            subscriber_listener(&bus, Arc::clone(&subs));
        }

        let transport = self.transport.unwrap_or_else(default_transport);
        Ok(Arc::new(Replier::new_internal(
            self.cfg,
            self.default_queue,
            transport,
            bus,
            subs,
        )))
    }
}

/// Forwards bus events to the subscriber set until the bus closes.
fn subscriber_listener(bus: &Bus, set: Arc<SubscriberSet>) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => set.emit(&ev),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscribers lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(feature = "nats")]
fn default_transport() -> Arc<dyn Transport> {
    Arc::new(crate::transport::NatsTransport::new())
}

#[cfg(not(feature = "nats"))]
fn default_transport() -> Arc<dyn Transport> {
    Arc::new(crate::transport::MemoryTransport::new())
}
