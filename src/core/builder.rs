use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{registry::Registry, supervisor::Supervisor};
use crate::{
    core::SupervisorConfig,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    bus: Option<Bus>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            bus: None,
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive child lifecycle and crash telemetry events through dedicated
    /// workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses an existing bus instead of creating one.
    ///
    /// Pass the same bus to [`CrashTelemetry::new`](crate::CrashTelemetry::new) so crash
    /// events reach the same subscribers.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Builds the supervisor and starts its subscriber listener.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = self
            .bus
            .unwrap_or_else(|| Bus::new(self.cfg.bus_capacity_clamped()));
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let registry = Arc::new(Registry::new(bus.clone()));
        let listener_token = CancellationToken::new();

        let sup = Arc::new(Supervisor::new_internal(
            self.cfg,
            bus,
            registry,
            listener_token,
        ));
        sup.subscriber_listener(subs);
        sup
    }
}
