//! Audit event sinks.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::events::PermissionAuditEvent;
use crate::domain::ports::EventPublisher;

/// Writes every audit event as one structured log line on the
/// `permissions::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditPublisher;

impl EventPublisher<PermissionAuditEvent> for TracingAuditPublisher {
    fn publish(&self, event: &PermissionAuditEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => info!(
                target: "permissions::audit",
                event = event.name(),
                actor_id = %event.actor_id(),
                %payload,
                "permission audit event"
            ),
            Err(e) => warn!(
                target: "permissions::audit",
                event = event.name(),
                error = %e,
                "failed to serialize audit event"
            ),
        }
    }
}

/// Fans events out to in-process subscribers. Events published while nobody
/// is subscribed are dropped; slow subscribers observe `Lagged`.
#[derive(Debug, Clone)]
pub struct BroadcastAuditPublisher {
    tx: broadcast::Sender<PermissionAuditEvent>,
}

impl BroadcastAuditPublisher {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PermissionAuditEvent> {
        self.tx.subscribe()
    }
}

impl EventPublisher<PermissionAuditEvent> for BroadcastAuditPublisher {
    fn publish(&self, event: &PermissionAuditEvent) {
        if self.tx.send(event.clone()).is_err() {
            debug!(event = event.name(), "no audit subscribers");
        }
    }
}

/// Publishes to several sinks in order.
pub struct FanoutPublisher {
    sinks: Vec<Arc<dyn EventPublisher<PermissionAuditEvent>>>,
}

impl FanoutPublisher {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn EventPublisher<PermissionAuditEvent>>>) -> Self {
        Self { sinks }
    }
}

impl EventPublisher<PermissionAuditEvent> for FanoutPublisher {
    fn publish(&self, event: &PermissionAuditEvent) {
        for sink in &self.sinks {
            sink.publish(event);
        }
    }
}
