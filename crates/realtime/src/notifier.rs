//! Best-effort fan-out of non-message events.
//!
//! Friend and membership workflows push their notifications through here.
//! Delivery is fire-and-forget: an offline recipient is a normal outcome,
//! never an error back to the triggering workflow.

use std::sync::Arc;

use tracing::debug;

use crate::envelope::{Envelope, RealtimeEvent};
use crate::message::UserId;
use crate::registry::{ConnectionRegistry, DeliveryOutcome};

#[derive(Clone)]
pub struct EventNotifier {
    registry: Arc<ConnectionRegistry>,
}

impl EventNotifier {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Push one event to one user if they are connected.
    pub async fn notify(&self, user_id: UserId, event: RealtimeEvent) -> DeliveryOutcome {
        let kind = event.kind();
        let outcome = self.registry.send(user_id, Envelope::new(event)).await;
        if !outcome.delivered {
            debug!(user_id, event = kind, "notification not delivered");
        }
        outcome
    }

    /// Push one event to several users; each delivery is independent.
    pub async fn notify_many(
        &self,
        user_ids: &[UserId],
        event: RealtimeEvent,
    ) -> Vec<DeliveryOutcome> {
        self.registry.send_many(user_ids, Envelope::new(event)).await
    }

    /// Push one event to every connected user. Rare, for global notices.
    pub async fn broadcast(&self, event: RealtimeEvent) -> Vec<DeliveryOutcome> {
        self.registry.broadcast(Envelope::new(event)).await
    }
}
