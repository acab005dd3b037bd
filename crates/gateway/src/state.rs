//! Shared application state for the gateway

use std::sync::Arc;

use chrono::Duration;
use relay_config::RealtimeConfig;
use relay_database::{MembershipRepository, MessageRepository};
use relay_realtime::{ConnectionRegistry, DeliveryRouter, EventNotifier};
use sqlx::SqlitePool;

/// Shared state handed to every route handler and connection task.
#[derive(Clone)]
pub struct GatewayState {
    /// Database connection pool
    pub pool: SqlitePool,
    /// Live connection bookkeeping
    pub registry: Arc<ConnectionRegistry>,
    /// Persist-then-fan-out message pipeline
    pub delivery: Arc<DeliveryRouter<MessageRepository, MembershipRepository>>,
    /// Fire-and-forget event fan-out
    pub notifier: EventNotifier,
    /// Direct access to message history queries
    pub messages: MessageRepository,
    /// Depth of each connection's outbound frame queue
    pub send_queue_depth: usize,
}

impl GatewayState {
    pub fn new(pool: SqlitePool, realtime: &RealtimeConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let messages = MessageRepository::new(pool.clone());
        let membership = MembershipRepository::new(pool.clone());

        let revoke_window = Duration::seconds(
            i64::try_from(realtime.revoke_window_seconds).unwrap_or(i64::MAX),
        );
        let delivery = Arc::new(
            DeliveryRouter::new(Arc::clone(&registry), messages.clone(), membership)
                .with_revoke_window(revoke_window),
        );
        let notifier = EventNotifier::new(Arc::clone(&registry));

        Self {
            pool,
            registry,
            delivery,
            notifier,
            messages,
            send_queue_depth: realtime.send_queue_depth.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_config::DatabaseConfig;
    use relay_database::initialize_database;

    #[tokio::test]
    async fn test_state_builds_from_in_memory_database() {
        let pool = initialize_database(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();

        let state = GatewayState::new(pool, &RealtimeConfig::default());
        assert_eq!(state.registry.online_count(), 0);
        assert_eq!(state.send_queue_depth, 64);
    }
}
