//! REST endpoints for the gateway

pub mod health;
pub mod history;
pub mod presence;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::state::GatewayState;

/// Create all REST routes
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/presence", get(presence::online_users))
        .route("/presence/:user_id", get(presence::user_presence))
        .route(
            "/messages/private/:user_id/:peer_id",
            get(history::private_history),
        )
        .route("/messages/group/:group_id", get(history::group_history))
        .route("/messages/unread/:user_id", get(history::unread_count))
}
