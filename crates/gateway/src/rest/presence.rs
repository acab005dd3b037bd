//! Presence queries answered straight from the connection registry.

use axum::{
    extract::{Path, State},
    Json,
};
use relay_realtime::UserId;
use serde::Serialize;
use std::sync::Arc;

use crate::state::GatewayState;

#[derive(Debug, Serialize)]
pub struct OnlineUsersResponse {
    pub online_count: usize,
    pub user_ids: Vec<UserId>,
}

#[derive(Debug, Serialize)]
pub struct UserPresenceResponse {
    pub user_id: UserId,
    pub online: bool,
}

/// Snapshot of every currently connected user.
pub async fn online_users(State(state): State<Arc<GatewayState>>) -> Json<OnlineUsersResponse> {
    let mut user_ids = state.registry.online_user_ids();
    user_ids.sort_unstable();

    Json(OnlineUsersResponse {
        online_count: user_ids.len(),
        user_ids,
    })
}

/// Whether one user currently has a live connection.
pub async fn user_presence(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<UserId>,
) -> Json<UserPresenceResponse> {
    Json(UserPresenceResponse {
        user_id,
        online: state.registry.is_online(user_id),
    })
}
