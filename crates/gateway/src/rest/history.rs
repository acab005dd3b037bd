//! Message history endpoints: the catch-up path for offline recipients.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use relay_realtime::{GroupId, Message, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::state::GatewayState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl HistoryQuery {
    fn page(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub user_id: UserId,
    pub unread: i64,
}

/// Conversation between two users, newest first.
pub async fn private_history(
    State(state): State<Arc<GatewayState>>,
    Path((user_id, peer_id)): Path<(UserId, UserId)>,
    Query(query): Query<HistoryQuery>,
) -> GatewayResult<Json<Vec<Message>>> {
    let (limit, offset) = query.page();
    let messages = state
        .messages
        .private_history(user_id, peer_id, limit, offset)
        .await?;
    Ok(Json(messages))
}

/// Group conversation, newest first.
pub async fn group_history(
    State(state): State<Arc<GatewayState>>,
    Path(group_id): Path<GroupId>,
    Query(query): Query<HistoryQuery>,
) -> GatewayResult<Json<Vec<Message>>> {
    let (limit, offset) = query.page();
    let messages = state.messages.group_history(group_id, limit, offset).await?;
    Ok(Json(messages))
}

/// Count of unread private messages waiting for a user.
pub async fn unread_count(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<UserId>,
) -> GatewayResult<Json<UnreadCountResponse>> {
    let unread = state.messages.unread_private_count(user_id).await?;
    Ok(Json(UnreadCountResponse { user_id, unread }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_clamps() {
        let query = HistoryQuery {
            limit: None,
            offset: None,
        };
        assert_eq!(query.page(), (50, 0));

        let query = HistoryQuery {
            limit: Some(100_000),
            offset: Some(-5),
        };
        assert_eq!(query.page(), (200, 0));

        let query = HistoryQuery {
            limit: Some(0),
            offset: Some(10),
        };
        assert_eq!(query.page(), (1, 10));
    }
}
