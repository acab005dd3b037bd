//! Repository for group membership.

use chrono::Utc;
use relay_realtime::{CoreError, CoreResult, GroupId, MembershipView, UserId};
use sqlx::SqlitePool;
use tracing::info;

/// SQLite-backed implementation of the core's `MembershipView`. Rows with a
/// `join_status` other than `active` (pending invites, kicked members) are
/// invisible to the real-time core.
#[derive(Clone)]
pub struct MembershipRepository {
    pool: SqlitePool,
}

impl MembershipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a member, or reactivate an existing row. Used when a join
    /// request is approved.
    pub async fn add_member(
        &self,
        group_id: GroupId,
        user_id: UserId,
        role: &str,
    ) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO group_members (group_id, user_id, role, join_status, joined_at)
             VALUES (?, ?, ?, 'active', ?)
             ON CONFLICT (group_id, user_id)
             DO UPDATE SET role = excluded.role, join_status = 'active'",
        )
        .bind(group_id)
        .bind(user_id)
        .bind(role)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        info!(group_id, user_id, role, "group member added");
        Ok(())
    }

    /// Flip a member out of the active set without deleting the row, so a
    /// kick keeps its audit trail.
    pub async fn set_join_status(
        &self,
        group_id: GroupId,
        user_id: UserId,
        join_status: &str,
    ) -> CoreResult<()> {
        let result =
            sqlx::query("UPDATE group_members SET join_status = ? WHERE group_id = ? AND user_id = ?")
                .bind(join_status)
                .bind(group_id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::membership(format!(
                "user {user_id} is not a member of group {group_id}"
            )));
        }
        Ok(())
    }

    /// Remove a member entirely. Used when a user leaves voluntarily.
    pub async fn remove_member(&self, group_id: GroupId, user_id: UserId) -> CoreResult<()> {
        sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        info!(group_id, user_id, "group member removed");
        Ok(())
    }
}

impl MembershipView for MembershipRepository {
    async fn active_members(&self, group_id: GroupId) -> CoreResult<Vec<UserId>> {
        let members: Vec<UserId> = sqlx::query_scalar(
            "SELECT user_id FROM group_members
             WHERE group_id = ? AND join_status = 'active'
             ORDER BY user_id",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(members)
    }

    async fn is_active_member(&self, group_id: GroupId, user_id: UserId) -> CoreResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM group_members
             WHERE group_id = ? AND user_id = ? AND join_status = 'active'",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        Ok(count > 0)
    }
}

fn storage(err: sqlx::Error) -> CoreError {
    CoreError::storage(err.to_string())
}
