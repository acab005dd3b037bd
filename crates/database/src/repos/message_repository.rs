//! Repository for message persistence.

use chrono::{DateTime, Utc};
use relay_realtime::{
    CoreError, CoreResult, GroupId, Message, MessageId, MessageKind, MessageStatus, MessageStore,
    MessageTarget, NewMessage, UserId,
};
use sqlx::{Row, SqlitePool};
use tracing::info;

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, group_id, content, kind, status, \
     reply_to_id, is_revoked, revoked_at, created_at";

/// SQLite-backed implementation of the core's `MessageStore` collaborator,
/// plus the history queries offline clients catch up through.
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Conversation history between two users, newest first.
    pub async fn private_history(
        &self,
        user_a: UserId,
        user_b: UserId,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(map_message).collect()
    }

    /// Group conversation history, newest first.
    pub async fn group_history(
        &self,
        group_id: GroupId,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE group_id = ?
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(group_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(map_message).collect()
    }

    /// Unread, unrevoked private messages waiting for a user. Feeds
    /// external unread counters.
    pub async fn unread_private_count(&self, user_id: UserId) -> CoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages
             WHERE receiver_id = ? AND status < 2 AND is_revoked = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        Ok(count)
    }
}

impl MessageStore for MessageRepository {
    async fn create(&self, new: NewMessage) -> CoreResult<Message> {
        let created_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO messages (sender_id, receiver_id, group_id, content, kind, status, \
             reply_to_id, is_revoked, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?, 0, ?)",
        )
        .bind(new.sender_id)
        .bind(new.target.receiver_id())
        .bind(new.target.group_id())
        .bind(&new.content)
        .bind(new.kind.as_str())
        .bind(new.reply_to_id)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        let message_id = result.last_insert_rowid();
        info!(
            message_id,
            sender_id = new.sender_id,
            "created new message"
        );

        Ok(Message {
            id: message_id,
            sender_id: new.sender_id,
            target: new.target,
            content: new.content,
            kind: new.kind,
            status: MessageStatus::Sent,
            reply_to_id: new.reply_to_id,
            revoked: false,
            revoked_at: None,
            created_at,
        })
    }

    async fn raise_status(&self, id: MessageId, status: MessageStatus) -> CoreResult<()> {
        // single atomic monotonic-max update; racing raises converge on the
        // highest rank without a read-modify-write window
        let result = sqlx::query("UPDATE messages SET status = MAX(status, ?) WHERE id = ?")
            .bind(status.rank())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("message {id}")));
        }
        Ok(())
    }

    async fn mark_revoked(&self, id: MessageId, at: DateTime<Utc>) -> CoreResult<()> {
        let result = sqlx::query("UPDATE messages SET is_revoked = 1, revoked_at = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("message {id}")));
        }
        Ok(())
    }

    async fn find(&self, id: MessageId) -> CoreResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.as_ref().map(map_message).transpose()
    }
}

fn storage(err: sqlx::Error) -> CoreError {
    CoreError::storage(err.to_string())
}

fn map_message(row: &sqlx::sqlite::SqliteRow) -> CoreResult<Message> {
    let receiver_id: Option<UserId> = row.try_get("receiver_id").map_err(storage)?;
    let group_id: Option<GroupId> = row.try_get("group_id").map_err(storage)?;
    let target = MessageTarget::from_parts(receiver_id, group_id)
        .map_err(|_| CoreError::storage("message row has inconsistent target columns"))?;

    let kind: String = row.try_get("kind").map_err(storage)?;
    let status: i64 = row.try_get("status").map_err(storage)?;
    let created_at: String = row.try_get("created_at").map_err(storage)?;
    let revoked_at: Option<String> = row.try_get("revoked_at").map_err(storage)?;

    Ok(Message {
        id: row.try_get("id").map_err(storage)?,
        sender_id: row.try_get("sender_id").map_err(storage)?,
        target,
        content: row.try_get("content").map_err(storage)?,
        kind: MessageKind::from(kind.as_str()),
        status: MessageStatus::from_rank(status),
        reply_to_id: row.try_get("reply_to_id").map_err(storage)?,
        revoked: row.try_get("is_revoked").map_err(storage)?,
        revoked_at: revoked_at.as_deref().map(parse_timestamp).transpose()?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn parse_timestamp(value: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::storage(format!("invalid timestamp {value}: {e}")))
}
