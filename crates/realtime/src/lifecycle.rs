//! Message lifecycle rules.
//!
//! Status moves Sent -> Delivered -> Read and only ever forward; revocation
//! is an orthogonal flag the sender may set inside a bounded window after
//! creation. These checks gate a transition before it is handed to the
//! store; the store itself applies status raises as an atomic
//! `status = MAX(status, target)`.

use chrono::{DateTime, Duration, Utc};

use crate::error::{CoreError, CoreResult};
use crate::message::{Message, MessageStatus, MessageTarget, UserId};

/// How long after creation a sender may still revoke, unless configured
/// otherwise.
pub const DEFAULT_REVOKE_WINDOW_SECONDS: i64 = 120;

pub fn default_revoke_window() -> Duration {
    Duration::seconds(DEFAULT_REVOKE_WINDOW_SECONDS)
}

/// Whether raising to `target` changes the stored rank. Lower-or-equal
/// targets are a no-op, never an error.
pub fn is_raise(current: MessageStatus, target: MessageStatus) -> bool {
    target > current
}

/// Only the designated receiver (private) or an active group member (group)
/// may mark a message read.
pub fn authorize_read(message: &Message, actor: UserId, is_active_member: bool) -> CoreResult<()> {
    match message.target {
        MessageTarget::Private { receiver_id } => {
            if receiver_id == actor {
                Ok(())
            } else {
                Err(CoreError::unauthorized(
                    "only the receiver may mark a private message as read",
                ))
            }
        }
        MessageTarget::Group { .. } => {
            if is_active_member {
                Ok(())
            } else {
                Err(CoreError::unauthorized(
                    "only active group members may mark a group message as read",
                ))
            }
        }
    }
}

/// Only the original sender may revoke, once, within the revoke window.
pub fn authorize_revoke(
    message: &Message,
    actor: UserId,
    now: DateTime<Utc>,
    window: Duration,
) -> CoreResult<()> {
    if message.sender_id != actor {
        return Err(CoreError::unauthorized(
            "only the sender may revoke a message",
        ));
    }
    if message.revoked {
        return Err(CoreError::precondition_failed("message already revoked"));
    }
    if now - message.created_at > window {
        return Err(CoreError::precondition_failed("revoke window expired"));
    }
    Ok(())
}
