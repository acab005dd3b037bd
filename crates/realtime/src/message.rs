//! Message domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub type UserId = i64;
pub type GroupId = i64;
pub type MessageId = i64;

/// Where a message is addressed. A message is private XOR group-targeted;
/// the enum makes any other combination unrepresentable. Serializes flat
/// (`receiver_id` or `group_id`) to match the wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageTarget {
    Private { receiver_id: UserId },
    Group { group_id: GroupId },
}

impl MessageTarget {
    /// Validate the wire-level pair of optional ids into a target.
    ///
    /// Exactly one of `receiver_id` and `group_id` must be set.
    pub fn from_parts(receiver_id: Option<UserId>, group_id: Option<GroupId>) -> CoreResult<Self> {
        match (receiver_id, group_id) {
            (Some(receiver_id), None) => Ok(Self::Private { receiver_id }),
            (None, Some(group_id)) => Ok(Self::Group { group_id }),
            (Some(_), Some(_)) => Err(CoreError::validation(
                "message cannot target both a receiver and a group",
            )),
            (None, None) => Err(CoreError::validation(
                "message must target either a receiver or a group",
            )),
        }
    }

    pub fn receiver_id(&self) -> Option<UserId> {
        match self {
            Self::Private { receiver_id } => Some(*receiver_id),
            Self::Group { .. } => None,
        }
    }

    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            Self::Private { .. } => None,
            Self::Group { group_id } => Some(*group_id),
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private { .. })
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group { .. })
    }
}

/// Message payload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
    Voice,
    Video,
    Emoji,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::File => "file",
            MessageKind::Voice => "voice",
            MessageKind::Video => "video",
            MessageKind::Emoji => "emoji",
        }
    }
}

impl From<&str> for MessageKind {
    fn from(s: &str) -> Self {
        match s {
            "image" => MessageKind::Image,
            "file" => MessageKind::File,
            "voice" => MessageKind::Voice,
            "video" => MessageKind::Video,
            "emoji" => MessageKind::Emoji,
            _ => MessageKind::Text,
        }
    }
}

/// Delivery status of a message. Stored as an integer rank; transitions
/// only ever raise the rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn rank(&self) -> i64 {
        match self {
            MessageStatus::Sent => 0,
            MessageStatus::Delivered => 1,
            MessageStatus::Read => 2,
        }
    }

    pub fn from_rank(rank: i64) -> Self {
        match rank {
            r if r >= 2 => MessageStatus::Read,
            1 => MessageStatus::Delivered,
            _ => MessageStatus::Sent,
        }
    }
}

/// A persisted chat message. Created by the delivery router on send,
/// mutated only through lifecycle transitions, never deleted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    #[serde(flatten)]
    pub target: MessageTarget,
    pub content: String,
    pub kind: MessageKind,
    pub status: MessageStatus,
    pub reply_to_id: Option<MessageId>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_delivered(&self) -> bool {
        self.status >= MessageStatus::Delivered
    }

    pub fn is_read(&self) -> bool {
        self.status >= MessageStatus::Read
    }
}

/// A message as handed to the store for creation; the store assigns the id
/// and the creation timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub target: MessageTarget,
    pub content: String,
    pub kind: MessageKind,
    pub reply_to_id: Option<MessageId>,
}

/// Sender-supplied portion of a message, before the router attaches
/// identity and target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDraft {
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub reply_to_id: Option<MessageId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_requires_exactly_one_destination() {
        assert!(matches!(
            MessageTarget::from_parts(Some(7), None),
            Ok(MessageTarget::Private { receiver_id: 7 })
        ));
        assert!(matches!(
            MessageTarget::from_parts(None, Some(9)),
            Ok(MessageTarget::Group { group_id: 9 })
        ));
        assert!(matches!(
            MessageTarget::from_parts(Some(7), Some(9)),
            Err(CoreError::Validation { .. })
        ));
        assert!(matches!(
            MessageTarget::from_parts(None, None),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn status_rank_round_trips() {
        for status in [
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Read,
        ] {
            assert_eq!(MessageStatus::from_rank(status.rank()), status);
        }
        // unknown ranks clamp rather than panic
        assert_eq!(MessageStatus::from_rank(-1), MessageStatus::Sent);
        assert_eq!(MessageStatus::from_rank(99), MessageStatus::Read);
    }

    #[test]
    fn status_ordering_matches_rank() {
        assert!(MessageStatus::Sent < MessageStatus::Delivered);
        assert!(MessageStatus::Delivered < MessageStatus::Read);
    }
}
