//! Wire envelope and the closed set of real-time event kinds.
//!
//! Everything pushed over a live connection is an [`Envelope`]:
//! `{"type": <tag>, "payload": {...}, "timestamp": <epoch-millis>}`.
//! The event set is a tagged union so the transport boundary never deals
//! in stringly-typed maps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{GroupId, Message, MessageId, UserId};

/// A real-time event, tagged at the wire as `type`/`payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum RealtimeEvent {
    // message events
    PrivateMessage {
        message: Message,
    },
    GroupMessage {
        message: Message,
    },
    MessageRevoked {
        message_id: MessageId,
        sender_id: UserId,
        revoked_at: DateTime<Utc>,
    },

    // friendship events
    FriendRequest {
        from_user_id: UserId,
        message: Option<String>,
    },
    FriendRequestAccepted {
        friend_id: UserId,
    },
    FriendRequestRejected {
        friend_id: UserId,
    },
    FriendDeleted {
        friend_id: UserId,
    },

    // group membership events
    MemberJoined {
        group_id: GroupId,
        user_id: UserId,
    },
    MemberLeft {
        group_id: GroupId,
        user_id: UserId,
    },
    MemberKicked {
        group_id: GroupId,
        user_id: UserId,
        by_user_id: UserId,
    },
    MemberRoleChanged {
        group_id: GroupId,
        user_id: UserId,
        role: String,
    },
    OwnershipTransferred {
        group_id: GroupId,
        from_user_id: UserId,
        to_user_id: UserId,
    },
    GroupDissolved {
        group_id: GroupId,
    },
    GroupInfoUpdated {
        group_id: GroupId,
    },

    // ephemeral indicators, never persisted
    Typing {
        from_user_id: UserId,
        group_id: Option<GroupId>,
    },
    StopTyping {
        from_user_id: UserId,
        group_id: Option<GroupId>,
    },

    // session frames
    Connected {
        user_id: UserId,
        online_count: usize,
    },
    Pong,
    Ack {
        detail: String,
        message: Option<Message>,
    },
    Error {
        detail: String,
    },
}

impl RealtimeEvent {
    /// Wire tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RealtimeEvent::PrivateMessage { .. } => "private_message",
            RealtimeEvent::GroupMessage { .. } => "group_message",
            RealtimeEvent::MessageRevoked { .. } => "message_revoked",
            RealtimeEvent::FriendRequest { .. } => "friend_request",
            RealtimeEvent::FriendRequestAccepted { .. } => "friend_request_accepted",
            RealtimeEvent::FriendRequestRejected { .. } => "friend_request_rejected",
            RealtimeEvent::FriendDeleted { .. } => "friend_deleted",
            RealtimeEvent::MemberJoined { .. } => "member_joined",
            RealtimeEvent::MemberLeft { .. } => "member_left",
            RealtimeEvent::MemberKicked { .. } => "member_kicked",
            RealtimeEvent::MemberRoleChanged { .. } => "member_role_changed",
            RealtimeEvent::OwnershipTransferred { .. } => "ownership_transferred",
            RealtimeEvent::GroupDissolved { .. } => "group_dissolved",
            RealtimeEvent::GroupInfoUpdated { .. } => "group_info_updated",
            RealtimeEvent::Typing { .. } => "typing",
            RealtimeEvent::StopTyping { .. } => "stop_typing",
            RealtimeEvent::Connected { .. } => "connected",
            RealtimeEvent::Pong => "pong",
            RealtimeEvent::Ack { .. } => "ack",
            RealtimeEvent::Error { .. } => "error",
        }
    }
}

/// Timestamped wrapper around a [`RealtimeEvent`], serialized as one flat
/// JSON object at the transport boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub event: RealtimeEvent,
    /// Epoch millis at envelope creation.
    pub timestamp: i64,
}

impl Envelope {
    pub fn new(event: RealtimeEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.event.kind()
    }
}

impl From<RealtimeEvent> for Envelope {
    fn from(event: RealtimeEvent) -> Self {
        Self::new(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_with_type_payload_and_timestamp() {
        let envelope = Envelope::new(RealtimeEvent::FriendRequestAccepted { friend_id: 42 });
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["type"], "friend_request_accepted");
        assert_eq!(value["payload"]["friend_id"], 42);
        assert!(value["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn unit_events_serialize_without_payload() {
        let value = serde_json::to_value(Envelope::new(RealtimeEvent::Pong)).unwrap();
        assert_eq!(value["type"], "pong");
        assert!(value.get("payload").is_none());
    }

    #[test]
    fn envelope_round_trips() {
        let envelope = Envelope::new(RealtimeEvent::MemberKicked {
            group_id: 3,
            user_id: 8,
            by_user_id: 1,
        });
        let json = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
    }
}
