//! Delivery router: persist-then-fan-out for private and group messages,
//! plus the lifecycle operations callers trigger on existing messages.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::envelope::{Envelope, RealtimeEvent};
use crate::error::{CoreError, CoreResult};
use crate::lifecycle;
use crate::message::{
    GroupId, Message, MessageDraft, MessageId, MessageStatus, MessageTarget, NewMessage, UserId,
};
use crate::registry::{ConnectionRegistry, DeliveryOutcome};
use crate::store::{MembershipView, MessageStore};

/// Routes newly created messages to their live audience.
///
/// A send is successful once the message is persisted; live delivery is
/// best-effort on top (store-and-forward — an offline recipient fetches it
/// later through history, not through this path).
pub struct DeliveryRouter<S, M> {
    registry: Arc<ConnectionRegistry>,
    store: S,
    membership: M,
    revoke_window: Duration,
}

impl<S, M> DeliveryRouter<S, M>
where
    S: MessageStore,
    M: MembershipView,
{
    pub fn new(registry: Arc<ConnectionRegistry>, store: S, membership: M) -> Self {
        Self {
            registry,
            store,
            membership,
            revoke_window: lifecycle::default_revoke_window(),
        }
    }

    pub fn with_revoke_window(mut self, window: Duration) -> Self {
        self.revoke_window = window;
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Send a private message: persist once, then push to the receiver if
    /// connected. The message exists regardless of the delivery outcome.
    pub async fn send_private(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        draft: MessageDraft,
    ) -> CoreResult<(Message, DeliveryOutcome)> {
        let mut message = self
            .store
            .create(NewMessage {
                sender_id,
                target: MessageTarget::Private { receiver_id },
                content: draft.content,
                kind: draft.kind,
                reply_to_id: draft.reply_to_id,
            })
            .await?;

        info!(
            message_id = message.id,
            sender_id, receiver_id, "private message persisted"
        );

        let envelope = Envelope::new(RealtimeEvent::PrivateMessage {
            message: message.clone(),
        });
        let outcome = self.registry.send(receiver_id, envelope).await;

        if outcome.delivered {
            self.store
                .raise_status(message.id, MessageStatus::Delivered)
                .await?;
            message.status = MessageStatus::Delivered;
        } else {
            debug!(
                message_id = message.id,
                receiver_id, "receiver offline, message held for history fetch"
            );
        }

        Ok((message, outcome))
    }

    /// Send a group message: the sender must be an active member; the
    /// target set is the group's active members at this instant, minus the
    /// sender. Persisted exactly once per call, then fanned out.
    pub async fn send_group(
        &self,
        sender_id: UserId,
        group_id: GroupId,
        draft: MessageDraft,
    ) -> CoreResult<(Message, Vec<DeliveryOutcome>)> {
        if !self.membership.is_active_member(group_id, sender_id).await? {
            return Err(CoreError::precondition_failed(
                "sender is not an active member of the group",
            ));
        }

        let recipients: Vec<UserId> = self
            .membership
            .active_members(group_id)
            .await?
            .into_iter()
            .filter(|member| *member != sender_id)
            .collect();

        let mut message = self
            .store
            .create(NewMessage {
                sender_id,
                target: MessageTarget::Group { group_id },
                content: draft.content,
                kind: draft.kind,
                reply_to_id: draft.reply_to_id,
            })
            .await?;

        info!(
            message_id = message.id,
            sender_id,
            group_id,
            recipients = recipients.len(),
            "group message persisted"
        );

        let envelope = Envelope::new(RealtimeEvent::GroupMessage {
            message: message.clone(),
        });
        let outcomes = self.registry.send_many(&recipients, envelope).await;

        if outcomes.iter().any(|outcome| outcome.delivered) {
            self.store
                .raise_status(message.id, MessageStatus::Delivered)
                .await?;
            message.status = MessageStatus::Delivered;
        }

        Ok((message, outcomes))
    }

    /// Mark a message read on behalf of `actor`. Raising past the current
    /// rank is idempotent; an already-read message is a no-op.
    pub async fn mark_read(&self, actor_id: UserId, message_id: MessageId) -> CoreResult<()> {
        let message = self.require_message(message_id).await?;

        let is_active_member = match message.target {
            MessageTarget::Group { group_id } => {
                self.membership.is_active_member(group_id, actor_id).await?
            }
            MessageTarget::Private { .. } => false,
        };
        lifecycle::authorize_read(&message, actor_id, is_active_member)?;

        if lifecycle::is_raise(message.status, MessageStatus::Read) {
            self.store
                .raise_status(message_id, MessageStatus::Read)
                .await?;
        }
        Ok(())
    }

    /// Raise a message to Delivered, e.g. on a client receipt ack.
    pub async fn mark_delivered(&self, message_id: MessageId) -> CoreResult<()> {
        let message = self.require_message(message_id).await?;
        if lifecycle::is_raise(message.status, MessageStatus::Delivered) {
            self.store
                .raise_status(message_id, MessageStatus::Delivered)
                .await?;
        }
        Ok(())
    }

    /// Revoke a message inside the revoke window and notify its live
    /// audience. The record is flagged, never deleted.
    pub async fn revoke(&self, actor_id: UserId, message_id: MessageId) -> CoreResult<Message> {
        let mut message = self.require_message(message_id).await?;

        let now = Utc::now();
        lifecycle::authorize_revoke(&message, actor_id, now, self.revoke_window)?;

        self.store.mark_revoked(message_id, now).await?;
        message.revoked = true;
        message.revoked_at = Some(now);

        info!(message_id, sender_id = message.sender_id, "message revoked");

        let event = RealtimeEvent::MessageRevoked {
            message_id,
            sender_id: message.sender_id,
            revoked_at: now,
        };
        match message.target {
            MessageTarget::Private { receiver_id } => {
                self.registry.send(receiver_id, Envelope::new(event)).await;
            }
            MessageTarget::Group { group_id } => {
                self.broadcast_to_group(group_id, message.sender_id, event)
                    .await?;
            }
        }

        Ok(message)
    }

    /// Fan an event out to a group's currently active members, excluding
    /// one user (typically the originator). Membership is read fresh at
    /// call time.
    pub async fn broadcast_to_group(
        &self,
        group_id: GroupId,
        exclude_user_id: UserId,
        event: RealtimeEvent,
    ) -> CoreResult<Vec<DeliveryOutcome>> {
        let recipients: Vec<UserId> = self
            .membership
            .active_members(group_id)
            .await?
            .into_iter()
            .filter(|member| *member != exclude_user_id)
            .collect();

        Ok(self
            .registry
            .send_many(&recipients, Envelope::new(event))
            .await)
    }

    async fn require_message(&self, message_id: MessageId) -> CoreResult<Message> {
        self.store
            .find(message_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("message {message_id}")))
    }
}
