//! Collaborator interfaces the core calls out through.
//!
//! Persistence and group membership live outside the core; these traits are
//! the narrow seams it consumes them through. Implementations must be
//! `Send + Sync` because router calls run on arbitrary connection tasks.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::message::{GroupId, Message, MessageId, MessageStatus, NewMessage, UserId};

/// External message persistence.
pub trait MessageStore: Send + Sync {
    /// Persist a new message, assigning its id and creation timestamp.
    fn create(&self, message: NewMessage) -> impl Future<Output = CoreResult<Message>> + Send;

    /// Raise the delivery status. Must be applied as a single atomic
    /// `status = MAX(status, target)` at the store, so racing raises from
    /// concurrent readers converge on the highest rank.
    fn raise_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> impl Future<Output = CoreResult<()>> + Send;

    /// Set the revoked flag and timestamp. The record is kept.
    fn mark_revoked(
        &self,
        id: MessageId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = CoreResult<()>> + Send;

    fn find(&self, id: MessageId) -> impl Future<Output = CoreResult<Option<Message>>> + Send;
}

/// Read-only view of group membership, authoritative at call time. The
/// router queries it synchronously per send; results are never cached
/// across calls, so a just-removed member cannot receive later sends.
pub trait MembershipView: Send + Sync {
    fn active_members(
        &self,
        group_id: GroupId,
    ) -> impl Future<Output = CoreResult<Vec<UserId>>> + Send;

    fn is_active_member(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> impl Future<Output = CoreResult<bool>> + Send;
}
