//! # Relay Realtime Crate
//!
//! The presence and message-delivery core of the Relay chat backend:
//!
//! - **Registry**: at most one live connection per user, safe under
//!   connect/disconnect churn
//! - **Lifecycle**: monotonic Sent -> Delivered -> Read transitions and the
//!   bounded revoke window
//! - **Router**: persist-then-fan-out delivery for private and group
//!   messages
//! - **Notifier**: best-effort fan-out of friend/membership/typing events
//!
//! Persistence and group membership are external collaborators reached
//! through the [`store`] traits; transports adapt connections into the
//! registry's envelope channels.

pub mod envelope;
pub mod error;
pub mod lifecycle;
pub mod message;
pub mod notifier;
pub mod registry;
pub mod router;
pub mod store;

pub use envelope::{Envelope, RealtimeEvent};
pub use error::{CoreError, CoreResult};
pub use message::{
    GroupId, Message, MessageDraft, MessageId, MessageKind, MessageStatus, MessageTarget,
    NewMessage, UserId,
};
pub use notifier::EventNotifier;
pub use registry::{ConnectionHandle, ConnectionRegistry, DeliveryFailure, DeliveryOutcome};
pub use router::DeliveryRouter;
pub use store::{MembershipView, MessageStore};
