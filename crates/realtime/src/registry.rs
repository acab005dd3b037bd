//! Connection registry: concurrent bookkeeping of live user connections.
//!
//! Each user maps to at most one live [`ConnectionHandle`]. Registering a
//! new connection for a user atomically detaches the previous one so the
//! invariant holds even when two handshakes for the same user race. All
//! map mutations happen inside one lock; sends never hold it across I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use tracing::debug;

use crate::envelope::Envelope;
use crate::message::UserId;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Why a recipient did not receive a live push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryFailure {
    /// No live connection registered for the recipient.
    Offline,
    /// A registered connection turned out to be dead on write; it has been
    /// unregistered.
    TransportClosed,
}

/// Per-recipient result of one fan-out attempt. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryOutcome {
    pub recipient_id: UserId,
    pub delivered: bool,
    pub failure: Option<DeliveryFailure>,
}

impl DeliveryOutcome {
    fn delivered(recipient_id: UserId) -> Self {
        Self {
            recipient_id,
            delivered: true,
            failure: None,
        }
    }

    fn failed(recipient_id: UserId, failure: DeliveryFailure) -> Self {
        Self {
            recipient_id,
            delivered: false,
            failure: Some(failure),
        }
    }
}

/// One live bidirectional channel to a user's client.
///
/// Owned by the [`ConnectionRegistry`]; the transport task that created it
/// keeps an `Arc` so it can wait for [`ConnectionHandle::closed`] after the
/// handle gets replaced by a newer connection.
pub struct ConnectionHandle {
    user_id: UserId,
    connection_id: u64,
    connected_at: i64,
    sender: mpsc::Sender<Envelope>,
    open: AtomicBool,
    close_signal: Notify,
}

impl ConnectionHandle {
    fn new(user_id: UserId, sender: mpsc::Sender<Envelope>) -> Self {
        Self {
            user_id,
            connection_id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            connected_at: Utc::now().timestamp_millis(),
            sender,
            open: AtomicBool::new(true),
            close_signal: Notify::new(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Unique, monotonically increasing id distinguishing this connection
    /// from any earlier or later connection of the same user.
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Epoch millis at registration.
    pub fn connected_at(&self) -> i64 {
        self.connected_at
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Mark the handle dead and wake its transport task.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.close_signal.notify_one();
        }
    }

    /// Resolves once the handle has been closed (replacement or eviction).
    pub async fn closed(&self) {
        while self.is_open() {
            self.close_signal.notified().await;
        }
    }

    async fn push(&self, envelope: Envelope) -> bool {
        if !self.is_open() {
            return false;
        }
        self.sender.send(envelope).await.is_ok()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("user_id", &self.user_id)
            .field("connection_id", &self.connection_id)
            .field("connected_at", &self.connected_at)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Thread-safe map of user id to the sole live connection.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<UserId, Arc<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh handle as the user's only live connection.
    ///
    /// Returns the new handle plus the previously registered one, if any.
    /// The previous handle is already closed when returned; the caller only
    /// needs it for bookkeeping. Insert-and-swap happens under the lock, so
    /// two racing registrations can never both believe they own the slot.
    pub fn register(
        &self,
        user_id: UserId,
        sender: mpsc::Sender<Envelope>,
    ) -> (Arc<ConnectionHandle>, Option<Arc<ConnectionHandle>>) {
        let handle = Arc::new(ConnectionHandle::new(user_id, sender));
        let previous = {
            let mut connections = self.connections.lock().expect("registry lock poisoned");
            connections.insert(user_id, Arc::clone(&handle))
        };

        if let Some(previous) = &previous {
            previous.close();
            debug!(
                user_id,
                old_connection = previous.connection_id(),
                new_connection = handle.connection_id(),
                "replaced live connection"
            );
        } else {
            debug!(
                user_id,
                connection = handle.connection_id(),
                "registered connection"
            );
        }

        (handle, previous)
    }

    /// Compare-and-remove: drop the mapping only if `handle` is still the
    /// registered connection. A late-closing stale handle cannot evict a
    /// newer one.
    pub fn unregister(&self, handle: &ConnectionHandle) -> bool {
        let removed = {
            let mut connections = self.connections.lock().expect("registry lock poisoned");
            match connections.get(&handle.user_id()) {
                Some(current) if current.connection_id() == handle.connection_id() => {
                    connections.remove(&handle.user_id());
                    true
                }
                _ => false,
            }
        };

        if removed {
            handle.close();
            debug!(
                user_id = handle.user_id(),
                connection = handle.connection_id(),
                "unregistered connection"
            );
        }
        removed
    }

    pub fn lookup(&self, user_id: UserId) -> Option<Arc<ConnectionHandle>> {
        self.connections
            .lock()
            .expect("registry lock poisoned")
            .get(&user_id)
            .cloned()
    }

    /// Push one envelope to a user. A write failure on a registered handle
    /// unregisters it and reports `TransportClosed`; it is never an error.
    pub async fn send(&self, user_id: UserId, envelope: Envelope) -> DeliveryOutcome {
        let Some(handle) = self.lookup(user_id) else {
            return DeliveryOutcome::failed(user_id, DeliveryFailure::Offline);
        };

        if handle.push(envelope).await {
            DeliveryOutcome::delivered(user_id)
        } else {
            debug!(
                user_id,
                connection = handle.connection_id(),
                "write to live connection failed, evicting"
            );
            self.unregister(&handle);
            DeliveryOutcome::failed(user_id, DeliveryFailure::TransportClosed)
        }
    }

    /// Fan one envelope out to many users. Each recipient's send is
    /// independent and runs concurrently; one dead connection never blocks
    /// or fails the rest.
    pub async fn send_many(&self, user_ids: &[UserId], envelope: Envelope) -> Vec<DeliveryOutcome> {
        join_all(
            user_ids
                .iter()
                .map(|user_id| self.send(*user_id, envelope.clone())),
        )
        .await
    }

    /// Send to every currently registered user. Iterates a point-in-time
    /// snapshot of the key set, so concurrent register/unregister is fine.
    pub async fn broadcast(&self, envelope: Envelope) -> Vec<DeliveryOutcome> {
        let user_ids = self.online_user_ids();
        self.send_many(&user_ids, envelope).await
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.connections
            .lock()
            .expect("registry lock poisoned")
            .contains_key(&user_id)
    }

    pub fn online_count(&self) -> usize {
        self.connections
            .lock()
            .expect("registry lock poisoned")
            .len()
    }

    /// Snapshot of all online user ids, in no particular order.
    pub fn online_user_ids(&self) -> Vec<UserId> {
        self.connections
            .lock()
            .expect("registry lock poisoned")
            .keys()
            .copied()
            .collect()
    }
}
