use crate::domain_model::UserId;
use crate::server::ConnMessage;
use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Transport-assigned connection handle. Opaque to clients.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ConnectionId(pub uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        ConnectionId(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct ClientRecord {
    /// Identity the connection authenticated as; the only identity it may join.
    pub user_id: UserId,
    pub control: Sender<ConnMessage>,
    pub mailbox: Sender<ConnMessage>,
    pub actor_handle: Mutex<Option<JoinHandle<()>>>,
    pub cancellation_token: CancellationToken,
}

/// Process-wide directory of live realtime connections. Rebuilt from nothing
/// on restart; clients must rejoin.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ClientRecord>,
    memberships: DashMap<UserId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    pub fn insert_connection(&self, connection_id: ConnectionId, record: ClientRecord) {
        self.connections.insert(connection_id, record);
    }

    /// Drops the connection record and every membership it holds.
    pub fn remove_connection(&self, connection_id: ConnectionId) -> Option<ClientRecord> {
        let (_, record) = self.connections.remove(&connection_id)?;
        self.leave(connection_id, record.user_id);
        Some(record)
    }

    /// Idempotent: joining the same (connection, user) pair twice is a no-op.
    pub fn join(&self, connection_id: ConnectionId, user_id: UserId) {
        self.memberships
            .entry(user_id)
            .or_default()
            .insert(connection_id);
    }

    /// No-op when the pair is not registered. Empty sets are dropped.
    pub fn leave(&self, connection_id: ConnectionId, user_id: UserId) {
        if let Some(mut set) = self.memberships.get_mut(&user_id) {
            set.remove(&connection_id);
        }
        self.memberships.remove_if(&user_id, |_, set| set.is_empty());
    }

    /// Snapshot of the current membership set for a user.
    pub fn members_of(&self, user_id: UserId) -> Vec<ConnectionId> {
        self.memberships
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Best-effort push into a connection mailbox. A dead or saturated
    /// connection is dropped silently; the disconnect path reaps it.
    pub fn deliver(&self, connection_id: ConnectionId, message: ConnMessage) -> bool {
        let Some(record) = self.connections.get(&connection_id) else {
            tracing::trace!("deliver to unknown connection {connection_id}");
            return false;
        };
        match record.mailbox.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(..)) => {
                tracing::warn!("mailbox full for connection {connection_id}, event dropped");
                false
            }
            Err(TrySendError::Closed(..)) => {
                tracing::trace!("mailbox closed for connection {connection_id}");
                false
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub async fn shutdown(&self) {
        tracing::info!("ConnectionRegistry shutting down...");

        for entry in self.connections.iter() {
            entry.cancellation_token.cancel();
        }

        let mut handles = Vec::new();
        for entry in self.connections.iter() {
            if let Ok(mut lock) = entry.actor_handle.lock() {
                if let Some(handle) = lock.take() {
                    handles.push(handle);
                }
            }
        }

        for handle in handles {
            let _ = handle.await;
        }

        tracing::info!("All connection actors shut down.");
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{Receiver, channel};

    fn record(user_id: UserId) -> (ClientRecord, Receiver<ConnMessage>) {
        let (control, _control_rx) = channel(8);
        let (mailbox, mailbox_rx) = channel(8);
        let record = ClientRecord {
            user_id,
            control,
            mailbox,
            actor_handle: Mutex::new(None),
            cancellation_token: CancellationToken::new(),
        };
        (record, mailbox_rx)
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::new();

        registry.join(conn, UserId(1));
        registry.join(conn, UserId(1));

        assert_eq!(registry.members_of(UserId(1)), vec![conn]);
    }

    #[tokio::test]
    async fn leave_removes_only_the_given_pair() {
        let registry = ConnectionRegistry::new();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();

        registry.join(c1, UserId(1));
        registry.join(c2, UserId(1));
        registry.leave(c1, UserId(1));

        assert_eq!(registry.members_of(UserId(1)), vec![c2]);

        // absent pair: no-op
        registry.leave(c1, UserId(1));
        registry.leave(c1, UserId(42));
        assert_eq!(registry.members_of(UserId(1)), vec![c2]);
    }

    #[tokio::test]
    async fn remove_connection_reaps_memberships() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::new();
        let (rec, _rx) = record(UserId(1));

        registry.insert_connection(conn, rec);
        registry.join(conn, UserId(1));

        assert!(registry.remove_connection(conn).is_some());
        assert!(registry.members_of(UserId(1)).is_empty());
        assert_eq!(registry.connection_count(), 0);

        // second removal finds nothing
        assert!(registry.remove_connection(conn).is_none());
    }

    #[tokio::test]
    async fn deliver_reaches_the_mailbox() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::new();
        let (rec, mut rx) = record(UserId(1));
        registry.insert_connection(conn, rec);

        assert!(registry.deliver(conn, ConnMessage::Text("hello".to_string())));
        match rx.recv().await {
            Some(ConnMessage::Text(t)) => assert_eq!(t, "hello"),
            other => panic!("unexpected mailbox content: {other:?}"),
        }

        // unknown connection: dropped, not an error
        assert!(!registry.deliver(ConnectionId::new(), ConnMessage::Text("x".to_string())));
    }

    #[tokio::test]
    async fn deliver_to_closed_mailbox_is_dropped() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::new();
        let (rec, rx) = record(UserId(1));
        registry.insert_connection(conn, rec);
        drop(rx);

        assert!(!registry.deliver(conn, ConnMessage::Text("hello".to_string())));
    }
}
