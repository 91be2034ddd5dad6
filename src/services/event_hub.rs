//! In-memory registry of open SSE connections
//!
//! Each connection is tagged with its user and system role so events can be
//! routed to a user, a set of users, one or more roles, or everyone.

use std::sync::Arc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};
use uuid::Uuid;
use crate::models::user::UserRole;

/// One frame pushed down an SSE stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub event: String,
    pub data: String,
}

impl SseMessage {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self { event: event.into(), data: data.into() }
    }

    /// Frame with a JSON payload
    pub fn json<T: Serialize>(event: impl Into<String>, payload: &T) -> serde_json::Result<Self> {
        Ok(Self::new(event, serde_json::to_string(payload)?))
    }
}

#[derive(Debug)]
struct Connection {
    user_id: Uuid,
    role: UserRole,
    sender: UnboundedSender<SseMessage>,
}

/// Registry of live SSE connections
#[derive(Debug, Clone, Default)]
pub struct EventHub {
    connections: Arc<DashMap<Uuid, Connection>>,
}

/// Removes its connection from the hub when dropped
#[derive(Debug)]
pub struct ConnectionGuard {
    connection_id: Uuid,
    connections: Arc<DashMap<Uuid, Connection>>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.connections.remove(&self.connection_id).is_some() {
            debug!(connection_id = %self.connection_id, "SSE connection closed");
        }
    }
}

/// A registered connection: the receiving half plus its drop guard
#[derive(Debug)]
pub struct Subscription {
    pub connection_id: Uuid,
    pub receiver: UnboundedReceiver<SseMessage>,
    pub guard: ConnectionGuard,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection for `user_id`
    pub fn subscribe(&self, user_id: Uuid, role: UserRole) -> Subscription {
        let (sender, receiver) = unbounded_channel();
        let connection_id = Uuid::new_v4();

        self.connections.insert(connection_id, Connection { user_id, role, sender });
        debug!(connection_id = %connection_id, user_id = %user_id, role = %role, "SSE connection opened");

        Subscription {
            connection_id,
            receiver,
            guard: ConnectionGuard {
                connection_id,
                connections: Arc::clone(&self.connections),
            },
        }
    }

    /// Deliver to every connection matching `filter`; returns the delivered count
    fn deliver<F>(&self, message: &SseMessage, filter: F) -> usize
    where
        F: Fn(&Connection) -> bool,
    {
        let mut delivered = 0;
        let mut dead = Vec::new();

        for entry in self.connections.iter() {
            let connection = entry.value();
            if !filter(connection) {
                continue;
            }
            if connection.sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*entry.key());
            }
        }

        // removal happens after iteration so no shard lock is held twice
        for id in dead {
            trace!(connection_id = %id, "Pruning closed SSE connection");
            self.connections.remove(&id);
        }

        delivered
    }

    pub fn send_to_user(&self, user_id: Uuid, message: &SseMessage) -> usize {
        self.deliver(message, |c| c.user_id == user_id)
    }

    pub fn send_to_users(&self, user_ids: &[Uuid], message: &SseMessage) -> usize {
        self.deliver(message, |c| user_ids.contains(&c.user_id))
    }

    pub fn broadcast_to_roles(&self, roles: &[UserRole], message: &SseMessage) -> usize {
        self.deliver(message, |c| roles.contains(&c.role))
    }

    pub fn broadcast_all(&self, message: &SseMessage) -> usize {
        self.deliver(message, |_| true)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Open connections belonging to `user_id`
    pub fn user_connection_count(&self, user_id: Uuid) -> usize {
        self.connections.iter().filter(|c| c.user_id == user_id).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> SseMessage {
        SseMessage::new("notification", "{}")
    }

    #[test]
    fn test_send_to_user_only_reaches_that_user() {
        let hub = EventHub::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let mut a = hub.subscribe(alice, UserRole::Cooperado);
        let mut b = hub.subscribe(bob, UserRole::Cooperado);

        assert_eq!(hub.send_to_user(alice, &message()), 1);
        assert_eq!(a.receiver.try_recv().unwrap(), message());
        assert!(b.receiver.try_recv().is_err());
    }

    #[test]
    fn test_role_broadcast() {
        let hub = EventHub::new();
        let mut cooperado = hub.subscribe(Uuid::new_v4(), UserRole::Cooperado);
        let mut fornecedor = hub.subscribe(Uuid::new_v4(), UserRole::Fornecedor);
        let mut master = hub.subscribe(Uuid::new_v4(), UserRole::Master);

        let sent = hub.broadcast_to_roles(&[UserRole::Cooperado, UserRole::Master], &message());
        assert_eq!(sent, 2);
        assert!(cooperado.receiver.try_recv().is_ok());
        assert!(master.receiver.try_recv().is_ok());
        assert!(fornecedor.receiver.try_recv().is_err());

        assert_eq!(hub.broadcast_all(&message()), 3);
    }

    #[test]
    fn test_multiple_tabs_for_one_user() {
        let hub = EventHub::new();
        let user = Uuid::new_v4();
        let _first = hub.subscribe(user, UserRole::Cooperativa);
        let _second = hub.subscribe(user, UserRole::Cooperativa);

        assert_eq!(hub.user_connection_count(user), 2);
        assert_eq!(hub.send_to_users(&[user, Uuid::new_v4()], &message()), 2);
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let hub = EventHub::new();
        let subscription = hub.subscribe(Uuid::new_v4(), UserRole::Cooperado);
        assert_eq!(hub.connection_count(), 1);

        drop(subscription);
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn test_closed_receivers_are_pruned() {
        let hub = EventHub::new();
        let user = Uuid::new_v4();
        let Subscription { receiver, guard, .. } = hub.subscribe(user, UserRole::Cooperado);

        // receiver gone but the guard still holds the registration
        drop(receiver);
        assert_eq!(hub.connection_count(), 1);

        assert_eq!(hub.send_to_user(user, &message()), 0);
        assert_eq!(hub.connection_count(), 0);
        drop(guard);
    }
}
