use dashmap::DashMap;
use std::sync::Arc;

use super::connection::ConnectionSender;

/// Live connections by name, shared between the supervisor and user tasks
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<String, ConnectionSender>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, replacing any previous one with the same name
    pub fn insert(&self, sender: ConnectionSender) -> Option<ConnectionSender> {
        self.connections.insert(sender.name().to_string(), sender)
    }

    pub fn get(&self, name: &str) -> Option<ConnectionSender> {
        self.connections.get(name).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, name: &str) -> Option<ConnectionSender> {
        self.connections.remove(name).map(|(_, sender)| sender)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Request a normal close on every registered connection
    pub async fn close_all(&self) {
        // collect first: no shard lock may be held across an await
        let senders: Vec<ConnectionSender> =
            self.connections.iter().map(|e| e.value().clone()).collect();
        for sender in senders {
            tracing::info!(connection = sender.name(), "closing");
            sender.close().await;
        }
    }
}
