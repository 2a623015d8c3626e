//! The live set of accepted connections.

use std::collections::HashMap;
use std::sync::Arc;

use super::connection::ClientConnection;

/// Accepted connections keyed by ID. Not synchronized; the hub owns the lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<String, Arc<ClientConnection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Returns `false` if the ID was already present.
    pub fn add(&mut self, connection: Arc<ClientConnection>) -> bool {
        self.connections
            .insert(connection.id.clone(), connection)
            .is_none()
    }

    /// Remove a connection by ID.
    pub fn remove(&mut self, id: &str) -> Option<Arc<ClientConnection>> {
        self.connections.remove(id)
    }

    /// Look up a connection.
    pub fn get(&self, id: &str) -> Option<&Arc<ClientConnection>> {
        self.connections.get(id)
    }

    /// Iterate over open connections.
    pub fn iter_open(&self) -> impl Iterator<Item = &Arc<ClientConnection>> {
        self.connections.values().filter(|c| c.is_open())
    }

    /// Iterate over every registered connection.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ClientConnection>> {
        self.connections.values()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }
}
