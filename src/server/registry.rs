//! Connection registry
//!
//! Tracks active control connections and enforces the connection limit.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

/// Registry for tracking active connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<SocketAddr, Instant>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `addr` unless `limit` connections are already active.
    pub fn try_register(&mut self, addr: SocketAddr, limit: usize) -> bool {
        if self.connections.len() >= limit {
            return false;
        }
        self.connections.insert(addr, Instant::now());
        true
    }

    /// Returns when the connection was registered.
    pub fn remove(&mut self, addr: &SocketAddr) -> Option<Instant> {
        self.connections.remove(addr)
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.connections.contains_key(addr)
    }
}
