//! Fan-out of server events to live connections
//!
//! Every admitted connection registers an unbounded outbound queue drained by
//! its own writer task. Sending never waits on a recipient, and a closed queue
//! is skipped without affecting the others.

use log::{debug, error};
use shared::{PlayerId, ServerEvent};
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::mpsc;

/// Work item for a connection's writer task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Serialized event
    Text(String),
    /// Heartbeat probe
    Ping,
    /// Graceful close with a close code
    Close { code: u16, reason: String },
    /// Drop the transport without a close handshake
    Terminate,
}

#[derive(Debug)]
pub struct ConnectionHandle {
    pub ip: IpAddr,
    /// Cleared by each heartbeat sweep, set again by any pong
    pub alive: bool,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    pub fn new(ip: IpAddr, sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            ip,
            alive: true,
            sender,
        }
    }

    /// Queues `outbound`, returning false if the writer is gone
    pub fn send(&self, outbound: Outbound) -> bool {
        self.sender.send(outbound).is_ok()
    }
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<PlayerId, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: PlayerId, handle: ConnectionHandle) {
        self.connections.insert(id, handle);
    }

    pub fn unregister(&mut self, id: PlayerId) -> Option<ConnectionHandle> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&ConnectionHandle> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut ConnectionHandle> {
        self.connections.get_mut(&id)
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.connections.keys().copied().collect()
    }

    /// Sends `event` to a single connection
    pub fn send_to(&self, id: PlayerId, event: &ServerEvent) -> bool {
        let Some(handle) = self.connections.get(&id) else {
            return false;
        };
        match event.to_json() {
            Ok(text) => handle.send(Outbound::Text(text)),
            Err(e) => {
                error!("Failed to serialize event for {}: {}", id, e);
                false
            }
        }
    }

    /// Sends `event` to every registered connection. Returns the number of
    /// queues that accepted it.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let text = match event.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize broadcast event: {}", e);
                return 0;
            }
        };

        let recipients: Vec<(PlayerId, &ConnectionHandle)> = self
            .connections
            .iter()
            .map(|(id, handle)| (*id, handle))
            .collect();

        let mut delivered = 0;
        for (id, handle) in recipients {
            if handle.send(Outbound::Text(text.clone())) {
                delivered += 1;
            } else {
                debug!("Skipped broadcast to closed connection {}", id);
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
