//! Open peer connections as seen by the replication layer.
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{CollaborationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
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

/// Whatever can carry a text frame to one peer.
pub trait PeerConnection: Send {
    fn id(&self) -> ConnectionId;

    fn is_open(&self) -> bool;

    fn send(&self, text: &str) -> Result<()>;
}

/// Connection backed by an unbounded channel drained by a socket writer task.
#[derive(Debug, Clone)]
pub struct ChannelConnection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelConnection {
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<String>) -> Self {
        Self { id, tx }
    }

    /// A fresh connection and the receiver its writer task should drain.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(ConnectionId::new(), tx), rx)
    }
}

impl PeerConnection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, text: &str) -> Result<()> {
        self.tx
            .send(text.to_string())
            .map_err(|_| CollaborationError::ConnectionClosed(self.id))
    }
}

/// The active set. Closed or failing connections are dropped on the next send.
#[derive(Default)]
pub struct ConnectionSet {
    connections: Vec<Box<dyn PeerConnection>>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, connection: Box<dyn PeerConnection>) {
        debug!("Connection {} added", connection.id());
        self.connections.push(connection);
    }

    pub fn remove(&mut self, id: ConnectionId) -> Result<()> {
        let before = self.connections.len();
        self.connections.retain(|c| c.id() != id);
        if self.connections.len() == before {
            return Err(CollaborationError::UnknownConnection(id));
        }
        info!("Connection {} removed", id);
        Ok(())
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.iter().any(|c| c.id() == id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|c| c.id()).collect()
    }

    /// Sends `text` to every open connection and returns how many took it.
    pub fn send_all(&mut self, text: &str) -> usize {
        let mut delivered = 0;
        self.connections.retain(|connection| {
            if !connection.is_open() {
                info!("Pruning closed connection {}", connection.id());
                return false;
            }
            match connection.send(text) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    info!("Pruning connection {}: {}", connection.id(), e);
                    false
                }
            }
        });
        delivered
    }
}
