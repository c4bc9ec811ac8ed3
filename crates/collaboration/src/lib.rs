//! Peer-to-peer replication of timeline edits.
//! Wire format, instrument payloads, the open connection set and the
//! replicator that stamps, broadcasts and filters messages.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod message;
pub use message::*;

mod instrument;
pub use instrument::*;

mod connection;
pub use connection::*;

mod replicator;
pub use replicator::*;

#[derive(Debug, Error)]
pub enum CollaborationError {
    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(ConnectionId),

    #[error("unknown peer connection: {0}")]
    UnknownConnection(ConnectionId),
}

impl From<serde_json::Error> for CollaborationError {
    fn from(err: serde_json::Error) -> Self {
        CollaborationError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CollaborationError>;

/// Identifier of one editing replica, carried as `origin` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub uuid::Uuid);

impl PeerId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lamport timestamp for causality tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LamportClock(pub u64);

impl LamportClock {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn tick(&mut self) {
        self.0 += 1;
    }

    pub fn update(&mut self, other: LamportClock) {
        self.0 = self.0.max(other.0) + 1;
    }
}

impl Default for LamportClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Total order over stamped messages: clock first, origin breaks ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stamp {
    pub clock: LamportClock,
    pub origin: PeerId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lamport_update_jumps_past_remote() {
        let mut clock = LamportClock::new();
        clock.tick();
        clock.update(LamportClock(7));
        assert_eq!(clock, LamportClock(8));
        clock.update(LamportClock(2));
        assert_eq!(clock, LamportClock(9));
    }

    #[test]
    fn test_stamp_origin_breaks_ties() {
        let a = PeerId(uuid::Uuid::from_u128(1));
        let b = PeerId(uuid::Uuid::from_u128(2));
        let lo = Stamp { clock: LamportClock(3), origin: b };
        let hi = Stamp { clock: LamportClock(4), origin: a };
        assert!(lo < hi);
        assert!(Stamp { clock: LamportClock(4), origin: b } > hi);
    }
}
