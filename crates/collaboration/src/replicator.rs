//! Stamps outgoing messages, fans them out, and filters incoming ones.
use std::collections::HashMap;
use timeline::ClipId;
use tracing::{debug, error, warn};

use crate::{ConnectionId, ConnectionSet, LamportClock, PeerConnection, PeerId, PeerMessage, Stamp, WireMessage};

/// A decoded inbound message and the stamp it carried, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub message: PeerMessage,
    pub stamp: Option<Stamp>,
}

pub struct Replicator {
    replica: PeerId,
    clock: LamportClock,
    connections: ConnectionSet,
    /// Newest stamp applied per clip for `clipMove`.
    last_moves: HashMap<ClipId, Stamp>,
}

impl Replicator {
    pub fn new(replica: PeerId) -> Self {
        Self {
            replica,
            clock: LamportClock::new(),
            connections: ConnectionSet::new(),
            last_moves: HashMap::new(),
        }
    }

    pub fn replica(&self) -> PeerId {
        self.replica
    }

    pub fn clock(&self) -> LamportClock {
        self.clock
    }

    pub fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    pub fn connect(&mut self, connection: Box<dyn PeerConnection>) {
        self.connections.add(connection);
    }

    pub fn disconnect(&mut self, id: ConnectionId) {
        if let Err(e) = self.connections.remove(id) {
            debug!("{}", e);
        }
    }

    /// Sends `message` to every open connection. Returns the number of peers reached.
    pub fn broadcast(&mut self, message: PeerMessage) -> usize {
        self.clock.tick();
        let stamp = Stamp {
            clock: self.clock,
            origin: self.replica,
        };
        if let PeerMessage::ClipMove { clip_id, .. } = &message {
            self.last_moves.insert(clip_id.clone(), stamp);
        }

        let kind = message.kind();
        let text = match WireMessage::stamped(message, stamp).encode() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode {} message: {}", kind, e);
                return 0;
            }
        };
        let delivered = self.connections.send_all(&text);
        debug!("Broadcast {} @{} to {} peer(s)", kind, stamp.clock.0, delivered);
        delivered
    }

    /// Decodes a frame from `from`.
    ///
    /// Returns the message to apply, or `None` when the frame is unreadable
    /// or is a `clipMove` older than one already applied for that clip.
    /// Call [`Replicator::mark_applied`] once the message has changed the store.
    pub fn receive(&mut self, from: ConnectionId, text: &str) -> Option<Inbound> {
        let wire = match WireMessage::decode(text) {
            Ok(wire) => wire,
            Err(e) => {
                warn!("Dropping undecodable message from {}: {}", from, e);
                return None;
            }
        };

        let stamp = wire.stamp();
        if let Some(stamp) = stamp {
            self.clock.update(stamp.clock);
        }

        if let (PeerMessage::ClipMove { clip_id, .. }, Some(stamp)) = (&wire.message, stamp) {
            if self.last_moves.get(clip_id).is_some_and(|applied| stamp <= *applied) {
                debug!("Ignoring stale clipMove for {} from {}", clip_id, from);
                return None;
            }
        }

        Some(Inbound {
            message: wire.message,
            stamp,
        })
    }

    /// Records the stamp of a `clipMove` the store accepted.
    pub fn mark_applied(&mut self, inbound: &Inbound) {
        if let (PeerMessage::ClipMove { clip_id, .. }, Some(stamp)) = (&inbound.message, inbound.stamp) {
            let newest = self.last_moves.entry(clip_id.clone()).or_insert(stamp);
            if stamp > *newest {
                *newest = stamp;
            }
        }
    }

    /// Forgets ordering state for a clip that no longer exists.
    pub fn forget_clip(&mut self, clip_id: &ClipId) {
        self.last_moves.remove(clip_id);
    }
}
