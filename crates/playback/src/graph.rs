use std::collections::HashMap;
use std::fmt;
use timeline::TrackId;

use crate::AudioEngine;

/// Output channel a track's clips are routed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u32);

impl ChannelId {
    pub const MASTER: ChannelId = ChannelId(0);
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Explicit audio context handed to everything that talks to the engine.
///
/// Owns the engine and the track -> channel routing table.
pub struct AudioGraph {
    engine: Box<dyn AudioEngine>,
    routes: HashMap<TrackId, ChannelId>,
    next_channel: u32,
}

impl AudioGraph {
    pub fn new(engine: Box<dyn AudioEngine>) -> Self {
        Self {
            engine,
            routes: HashMap::new(),
            next_channel: 1,
        }
    }

    pub fn engine_mut(&mut self) -> &mut dyn AudioEngine {
        self.engine.as_mut()
    }

    /// Channel for `track`, allocated on first use.
    pub fn route(&mut self, track: TrackId) -> ChannelId {
        if let Some(channel) = self.routes.get(&track) {
            return *channel;
        }
        let channel = ChannelId(self.next_channel);
        self.next_channel += 1;
        self.routes.insert(track, channel);
        channel
    }

    pub fn channel(&self, track: TrackId) -> Option<ChannelId> {
        self.routes.get(&track).copied()
    }

    pub fn release(&mut self, track: TrackId) -> Option<ChannelId> {
        self.routes.remove(&track)
    }

    /// Drops routes for tracks not in `live`.
    pub fn retain_tracks(&mut self, live: &[TrackId]) {
        self.routes.retain(|track, _| live.contains(track));
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}
