use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Locally generated track identifier. Never sent to peers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Clip identifier shared by every peer.
///
/// Generated once by the peer that creates the clip and carried verbatim in
/// replication messages, so the same logical clip has the same id everywhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClipId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ClipId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a decoded buffer owned by the audio engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct AudioHandle(pub Uuid);

impl AudioHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AudioHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Clip colour used by the UI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ColorTag {
    Orange,
    Blue,
    Purple,
    Green,
    Yellow,
    Pink,
}

impl ColorTag {
    pub const PALETTE: [ColorTag; 6] = [
        ColorTag::Orange,
        ColorTag::Blue,
        ColorTag::Purple,
        ColorTag::Green,
        ColorTag::Yellow,
        ColorTag::Pink,
    ];

    /// Pick a palette entry from the clip id (deterministic, so peers agree)
    pub fn for_clip(id: &ClipId) -> Self {
        let sum = id
            .as_str()
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        Self::PALETTE[sum as usize % Self::PALETTE.len()]
    }

    pub fn to_hex(&self) -> &'static str {
        match self {
            ColorTag::Orange => "#FB923C",
            ColorTag::Blue => "#60A5FA",
            ColorTag::Purple => "#C084FC",
            ColorTag::Green => "#4ADE80",
            ColorTag::Yellow => "#FACC15",
            ColorTag::Pink => "#F472B6",
        }
    }
}

/// A positioned, fixed-duration reference to decoded audio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clip {
    pub id: ClipId,
    pub name: String,
    pub audio: AudioHandle,
    duration_seconds: f64,
    start_seconds: f64,
    pub color: ColorTag,
}

impl Clip {
    pub fn new(id: ClipId, name: impl Into<String>, audio: AudioHandle, duration_seconds: f64) -> Self {
        let color = ColorTag::for_clip(&id);
        Self {
            id,
            name: name.into(),
            audio,
            duration_seconds: duration_seconds.max(0.0),
            start_seconds: 0.0,
            color,
        }
    }

    pub fn with_start(mut self, start_seconds: f64) -> Self {
        self.set_start(start_seconds);
        self
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn start_seconds(&self) -> f64 {
        self.start_seconds
    }

    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.duration_seconds
    }

    /// Negative and non-finite positions clamp to zero.
    pub(crate) fn set_start(&mut self, start_seconds: f64) {
        self.start_seconds = if start_seconds.is_finite() {
            start_seconds.max(0.0)
        } else {
            0.0
        };
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub clips: Vec<Clip>,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            clips: Vec::new(),
        }
    }

    pub fn clip(&self, clip_id: &ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| &c.id == clip_id)
    }

    pub fn contains_clip(&self, clip_id: &ClipId) -> bool {
        self.clip(clip_id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}
