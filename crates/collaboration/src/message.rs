//! JSON messages exchanged between peers, one object per logical event.
use serde::{Deserialize, Serialize};
use timeline::ClipId;

use crate::{InstrumentKind, LamportClock, PeerId, Result, Stamp};

/// One recorded note; times are seconds from the start of the take.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub midi: u8,
    pub time: f64,
    pub duration: f64,
    #[serde(default = "default_velocity")]
    pub velocity: f64,
}

fn default_velocity() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub recording: Vec<NoteEvent>,
    pub clip_id: ClipId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PeerMessage {
    #[serde(rename = "clipMove", rename_all = "camelCase")]
    ClipMove {
        track_name: String,
        clip_id: ClipId,
        /// Seconds, despite the name.
        left: f64,
    },

    #[serde(rename = "sequencerPattern", rename_all = "camelCase")]
    SequencerPattern { pattern: Vec<Vec<u8>>, clip_id: ClipId },

    #[serde(rename = "pianoRecording")]
    PianoRecording(Recording),

    #[serde(rename = "bassRecording")]
    BassRecording(Recording),

    #[serde(rename = "synthRecording")]
    SynthRecording(Recording),
}

impl PeerMessage {
    pub fn recording(kind: InstrumentKind, recording: Recording) -> Self {
        match kind {
            InstrumentKind::Piano => PeerMessage::PianoRecording(recording),
            InstrumentKind::Bass => PeerMessage::BassRecording(recording),
            InstrumentKind::Synth => PeerMessage::SynthRecording(recording),
        }
    }

    pub fn clip_id(&self) -> &ClipId {
        match self {
            PeerMessage::ClipMove { clip_id, .. } | PeerMessage::SequencerPattern { clip_id, .. } => clip_id,
            PeerMessage::PianoRecording(r) | PeerMessage::BassRecording(r) | PeerMessage::SynthRecording(r) => {
                &r.clip_id
            }
        }
    }

    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::ClipMove { .. } => "clipMove",
            PeerMessage::SequencerPattern { .. } => "sequencerPattern",
            PeerMessage::PianoRecording(_) => "pianoRecording",
            PeerMessage::BassRecording(_) => "bassRecording",
            PeerMessage::SynthRecording(_) => "synthRecording",
        }
    }

    pub fn as_recording(&self) -> Option<(InstrumentKind, &Recording)> {
        match self {
            PeerMessage::PianoRecording(r) => Some((InstrumentKind::Piano, r)),
            PeerMessage::BassRecording(r) => Some((InstrumentKind::Bass, r)),
            PeerMessage::SynthRecording(r) => Some((InstrumentKind::Synth, r)),
            _ => None,
        }
    }
}

/// A message plus the optional ordering fields newer peers attach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(flatten)]
    pub message: PeerMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<PeerId>,
}

impl WireMessage {
    pub fn unstamped(message: PeerMessage) -> Self {
        Self {
            message,
            clock: None,
            origin: None,
        }
    }

    pub fn stamped(message: PeerMessage, stamp: Stamp) -> Self {
        Self {
            message,
            clock: Some(stamp.clock.0),
            origin: Some(stamp.origin),
        }
    }

    /// Present only when both clock and origin were sent.
    pub fn stamp(&self) -> Option<Stamp> {
        match (self.clock, self.origin) {
            (Some(clock), Some(origin)) => Some(Stamp {
                clock: LamportClock(clock),
                origin,
            }),
            _ => None,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clip_move_wire_shape() {
        let wire = WireMessage::unstamped(PeerMessage::ClipMove {
            track_name: "Drums".to_string(),
            clip_id: ClipId::from("x"),
            left: 4.5,
        });
        let value: serde_json::Value = serde_json::from_str(&wire.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "clipMove", "trackName": "Drums", "clipId": "x", "left": 4.5})
        );
    }

    #[test]
    fn test_decode_recording_without_optional_fields() {
        let text = r#"{"type":"bassRecording","recording":[{"midi":40,"time":0.0,"duration":0.5,"velocity":0.8}],"clipId":"b1"}"#;
        let wire = WireMessage::decode(text).unwrap();
        let (kind, recording) = wire.message.as_recording().unwrap();
        assert_eq!(kind, InstrumentKind::Bass);
        assert_eq!(recording.recording.len(), 1);
        assert!(recording.params.is_none());
        assert!(wire.stamp().is_none());
    }

    #[test]
    fn test_stamp_survives_encoding() {
        let origin = PeerId::new();
        let stamp = Stamp {
            clock: LamportClock(12),
            origin,
        };
        let pattern = vec![vec![1, 0, 0, 0]; 4];
        let wire = WireMessage::stamped(
            PeerMessage::SequencerPattern {
                pattern,
                clip_id: ClipId::from("p"),
            },
            stamp,
        );
        let back = WireMessage::decode(&wire.encode().unwrap()).unwrap();
        assert_eq!(back.stamp(), Some(stamp));
        assert_eq!(back.message.kind(), "sequencerPattern");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(WireMessage::decode(r#"{"type":"chat","text":"hi"}"#).is_err());
        assert!(WireMessage::decode("not json").is_err());
    }
}
