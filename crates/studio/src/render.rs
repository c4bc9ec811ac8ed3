//! Contract with the instrument renderers that turn patterns and note takes
//! into decoded audio, plus a silent renderer for headless peers.
use collaboration::{InstrumentPatch, NoteEvent, PeerMessage, PATTERN_TRACK};
use futures::future::{self, BoxFuture, FutureExt};
use playback::DecodedAudio;
use timeline::AudioHandle;

/// One 4/4 bar at 120 BPM.
pub const PATTERN_SECONDS: f64 = 2.0;

/// Release tail appended after the last note of a take.
pub const RECORDING_TAIL_SECONDS: f64 = 0.5;

pub const PATTERN_ROWS: usize = 4;
pub const PATTERN_STEPS: usize = 16;

pub fn recording_duration(notes: &[NoteEvent]) -> f64 {
    notes
        .iter()
        .map(|n| n.time + n.duration)
        .fold(0.0, f64::max)
        + RECORDING_TAIL_SECONDS
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderRequest {
    Pattern { pattern: Vec<Vec<u8>> },
    Recording { patch: InstrumentPatch, notes: Vec<NoteEvent> },
}

impl RenderRequest {
    /// Request for a received export; `None` for messages that carry no audio.
    pub fn from_message(message: &PeerMessage) -> Option<Self> {
        if let PeerMessage::SequencerPattern { pattern, .. } = message {
            return Some(RenderRequest::Pattern {
                pattern: pattern.clone(),
            });
        }
        let (kind, recording) = message.as_recording()?;
        Some(RenderRequest::Recording {
            patch: InstrumentPatch::from_recording(kind, recording),
            notes: recording.recording.clone(),
        })
    }

    pub fn destination_track(&self) -> &'static str {
        match self {
            RenderRequest::Pattern { .. } => PATTERN_TRACK,
            RenderRequest::Recording { patch, .. } => patch.kind().destination_track(),
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        match self {
            RenderRequest::Pattern { .. } => PATTERN_SECONDS,
            RenderRequest::Recording { notes, .. } => recording_duration(notes),
        }
    }
}

pub trait InstrumentRenderer: Send + Sync {
    fn render(&self, request: RenderRequest) -> BoxFuture<'static, playback::Result<DecodedAudio>>;
}

/// Produces a fresh handle with the nominal duration and no samples.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentRenderer;

impl InstrumentRenderer for SilentRenderer {
    fn render(&self, request: RenderRequest) -> BoxFuture<'static, playback::Result<DecodedAudio>> {
        future::ready(Ok(DecodedAudio {
            handle: AudioHandle::new(),
            duration_seconds: request.duration_seconds(),
        }))
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collaboration::{InstrumentKind, Recording};
    use timeline::ClipId;

    fn note(time: f64, duration: f64) -> NoteEvent {
        NoteEvent {
            midi: 60,
            time,
            duration,
            velocity: 1.0,
        }
    }

    #[test]
    fn test_recording_duration_uses_latest_note_end() {
        let notes = [note(0.0, 1.0), note(2.0, 0.25), note(1.0, 0.5)];
        assert_eq!(recording_duration(&notes), 2.75);
        assert_eq!(recording_duration(&[]), 0.5);
    }

    #[test]
    fn test_request_from_bass_take() {
        let message = PeerMessage::recording(
            InstrumentKind::Bass,
            Recording {
                recording: vec![note(0.0, 1.5)],
                clip_id: ClipId::from("b"),
                instrument_kind: Some("synth".to_string()),
                params: None,
            },
        );
        let request = RenderRequest::from_message(&message).unwrap();
        assert_eq!(request.destination_track(), "Bass");
        assert_eq!(request.duration_seconds(), 2.0);

        let move_message = PeerMessage::ClipMove {
            track_name: "Bass".to_string(),
            clip_id: ClipId::from("b"),
            left: 1.0,
        };
        assert!(RenderRequest::from_message(&move_message).is_none());
    }

    #[test]
    fn test_silent_renderer_reports_nominal_length() {
        let rendered = tokio_test::block_on(SilentRenderer.render(RenderRequest::Pattern {
            pattern: vec![vec![0; PATTERN_STEPS]; PATTERN_ROWS],
        }))
        .unwrap();
        assert_eq!(rendered.duration_seconds, PATTERN_SECONDS);
    }
}
