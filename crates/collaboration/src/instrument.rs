//! Instrument kinds and their parameter sets.
//!
//! Instrument panels send their settings as a loose JSON object; this module
//! turns that into one closed union so the renderer dispatches with a single
//! match. Anything missing or unreadable falls back to the panel defaults.
use serde::{Deserialize, Serialize};
use timeline::ClipId;
use tracing::debug;

use crate::{NoteEvent, PeerMessage, Recording};

/// Pattern exports land on this track.
pub const PATTERN_TRACK: &str = "Drums";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Piano,
    Bass,
    Synth,
}

impl InstrumentKind {
    /// Name of the track an exported take is appended to.
    pub fn destination_track(&self) -> &'static str {
        match self {
            InstrumentKind::Piano | InstrumentKind::Synth => "Synth",
            InstrumentKind::Bass => "Bass",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "piano" => Some(InstrumentKind::Piano),
            "bass" => Some(InstrumentKind::Bass),
            "synth" | "synthesizer" => Some(InstrumentKind::Synth),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub frequency: f64,
    pub q: f64,
    pub kind: String,
}

/// Flat synthesizer panel settings as they travel on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SynthPanel {
    pub osc_type: String,
    pub osc_detune: f64,
    pub filter_freq: f64,
    pub filter_q: f64,
    pub filter_type: String,
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
    pub fm_index: f64,
    pub fm_ratio: f64,
    pub wavetable_pos: f64,
}

impl Default for SynthPanel {
    fn default() -> Self {
        Self {
            osc_type: "sawtooth".to_string(),
            osc_detune: 0.0,
            filter_freq: 2000.0,
            filter_q: 1.0,
            filter_type: "lowpass".to_string(),
            attack: 0.1,
            decay: 0.2,
            sustain: 0.5,
            release: 1.0,
            fm_index: 10.0,
            fm_ratio: 2.0,
            wavetable_pos: 0.0,
        }
    }
}

impl SynthPanel {
    fn envelope(&self) -> Envelope {
        Envelope {
            attack: self.attack,
            decay: self.decay,
            sustain: self.sustain,
            release: self.release,
        }
    }

    fn filter(&self) -> Filter {
        Filter {
            frequency: self.filter_freq,
            q: self.filter_q,
            kind: self.filter_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthVoice {
    Subtractive {
        osc_type: String,
        detune: f64,
        filter: Filter,
        envelope: Envelope,
    },
    Fm {
        osc_type: String,
        harmonicity: f64,
        modulation_index: f64,
        envelope: Envelope,
    },
    Wavetable {
        position: f64,
        filter: Filter,
        envelope: Envelope,
    },
    Granular {
        filter: Filter,
        envelope: Envelope,
    },
}

impl SynthVoice {
    /// Engine name used as `instrumentKind` on the wire.
    pub fn engine(&self) -> &'static str {
        match self {
            SynthVoice::Subtractive { .. } => "subtractive",
            SynthVoice::Fm { .. } => "fm",
            SynthVoice::Wavetable { .. } => "wavetable",
            SynthVoice::Granular { .. } => "granular",
        }
    }

    pub fn from_panel(engine: &str, panel: &SynthPanel) -> Self {
        let envelope = panel.envelope();
        match engine {
            "fm" => SynthVoice::Fm {
                osc_type: panel.osc_type.clone(),
                harmonicity: panel.fm_ratio,
                modulation_index: panel.fm_index,
                envelope,
            },
            "wavetable" => SynthVoice::Wavetable {
                position: panel.wavetable_pos,
                filter: panel.filter(),
                envelope,
            },
            "granular" => SynthVoice::Granular {
                filter: Filter {
                    frequency: panel.filter_freq,
                    q: panel.filter_q * 2.0,
                    kind: "bandpass".to_string(),
                },
                envelope: Envelope {
                    attack: envelope.attack * 0.5,
                    decay: envelope.decay * 0.3,
                    sustain: envelope.sustain * 0.7,
                    release: envelope.release * 2.0,
                },
            },
            _ => SynthVoice::Subtractive {
                osc_type: panel.osc_type.clone(),
                detune: panel.osc_detune,
                filter: panel.filter(),
                envelope,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BassStyle {
    Electric,
    Acoustic,
    Synth,
}

impl BassStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BassStyle::Electric => "electric",
            BassStyle::Acoustic => "acoustic",
            BassStyle::Synth => "synth",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "acoustic" => BassStyle::Acoustic,
            "synth" => BassStyle::Synth,
            _ => BassStyle::Electric,
        }
    }
}

/// Bass panel settings; every style reads the subset it needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BassParams {
    pub volume: f64,
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
    pub distortion: f64,
    pub brightness: f64,
    pub resonance: f64,
    pub dampening: f64,
    pub cutoff: f64,
    pub resonance_q: f64,
    pub osc_mix: f64,
}

impl Default for BassParams {
    fn default() -> Self {
        Self {
            volume: -6.0,
            attack: 0.01,
            decay: 0.3,
            sustain: 0.5,
            release: 1.2,
            distortion: 0.0,
            brightness: 0.5,
            resonance: 0.3,
            dampening: 0.2,
            cutoff: 800.0,
            resonance_q: 2.0,
            osc_mix: 0.5,
        }
    }
}

/// Fully typed settings for one instrument take.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentPatch {
    Piano,
    Synth(SynthVoice),
    Bass { style: BassStyle, params: BassParams },
}

impl InstrumentPatch {
    pub fn kind(&self) -> InstrumentKind {
        match self {
            InstrumentPatch::Piano => InstrumentKind::Piano,
            InstrumentPatch::Synth(_) => InstrumentKind::Synth,
            InstrumentPatch::Bass { .. } => InstrumentKind::Bass,
        }
    }

    /// Reads `instrumentKind`/`params` from a received take.
    pub fn from_recording(kind: InstrumentKind, recording: &Recording) -> Self {
        let tag = recording.instrument_kind.as_deref().unwrap_or_default();
        match kind {
            InstrumentKind::Piano => InstrumentPatch::Piano,
            InstrumentKind::Synth => {
                let panel: SynthPanel = read_params(recording.params.as_ref());
                InstrumentPatch::Synth(SynthVoice::from_panel(tag, &panel))
            }
            InstrumentKind::Bass => InstrumentPatch::Bass {
                style: BassStyle::parse(tag),
                params: read_params(recording.params.as_ref()),
            },
        }
    }

    /// `instrumentKind` and `params` to put on an outgoing take.
    pub fn to_wire(&self) -> (Option<String>, Option<serde_json::Value>) {
        match self {
            InstrumentPatch::Piano => (None, None),
            InstrumentPatch::Synth(voice) => (Some(voice.engine().to_string()), Some(voice_to_panel(voice))),
            InstrumentPatch::Bass { style, params } => (
                Some(style.as_str().to_string()),
                serde_json::to_value(params).ok(),
            ),
        }
    }

    pub fn into_message(self, recording: Vec<NoteEvent>, clip_id: ClipId) -> PeerMessage {
        let kind = self.kind();
        let (instrument_kind, params) = self.to_wire();
        PeerMessage::recording(
            kind,
            Recording {
                recording,
                clip_id,
                instrument_kind,
                params,
            },
        )
    }
}

fn read_params<T: for<'de> Deserialize<'de> + Default>(params: Option<&serde_json::Value>) -> T {
    match params {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            debug!("Unreadable instrument params, using defaults: {}", e);
            T::default()
        }),
        None => T::default(),
    }
}

fn voice_to_panel(voice: &SynthVoice) -> serde_json::Value {
    let mut panel = SynthPanel::default();
    let envelope = match voice {
        SynthVoice::Subtractive {
            osc_type,
            detune,
            filter,
            envelope,
        } => {
            panel.osc_type = osc_type.clone();
            panel.osc_detune = *detune;
            apply_filter(&mut panel, filter);
            *envelope
        }
        SynthVoice::Fm {
            osc_type,
            harmonicity,
            modulation_index,
            envelope,
        } => {
            panel.osc_type = osc_type.clone();
            panel.fm_ratio = *harmonicity;
            panel.fm_index = *modulation_index;
            *envelope
        }
        SynthVoice::Wavetable {
            position,
            filter,
            envelope,
        } => {
            panel.wavetable_pos = *position;
            apply_filter(&mut panel, filter);
            *envelope
        }
        SynthVoice::Granular { filter, envelope } => {
            panel.filter_freq = filter.frequency;
            panel.filter_q = filter.q / 2.0;
            Envelope {
                attack: envelope.attack / 0.5,
                decay: envelope.decay / 0.3,
                sustain: envelope.sustain / 0.7,
                release: envelope.release / 2.0,
            }
        }
    };
    panel.attack = envelope.attack;
    panel.decay = envelope.decay;
    panel.sustain = envelope.sustain;
    panel.release = envelope.release;
    serde_json::to_value(panel).unwrap_or(serde_json::Value::Null)
}

fn apply_filter(panel: &mut SynthPanel, filter: &Filter) {
    panel.filter_freq = filter.frequency;
    panel.filter_q = filter.q;
    panel.filter_type = filter.kind.clone();
}
