//! Line-oriented command console driving a session from stdin.
use collaboration::{BassParams, BassStyle, InstrumentKind, InstrumentPatch, NoteEvent, SynthPanel, SynthVoice};
use studio::{Session, PATTERN_ROWS, PATTERN_STEPS};
use timeline::{ClipId, TrackId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::{Event, EventSender};

const NOTE_SPACING_SECONDS: f64 = 0.5;
const NOTE_LENGTH_SECONDS: f64 = 0.4;
const NOTE_VELOCITY: f64 = 0.8;

pub const HELP: &str = "commands: tracks | add-track [name] | rename-track <track> <name> | \
remove-track <track> | move <clip> <from> <to> <seconds> | pattern | \
record <piano|bass|synth> <midi>... | undo | redo | play | stop | zoom <pps> | help";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Tracks,
    AddTrack(Option<String>),
    RenameTrack { track: String, name: String },
    RemoveTrack(String),
    Move { clip: ClipId, from: String, to: String, seconds: f64 },
    Pattern,
    Record { kind: InstrumentKind, notes: Vec<u8> },
    Undo,
    Redo,
    Play,
    Stop,
    Zoom(f64),
    Help,
}

impl Command {
    /// Parses one console line. Tracks are referenced by name or 1-based position.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err("empty command".to_string());
        };
        let rest: Vec<&str> = words.collect();

        let command = match (verb, rest.as_slice()) {
            ("tracks", []) => Command::Tracks,
            ("add-track", []) => Command::AddTrack(None),
            ("add-track", name) => Command::AddTrack(Some(name.join(" "))),
            ("rename-track", [track, name @ ..]) if !name.is_empty() => Command::RenameTrack {
                track: track.to_string(),
                name: name.join(" "),
            },
            ("remove-track", [track]) => Command::RemoveTrack(track.to_string()),
            ("move", [clip, from, to, seconds]) => Command::Move {
                clip: ClipId::from(*clip),
                from: from.to_string(),
                to: to.to_string(),
                seconds: seconds
                    .parse()
                    .map_err(|_| format!("invalid seconds: {}", seconds))?,
            },
            ("pattern", []) => Command::Pattern,
            ("record", [kind, notes @ ..]) if !notes.is_empty() => Command::Record {
                kind: InstrumentKind::parse(kind).ok_or_else(|| format!("unknown instrument: {}", kind))?,
                notes: notes
                    .iter()
                    .map(|n| n.parse::<u8>().map_err(|_| format!("invalid midi note: {}", n)))
                    .collect::<Result<_, _>>()?,
            },
            ("undo", []) => Command::Undo,
            ("redo", []) => Command::Redo,
            ("play", []) => Command::Play,
            ("stop", []) => Command::Stop,
            ("zoom", [pps]) => Command::Zoom(pps.parse().map_err(|_| format!("invalid zoom: {}", pps))?),
            ("help", []) => Command::Help,
            _ => return Err(format!("unrecognized command: {}", line.trim())),
        };
        Ok(command)
    }
}

/// Forwards stdin lines into the event queue until EOF.
pub async fn read_stdin(events: EventSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        if events.send(Event::Command(line)).is_err() {
            break;
        }
    }
    debug!("Console input closed");
}

/// Runs one command and returns the reply to print.
pub fn execute(session: &mut Session, command: Command) -> String {
    match command {
        Command::Tracks => list_tracks(session),
        Command::AddTrack(name) => match session.add_track(name.as_deref()) {
            Some(id) => format!("added {}", track_label(session, id)),
            None => "track not added".to_string(),
        },
        Command::RenameTrack { track, name } => {
            with_track(session, &track, |s, id| s.rename_track(id, &name), "renamed")
        }
        Command::RemoveTrack(track) => with_track(session, &track, |s, id| s.remove_track(id), "removed"),
        Command::Move { clip, from, to, seconds } => {
            let (Some(from), Some(to)) = (resolve_track(session, &from), resolve_track(session, &to)) else {
                return "unknown track".to_string();
            };
            if session.move_clip(&clip, from, to, seconds) {
                format!("moved {} to {:.2}s", clip, seconds.max(0.0))
            } else {
                format!("move of {} rejected", clip)
            }
        }
        Command::Pattern => {
            let clip_id = session.export_pattern(default_pattern());
            format!("rendering pattern {}", clip_id)
        }
        Command::Record { kind, notes } => {
            let clip_id = session.export(take(&notes), default_patch(kind));
            format!("rendering {:?} take {}", kind, clip_id)
        }
        Command::Undo => outcome(session.undo(), "undone", "nothing to undo"),
        Command::Redo => outcome(session.redo(), "redone", "nothing to redo"),
        Command::Play => outcome(session.play(), "playing", "engine refused to start"),
        Command::Stop => outcome(session.stop(), "stopped", "engine refused to stop"),
        Command::Zoom(pps) => format!("zoom {:.0} px/s", session.set_zoom(pps)),
        Command::Help => HELP.to_string(),
    }
}

fn outcome(ok: bool, done: &str, failed: &str) -> String {
    let reply = if ok { done } else { failed };
    reply.to_string()
}

fn with_track(
    session: &mut Session,
    reference: &str,
    edit: impl FnOnce(&mut Session, TrackId) -> bool,
    done: &str,
) -> String {
    match resolve_track(session, reference) {
        Some(id) if edit(session, id) => format!("{} {}", done, reference),
        Some(_) => format!("{} unchanged", reference),
        None => format!("unknown track: {}", reference),
    }
}

fn resolve_track(session: &Session, reference: &str) -> Option<TrackId> {
    let store = session.store();
    if let Some(track) = store.track_by_name(reference) {
        return Some(track.id);
    }
    let position: usize = reference.parse().ok()?;
    store.tracks().get(position.checked_sub(1)?).map(|t| t.id)
}

fn track_label(session: &Session, id: TrackId) -> String {
    session
        .store()
        .track(id)
        .map(|t| t.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn list_tracks(session: &Session) -> String {
    let tracks = session.store().tracks();
    if tracks.is_empty() {
        return "no tracks".to_string();
    }
    let mut out = Vec::new();
    for (i, track) in tracks.iter().enumerate() {
        out.push(format!("{}. {} ({} clips)", i + 1, track.name, track.clips.len()));
        for clip in &track.clips {
            let bound = if session.binder().state(&clip.id).is_bound() { "" } else { " unbound" };
            out.push(format!(
                "   {} \"{}\" {:.2}s-{:.2}s{}",
                clip.id,
                clip.name,
                clip.start_seconds(),
                clip.end_seconds(),
                bound
            ));
        }
    }
    out.join("\n")
}

/// Four on the floor with offbeat hats.
fn default_pattern() -> Vec<Vec<u8>> {
    let mut pattern = vec![vec![0; PATTERN_STEPS]; PATTERN_ROWS];
    for step in 0..PATTERN_STEPS {
        pattern[0][step] = u8::from(step % 4 == 0);
        pattern[1][step] = u8::from(step % 8 == 4);
        pattern[2][step] = u8::from(step % 4 == 2);
    }
    pattern
}

fn take(notes: &[u8]) -> Vec<NoteEvent> {
    notes
        .iter()
        .enumerate()
        .map(|(i, &midi)| NoteEvent {
            midi,
            time: i as f64 * NOTE_SPACING_SECONDS,
            duration: NOTE_LENGTH_SECONDS,
            velocity: NOTE_VELOCITY,
        })
        .collect()
}

fn default_patch(kind: InstrumentKind) -> InstrumentPatch {
    match kind {
        InstrumentKind::Piano => InstrumentPatch::Piano,
        InstrumentKind::Synth => InstrumentPatch::Synth(SynthVoice::from_panel("subtractive", &SynthPanel::default())),
        InstrumentKind::Bass => InstrumentPatch::Bass {
            style: BassStyle::Electric,
            params: BassParams::default(),
        },
    }
}
