use serde::{Deserialize, Serialize};

use crate::{Clip, ClipId, Snapshot, TimelineError, Track, TrackId};

/// Describes one applied change to the store.
///
/// Returned by every successful mutation so callers can resync playback and
/// record history without re-diffing the whole track list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mutation", rename_all = "snake_case")]
pub enum Mutation {
    TrackAdded {
        track_id: TrackId,
        name: String,
    },
    TrackRemoved {
        track_id: TrackId,
        clips: Vec<Clip>,
    },
    TrackRenamed {
        track_id: TrackId,
        name: String,
    },
    TracksReordered,
    ClipAdded {
        track_id: TrackId,
        clip_id: ClipId,
        created_track: bool,
    },
    ClipMoved {
        clip_id: ClipId,
        from: TrackId,
        to: TrackId,
        start_seconds: f64,
    },
    ClipRenamed {
        clip_id: ClipId,
        name: String,
    },
    ClipRemoved {
        track_id: TrackId,
        clip: Clip,
    },
}

impl Mutation {
    /// Track the change landed on, when there is a single one.
    pub fn track_id(&self) -> Option<TrackId> {
        match self {
            Mutation::TrackAdded { track_id, .. }
            | Mutation::TrackRemoved { track_id, .. }
            | Mutation::TrackRenamed { track_id, .. }
            | Mutation::ClipAdded { track_id, .. }
            | Mutation::ClipRemoved { track_id, .. } => Some(*track_id),
            Mutation::ClipMoved { to, .. } => Some(*to),
            Mutation::TracksReordered | Mutation::ClipRenamed { .. } => None,
        }
    }

    /// Clips whose engine binding must be refreshed (bound, rebound or released).
    pub fn affected_clips(&self) -> Vec<ClipId> {
        match self {
            Mutation::TrackRemoved { clips, .. } => clips.iter().map(|c| c.id.clone()).collect(),
            Mutation::ClipAdded { clip_id, .. } | Mutation::ClipMoved { clip_id, .. } => {
                vec![clip_id.clone()]
            }
            Mutation::ClipRemoved { clip, .. } => vec![clip.id.clone()],
            Mutation::TrackAdded { .. }
            | Mutation::TrackRenamed { .. }
            | Mutation::TracksReordered
            | Mutation::ClipRenamed { .. } => Vec::new(),
        }
    }
}

/// The canonical, ordered collection of tracks and their clips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackStore {
    tracks: Vec<Track>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, track_id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == track_id)
    }

    /// First track (in display order) carrying `name`.
    pub fn track_by_name(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.name == name)
    }

    pub fn find_clip(&self, clip_id: &ClipId) -> Option<(&Track, &Clip)> {
        self.tracks
            .iter()
            .find_map(|t| t.clip(clip_id).map(|c| (t, c)))
    }

    pub fn contains_clip(&self, clip_id: &ClipId) -> bool {
        self.find_clip(clip_id).is_some()
    }

    pub fn clips(&self) -> impl Iterator<Item = (&Track, &Clip)> + '_ {
        self.tracks
            .iter()
            .flat_map(|t| t.clips.iter().map(move |c| (t, c)))
    }

    pub fn clip_count(&self) -> usize {
        self.tracks.iter().map(|t| t.clips.len()).sum()
    }

    /// End of the last clip on the timeline, in seconds.
    pub fn end_seconds(&self) -> f64 {
        self.clips()
            .map(|(_, c)| c.end_seconds())
            .fold(0.0, f64::max)
    }

    /// `base`, or `base 2`, `base 3`, ... whichever is free first.
    pub fn unique_track_name(&self, base: &str) -> String {
        if self.track_by_name(base).is_none() {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base} {n}");
            if self.track_by_name(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn add_track(&mut self, name: Option<&str>) -> Mutation {
        let base = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Track {}", self.tracks.len() + 1),
        };
        let track = Track::new(self.unique_track_name(&base));
        let mutation = Mutation::TrackAdded {
            track_id: track.id,
            name: track.name.clone(),
        };
        self.tracks.push(track);
        mutation
    }

    pub fn remove_track(&mut self, track_id: TrackId) -> Result<Mutation, TimelineError> {
        let idx = self.track_index(track_id)?;
        let track = self.tracks.remove(idx);
        Ok(Mutation::TrackRemoved {
            track_id,
            clips: track.clips,
        })
    }

    pub fn rename_track(&mut self, track_id: TrackId, name: &str) -> Result<Mutation, TimelineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TimelineError::InvalidName);
        }
        let idx = self.track_index(track_id)?;
        self.tracks[idx].name = name.to_string();
        Ok(Mutation::TrackRenamed {
            track_id,
            name: name.to_string(),
        })
    }

    /// Appends `clip` to an existing track.
    pub fn add_clip(&mut self, track_id: TrackId, clip: Clip) -> Result<Mutation, TimelineError> {
        if self.contains_clip(&clip.id) {
            return Err(TimelineError::ClipExists(clip.id));
        }
        let idx = self.track_index(track_id)?;
        let clip_id = clip.id.clone();
        self.tracks[idx].clips.push(clip);
        Ok(Mutation::ClipAdded {
            track_id,
            clip_id,
            created_track: false,
        })
    }

    /// Appends `clip` to the track named `track_name`, creating it when absent.
    ///
    /// Used for instrument exports and replicated clips, which may arrive
    /// before (or after the removal of) their destination track.
    pub fn add_clip_to_named(&mut self, track_name: &str, clip: Clip) -> Result<Mutation, TimelineError> {
        if self.contains_clip(&clip.id) {
            return Err(TimelineError::ClipExists(clip.id));
        }
        let (idx, created_track) = match self.tracks.iter().position(|t| t.name == track_name) {
            Some(idx) => (idx, false),
            None => {
                self.tracks.push(Track::new(track_name));
                (self.tracks.len() - 1, true)
            }
        };
        let track_id = self.tracks[idx].id;
        let clip_id = clip.id.clone();
        self.tracks[idx].clips.push(clip);
        Ok(Mutation::ClipAdded {
            track_id,
            clip_id,
            created_track,
        })
    }

    /// Moves a clip to `to` at `start_seconds` (clamped to >= 0).
    ///
    /// Both tracks are validated before anything changes, so a failed move
    /// leaves the store untouched. Within one track the clip keeps its slot.
    pub fn move_clip(
        &mut self,
        clip_id: &ClipId,
        from: TrackId,
        to: TrackId,
        start_seconds: f64,
    ) -> Result<Mutation, TimelineError> {
        let from_idx = self.track_index(from)?;
        let to_idx = self.track_index(to)?;
        let clip_idx = self.tracks[from_idx]
            .clips
            .iter()
            .position(|c| &c.id == clip_id)
            .ok_or_else(|| TimelineError::ClipNotFound(clip_id.clone()))?;

        let start = if from_idx == to_idx {
            let clip = &mut self.tracks[from_idx].clips[clip_idx];
            clip.set_start(start_seconds);
            clip.start_seconds()
        } else {
            let mut clip = self.tracks[from_idx].clips.remove(clip_idx);
            clip.set_start(start_seconds);
            let start = clip.start_seconds();
            self.tracks[to_idx].clips.push(clip);
            start
        };

        Ok(Mutation::ClipMoved {
            clip_id: clip_id.clone(),
            from,
            to,
            start_seconds: start,
        })
    }

    /// Moves a clip, wherever it currently sits, onto the first track named
    /// `track_name` at `start_seconds`.
    pub fn move_clip_in_named(
        &mut self,
        track_name: &str,
        clip_id: &ClipId,
        start_seconds: f64,
    ) -> Result<Mutation, TimelineError> {
        let to = self
            .track_by_name(track_name)
            .ok_or_else(|| TimelineError::TrackNameNotFound(track_name.to_string()))?
            .id;
        let from = self
            .find_clip(clip_id)
            .ok_or_else(|| TimelineError::ClipNotFound(clip_id.clone()))?
            .0
            .id;
        self.move_clip(clip_id, from, to, start_seconds)
    }

    pub fn rename_clip(&mut self, clip_id: &ClipId, name: &str) -> Result<Mutation, TimelineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TimelineError::InvalidName);
        }
        let clip = self
            .tracks
            .iter_mut()
            .find_map(|t| t.clips.iter_mut().find(|c| &c.id == clip_id))
            .ok_or_else(|| TimelineError::ClipNotFound(clip_id.clone()))?;
        clip.name = name.to_string();
        Ok(Mutation::ClipRenamed {
            clip_id: clip_id.clone(),
            name: name.to_string(),
        })
    }

    pub fn remove_clip(&mut self, clip_id: &ClipId) -> Result<Mutation, TimelineError> {
        for track in self.tracks.iter_mut() {
            if let Some(idx) = track.clips.iter().position(|c| &c.id == clip_id) {
                let clip = track.clips.remove(idx);
                return Ok(Mutation::ClipRemoved {
                    track_id: track.id,
                    clip,
                });
            }
        }
        Err(TimelineError::ClipNotFound(clip_id.clone()))
    }

    /// Replaces the display order. `order` must be a permutation of the current ids.
    pub fn reorder_tracks(&mut self, order: &[TrackId]) -> Result<Mutation, TimelineError> {
        if order.len() != self.tracks.len() {
            return Err(TimelineError::InvalidOrder(format!(
                "expected {} tracks, got {}",
                self.tracks.len(),
                order.len()
            )));
        }
        let mut remaining = self.tracks.clone();
        let mut reordered = Vec::with_capacity(order.len());
        for track_id in order {
            let idx = remaining
                .iter()
                .position(|t| t.id == *track_id)
                .ok_or(TimelineError::TrackNotFound(*track_id))?;
            reordered.push(remaining.remove(idx));
        }
        self.tracks = reordered;
        Ok(Mutation::TracksReordered)
    }

    /// Moves one track to `index` (clamped to the end).
    pub fn move_track(&mut self, track_id: TrackId, index: usize) -> Result<Mutation, TimelineError> {
        let current = self.track_index(track_id)?;
        let track = self.tracks.remove(current);
        let target = index.min(self.tracks.len());
        self.tracks.insert(target, track);
        Ok(Mutation::TracksReordered)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.tracks)
    }

    /// Replaces the whole content with `snapshot`.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.tracks = snapshot.tracks().to_vec();
    }

    fn track_index(&self, track_id: TrackId) -> Result<usize, TimelineError> {
        self.tracks
            .iter()
            .position(|t| t.id == track_id)
            .ok_or(TimelineError::TrackNotFound(track_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AudioHandle;

    fn clip(id: &str, start: f64, duration: f64) -> Clip {
        Clip::new(ClipId::from(id), id, AudioHandle::new(), duration).with_start(start)
    }

    fn track_id(mutation: Mutation) -> TrackId {
        match mutation {
            Mutation::TrackAdded { track_id, .. } => track_id,
            other => panic!("unexpected mutation {other:?}"),
        }
    }

    #[test]
    fn test_add_track_disambiguates_names() {
        let mut store = TrackStore::new();
        store.add_track(Some("Bass"));
        store.add_track(Some("Bass"));
        store.add_track(Some("Bass"));
        let names: Vec<_> = store.tracks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Bass", "Bass 2", "Bass 3"]);
    }

    #[test]
    fn test_add_track_default_name() {
        let mut store = TrackStore::new();
        store.add_track(None);
        store.add_track(Some("   "));
        let names: Vec<_> = store.tracks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Track 1", "Track 2"]);
    }

    #[test]
    fn test_move_clip_across_tracks() {
        let mut store = TrackStore::new();
        let drums = track_id(store.add_track(Some("Drums")));
        let synth = track_id(store.add_track(Some("Synth")));
        store.add_clip(drums, clip("A", 0.0, 2.0)).unwrap();
        store.add_clip(synth, clip("B", 5.0, 1.0)).unwrap();

        store.move_clip(&ClipId::from("B"), synth, drums, 3.0).unwrap();

        let drums_track = store.track(drums).unwrap();
        assert_eq!(drums_track.clips.len(), 2);
        assert!(drums_track.contains_clip(&ClipId::from("A")));
        assert_eq!(
            drums_track.clip(&ClipId::from("B")).unwrap().start_seconds(),
            3.0
        );
        assert!(store.track(synth).unwrap().is_empty());
    }

    #[test]
    fn test_move_clip_clamps_negative_start() {
        let mut store = TrackStore::new();
        let t = track_id(store.add_track(Some("Drums")));
        store.add_clip(t, clip("A", 4.0, 2.0)).unwrap();
        for start in [-1.0, 2.5, -1000.0, f64::NEG_INFINITY] {
            store.move_clip(&ClipId::from("A"), t, t, start).unwrap();
            assert!(store.find_clip(&ClipId::from("A")).unwrap().1.start_seconds() >= 0.0);
        }
    }

    #[test]
    fn test_move_missing_clip_is_rejected_without_change() {
        let mut store = TrackStore::new();
        let a = track_id(store.add_track(Some("A")));
        let b = track_id(store.add_track(Some("B")));
        store.add_clip(b, clip("x", 1.0, 1.0)).unwrap();
        let before = store.clone();

        let result = store.move_clip(&ClipId::from("x"), a, b, 2.0);
        assert!(matches!(result, Err(TimelineError::ClipNotFound(_))));
        assert_eq!(store, before);

        let result = store.move_clip(&ClipId::from("x"), b, TrackId::new(), 2.0);
        assert!(matches!(result, Err(TimelineError::TrackNotFound(_))));
        assert_eq!(store, before);
    }

    #[test]
    fn test_add_clip_to_named_creates_track_once() {
        let mut store = TrackStore::new();
        let first = store.add_clip_to_named("Drums", clip("p1", 0.0, 2.0)).unwrap();
        assert!(matches!(first, Mutation::ClipAdded { created_track: true, .. }));
        let second = store.add_clip_to_named("Drums", clip("p2", 0.0, 2.0)).unwrap();
        assert!(matches!(second, Mutation::ClipAdded { created_track: false, .. }));
        assert_eq!(store.tracks().len(), 1);
        assert_eq!(store.clip_count(), 2);
    }

    #[test]
    fn test_duplicate_clip_id_is_rejected() {
        let mut store = TrackStore::new();
        store.add_clip_to_named("Drums", clip("p1", 0.0, 2.0)).unwrap();
        let again = store.add_clip_to_named("Drums", clip("p1", 0.0, 2.0));
        assert!(matches!(again, Err(TimelineError::ClipExists(_))));
        let elsewhere = store.add_clip_to_named("Synth", clip("p1", 0.0, 2.0));
        assert!(matches!(elsewhere, Err(TimelineError::ClipExists(_))));
        assert_eq!(store.clip_count(), 1);
        assert_eq!(store.tracks().len(), 1);
    }

    #[test]
    fn test_rename_track_rejects_blank() {
        let mut store = TrackStore::new();
        let t = track_id(store.add_track(Some("Drums")));
        assert!(matches!(store.rename_track(t, "  "), Err(TimelineError::InvalidName)));
        store.rename_track(t, " Beats ").unwrap();
        assert_eq!(store.track(t).unwrap().name, "Beats");
    }

    #[test]
    fn test_remove_track_returns_clips() {
        let mut store = TrackStore::new();
        let t = track_id(store.add_track(Some("Drums")));
        store.add_clip(t, clip("A", 0.0, 1.0)).unwrap();
        let mutation = store.remove_track(t).unwrap();
        assert_eq!(mutation.affected_clips(), vec![ClipId::from("A")]);
        assert!(store.tracks().is_empty());
        assert!(store.remove_track(t).is_err());
    }

    #[test]
    fn test_reorder_tracks_keeps_contents() {
        let mut store = TrackStore::new();
        let a = track_id(store.add_track(Some("A")));
        let b = track_id(store.add_track(Some("B")));
        let c = track_id(store.add_track(Some("C")));
        store.add_clip(b, clip("x", 1.0, 1.0)).unwrap();
        let before_b = store.track(b).unwrap().clone();

        store.reorder_tracks(&[c, a, b]).unwrap();
        let order: Vec<_> = store.tracks().iter().map(|t| t.id).collect();
        assert_eq!(order, vec![c, a, b]);
        assert_eq!(store.track(b).unwrap(), &before_b);

        assert!(store.reorder_tracks(&[a, b]).is_err());
        assert!(store.reorder_tracks(&[a, a, b]).is_err());
        let order: Vec<_> = store.tracks().iter().map(|t| t.id).collect();
        assert_eq!(order, vec![c, a, b]);
    }

    #[test]
    fn test_move_track_to_index() {
        let mut store = TrackStore::new();
        let a = track_id(store.add_track(Some("A")));
        let b = track_id(store.add_track(Some("B")));
        store.move_track(a, 10).unwrap();
        let order: Vec<_> = store.tracks().iter().map(|t| t.id).collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn test_move_in_named_track_follows_clip_across_tracks() {
        let mut store = TrackStore::new();
        let drums = track_id(store.add_track(Some("Drums")));
        store.add_clip_to_named("Synth", clip("x", 1.0, 1.0)).unwrap();
        let before = store.clone();
        assert!(store
            .move_clip_in_named("Nope", &ClipId::from("x"), 4.5)
            .is_err());
        assert!(store
            .move_clip_in_named("Drums", &ClipId::from("missing"), 4.5)
            .is_err());
        assert_eq!(store, before);

        let mutation = store
            .move_clip_in_named("Drums", &ClipId::from("x"), 4.5)
            .unwrap();
        assert!(matches!(mutation, Mutation::ClipMoved { to, .. } if to == drums));
        let (track, moved) = store.find_clip(&ClipId::from("x")).unwrap();
        assert_eq!(track.name, "Drums");
        assert_eq!(moved.start_seconds(), 4.5);
        assert!(store.track_by_name("Synth").unwrap().is_empty());

        store
            .move_clip_in_named("Drums", &ClipId::from("x"), 2.0)
            .unwrap();
        assert_eq!(store.find_clip(&ClipId::from("x")).unwrap().1.start_seconds(), 2.0);
    }

    #[test]
    fn test_end_seconds() {
        let mut store = TrackStore::new();
        assert_eq!(store.end_seconds(), 0.0);
        store.add_clip_to_named("A", clip("x", 1.0, 2.0)).unwrap();
        store.add_clip_to_named("B", clip("y", 5.0, 0.5)).unwrap();
        assert_eq!(store.end_seconds(), 5.5);
    }
}
