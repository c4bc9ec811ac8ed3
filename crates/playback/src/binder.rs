//! Keeps engine schedules in step with the clip positions in the store.
use std::collections::{HashMap, HashSet};
use timeline::{AudioHandle, ClipId, Mutation, TrackStore};
use tracing::{debug, warn};

use crate::{AudioGraph, ChannelId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BindingState {
    Unbound,
    Bound {
        audio: AudioHandle,
        channel: ChannelId,
        start_seconds: f64,
    },
}

impl BindingState {
    pub fn is_bound(&self) -> bool {
        matches!(self, BindingState::Bound { .. })
    }

    pub fn start_seconds(&self) -> Option<f64> {
        match self {
            BindingState::Bound { start_seconds, .. } => Some(*start_seconds),
            BindingState::Unbound => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    audio: AudioHandle,
    channel: ChannelId,
    start_seconds: f64,
}

/// Per-clip binding table.
///
/// A clip is bound at most once: every (re)bind unbinds first. Clips the
/// engine refused are remembered and retried on the next resync.
#[derive(Debug, Default)]
pub struct PlaybackBinder {
    bound: HashMap<ClipId, Binding>,
    deferred: HashSet<ClipId>,
}

impl PlaybackBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, clip_id: &ClipId) -> BindingState {
        match self.bound.get(clip_id) {
            Some(b) => BindingState::Bound {
                audio: b.audio,
                channel: b.channel,
                start_seconds: b.start_seconds,
            },
            None => BindingState::Unbound,
        }
    }

    pub fn is_deferred(&self, clip_id: &ClipId) -> bool {
        self.deferred.contains(clip_id)
    }

    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    /// Re-resolves `clip_id` against the store and binds it at its current start.
    ///
    /// A clip no longer in the store ends up unbound.
    pub fn resync(&mut self, store: &TrackStore, clip_id: &ClipId, graph: &mut AudioGraph) -> BindingState {
        self.release(clip_id, graph);

        let Some((track, clip)) = store.find_clip(clip_id) else {
            self.deferred.remove(clip_id);
            debug!("Clip {} not in store, left unbound", clip_id);
            return BindingState::Unbound;
        };

        let channel = graph.route(track.id);
        let start_seconds = clip.start_seconds();
        match graph.engine_mut().bind(clip.audio, channel, start_seconds) {
            Ok(()) => {
                self.deferred.remove(clip_id);
                let binding = Binding {
                    audio: clip.audio,
                    channel,
                    start_seconds,
                };
                self.bound.insert(clip_id.clone(), binding);
                self.state(clip_id)
            }
            Err(e) => {
                if e.is_transient() {
                    warn!("Deferring bind of clip {}: {}", clip_id, e);
                } else {
                    warn!("Engine refused clip {}: {}", clip_id, e);
                }
                self.deferred.insert(clip_id.clone());
                BindingState::Unbound
            }
        }
    }

    /// Drops the engine schedule for `clip_id`, if any.
    pub fn release(&mut self, clip_id: &ClipId, graph: &mut AudioGraph) {
        if let Some(binding) = self.bound.remove(clip_id) {
            if let Err(e) = graph.engine_mut().unbind(binding.audio) {
                warn!("Unbind of clip {} failed: {}", clip_id, e);
            }
        }
    }

    /// Refreshes bindings touched by `mutation`, then retries deferred clips.
    pub fn apply(&mut self, mutation: &Mutation, store: &TrackStore, graph: &mut AudioGraph) {
        for clip_id in mutation.affected_clips() {
            self.resync(store, &clip_id, graph);
        }
        if let Mutation::TrackRemoved { track_id, .. } = mutation {
            graph.release(*track_id);
        }
        self.retry_deferred(store, graph);
    }

    pub fn retry_deferred(&mut self, store: &TrackStore, graph: &mut AudioGraph) {
        if self.deferred.is_empty() {
            return;
        }
        let pending: Vec<ClipId> = self.deferred.iter().cloned().collect();
        for clip_id in pending {
            self.resync(store, &clip_id, graph);
        }
    }

    /// Rebuilds every binding from scratch, used after a history restore.
    pub fn rebind_all(&mut self, store: &TrackStore, graph: &mut AudioGraph) {
        let bound: Vec<ClipId> = self.bound.keys().cloned().collect();
        for clip_id in bound {
            self.release(&clip_id, graph);
        }
        self.deferred.clear();

        let live: Vec<_> = store.tracks().iter().map(|t| t.id).collect();
        graph.retain_tracks(&live);

        let clips: Vec<ClipId> = store.clips().map(|(_, c)| c.id.clone()).collect();
        for clip_id in clips {
            self.resync(store, &clip_id, graph);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioEngine, EngineError, Result};
    use std::sync::{Arc, Mutex};
    use timeline::Clip;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Bind(AudioHandle, f64),
        Unbind(AudioHandle),
    }

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
        refuse: Arc<Mutex<Option<EngineError>>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AudioEngine for Recorder {
        fn bind(&mut self, audio: AudioHandle, _channel: ChannelId, start: f64) -> Result<()> {
            if let Some(err) = self.refuse.lock().unwrap().clone() {
                return Err(err);
            }
            self.calls.lock().unwrap().push(Call::Bind(audio, start));
            Ok(())
        }

        fn unbind(&mut self, audio: AudioHandle) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Unbind(audio));
            Ok(())
        }

        fn start(&mut self, _offset: f64) -> Result<()> {
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn setup() -> (TrackStore, Recorder, AudioGraph, ClipId, AudioHandle) {
        let mut store = TrackStore::new();
        let audio = AudioHandle::new();
        let clip = Clip::new(ClipId::from("c1"), "Drums Pattern", audio, 2.0);
        store.add_clip_to_named("Drums", clip).unwrap();
        let recorder = Recorder::default();
        let graph = AudioGraph::new(Box::new(recorder.clone()));
        (store, recorder, graph, ClipId::from("c1"), audio)
    }

    #[test]
    fn test_resync_unbinds_before_rebinding() {
        let (mut store, recorder, mut graph, id, audio) = setup();
        let mut binder = PlaybackBinder::new();

        binder.resync(&store, &id, &mut graph);
        let track = store.track_by_name("Drums").unwrap().id;
        store.move_clip(&id, track, track, 3.0).unwrap();
        let state = binder.resync(&store, &id, &mut graph);

        assert_eq!(state.start_seconds(), Some(3.0));
        assert_eq!(
            recorder.calls(),
            vec![Call::Bind(audio, 0.0), Call::Unbind(audio), Call::Bind(audio, 3.0)]
        );
    }

    #[test]
    fn test_removed_clip_ends_unbound() {
        let (mut store, recorder, mut graph, id, audio) = setup();
        let mut binder = PlaybackBinder::new();
        binder.resync(&store, &id, &mut graph);

        let mutation = store.remove_clip(&id).unwrap();
        binder.apply(&mutation, &store, &mut graph);

        assert_eq!(binder.state(&id), BindingState::Unbound);
        assert_eq!(recorder.calls().last(), Some(&Call::Unbind(audio)));
    }

    #[test]
    fn test_refused_bind_is_deferred_and_retried() {
        let (store, recorder, mut graph, id, audio) = setup();
        let mut binder = PlaybackBinder::new();
        *recorder.refuse.lock().unwrap() = Some(EngineError::NotDecoded(audio));

        assert_eq!(binder.resync(&store, &id, &mut graph), BindingState::Unbound);
        assert!(binder.is_deferred(&id));

        *recorder.refuse.lock().unwrap() = None;
        binder.retry_deferred(&store, &mut graph);
        assert!(binder.state(&id).is_bound());
        assert!(!binder.is_deferred(&id));
    }

    #[test]
    fn test_rebind_all_matches_store() {
        let (mut store, _recorder, mut graph, id, _) = setup();
        let mut binder = PlaybackBinder::new();
        binder.resync(&store, &id, &mut graph);

        let snapshot = store.snapshot();
        let track = store.track_by_name("Drums").unwrap().id;
        store.move_clip(&id, track, track, 5.0).unwrap();
        binder.resync(&store, &id, &mut graph);

        store.restore(&snapshot);
        binder.rebind_all(&store, &mut graph);
        assert_eq!(binder.state(&id).start_seconds(), Some(0.0));
        assert_eq!(binder.bound_count(), 1);
    }
}
