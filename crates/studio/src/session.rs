//! One peer's editing session.
//!
//! Every local edit runs store -> binder -> history -> replication in that
//! order. Remote edits take the same store and binder path but are never
//! recorded in history and never re-broadcast.
use collaboration::{ConnectionId, InstrumentPatch, NoteEvent, PeerConnection, PeerId, PeerMessage, Replicator};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use playback::{AudioEngine, AudioGraph, AudioSource, DecodedAudio, Decoder, PlaybackBinder, Transport, TransportState};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use timeline::{Clip, ClipId, HistoryStack, Mutation, Snapshot, TimelineError, TrackId, TrackStore, Zoom};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::{DragController, InstrumentRenderer, RenderRequest, StudioConfig, Viewport};

/// Empty space kept after the last clip, in seconds.
const TIMELINE_TAIL_SECONDS: f64 = 4.0;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Mutated { mutation: Mutation, origin: Origin },
    HistoryRestored { index: usize },
}

enum Destination {
    Named(String),
    /// Falls back to the name if the track is gone by the time decoding ends.
    Track { id: TrackId, name: String },
}

struct Pending {
    clip_id: ClipId,
    /// `None` names the clip after its track.
    name: Option<String>,
    destination: Destination,
    origin: Origin,
    announce: Option<PeerMessage>,
}

struct Completed {
    pending: Pending,
    result: playback::Result<DecodedAudio>,
}

pub struct Session {
    config: StudioConfig,
    store: TrackStore,
    history: HistoryStack,
    binder: PlaybackBinder,
    graph: AudioGraph,
    transport: Transport,
    replicator: Replicator,
    zoom: Zoom,
    drag: DragController,
    renderer: Arc<dyn InstrumentRenderer>,
    decoder: Option<Arc<dyn Decoder>>,
    pending: FuturesUnordered<BoxFuture<'static, Completed>>,
    pending_ids: HashSet<ClipId>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(config: StudioConfig, engine: Box<dyn AudioEngine>, renderer: Arc<dyn InstrumentRenderer>) -> Self {
        let transport = Transport::new();
        let drag = DragController::new(&config, transport.subscribe());
        let store = TrackStore::new();
        let mut history = HistoryStack::new(config.history_depth);
        history.commit(store.snapshot());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            zoom: Zoom::new(
                config.pixels_per_second,
                config.min_pixels_per_second,
                config.max_pixels_per_second,
            ),
            config,
            store,
            history,
            binder: PlaybackBinder::new(),
            graph: AudioGraph::new(engine),
            transport,
            replicator: Replicator::new(PeerId::new()),
            drag,
            renderer,
            decoder: None,
            pending: FuturesUnordered::new(),
            pending_ids: HashSet::new(),
            events,
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn with_replica(mut self, replica: PeerId) -> Self {
        self.replicator = Replicator::new(replica);
        self
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn binder(&self) -> &PlaybackBinder {
        &self.binder
    }

    pub fn replicator(&self) -> &Replicator {
        &self.replicator
    }

    pub fn replica(&self) -> PeerId {
        self.replicator.replica()
    }

    pub fn zoom(&self) -> &Zoom {
        &self.zoom
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // ---- tracks and clips ----

    pub fn add_track(&mut self, name: Option<&str>) -> Option<TrackId> {
        let mutation = self.store.add_track(name);
        let track_id = mutation.track_id();
        self.commit_local(mutation);
        track_id
    }

    /// Releases every clip binding on the track, then removes it.
    pub fn remove_track(&mut self, track_id: TrackId) -> bool {
        let Some(track) = self.store.track(track_id) else {
            debug!("remove_track skipped: {}", TimelineError::TrackNotFound(track_id));
            return false;
        };
        let clips: Vec<ClipId> = track.clips.iter().map(|c| c.id.clone()).collect();
        for clip_id in &clips {
            self.binder.release(clip_id, &mut self.graph);
        }
        let result = self.store.remove_track(track_id);
        if self.local("remove_track", result).is_none() {
            return false;
        }
        for clip_id in &clips {
            self.replicator.forget_clip(clip_id);
        }
        true
    }

    pub fn rename_track(&mut self, track_id: TrackId, name: &str) -> bool {
        let result = self.store.rename_track(track_id, name);
        self.local("rename_track", result).is_some()
    }

    pub fn reorder_tracks(&mut self, order: &[TrackId]) -> bool {
        let result = self.store.reorder_tracks(order);
        self.local("reorder_tracks", result).is_some()
    }

    pub fn move_track(&mut self, track_id: TrackId, index: usize) -> bool {
        let result = self.store.move_track(track_id, index);
        self.local("move_track", result).is_some()
    }

    /// Moves a clip and tells peers where it landed.
    pub fn move_clip(&mut self, clip_id: &ClipId, from: TrackId, to: TrackId, start_seconds: f64) -> bool {
        let result = self.store.move_clip(clip_id, from, to, start_seconds);
        let Some(Mutation::ClipMoved { to, start_seconds, .. }) = self.local("move_clip", result) else {
            return false;
        };
        if let Some(track) = self.store.track(to) {
            let message = PeerMessage::ClipMove {
                track_name: track.name.clone(),
                clip_id: clip_id.clone(),
                left: start_seconds,
            };
            self.replicator.broadcast(message);
        }
        true
    }

    pub fn rename_clip(&mut self, clip_id: &ClipId, name: &str) -> bool {
        let result = self.store.rename_clip(clip_id, name);
        self.local("rename_clip", result).is_some()
    }

    pub fn remove_clip(&mut self, clip_id: &ClipId) -> bool {
        if !self.store.contains_clip(clip_id) {
            debug!("remove_clip skipped: {}", TimelineError::ClipNotFound(clip_id.clone()));
            return false;
        }
        self.binder.release(clip_id, &mut self.graph);
        let result = self.store.remove_clip(clip_id);
        if self.local("remove_clip", result).is_none() {
            return false;
        }
        self.replicator.forget_clip(clip_id);
        true
    }

    // ---- exports and imports ----

    /// Renders a step pattern onto the drums track. Peers get the pattern once it lands.
    pub fn export_pattern(&mut self, pattern: Vec<Vec<u8>>) -> ClipId {
        let clip_id = ClipId::generate();
        let announce = PeerMessage::SequencerPattern {
            pattern: pattern.clone(),
            clip_id: clip_id.clone(),
        };
        self.queue_render(clip_id.clone(), RenderRequest::Pattern { pattern }, Origin::Local, Some(announce));
        clip_id
    }

    /// Entry point for instrument panels handing over a finished take.
    pub fn export(&mut self, notes: Vec<NoteEvent>, patch: InstrumentPatch) -> ClipId {
        let clip_id = ClipId::generate();
        let request = RenderRequest::Recording {
            patch: patch.clone(),
            notes: notes.clone(),
        };
        let announce = patch.into_message(notes, clip_id.clone());
        self.queue_render(clip_id.clone(), request, Origin::Local, Some(announce));
        clip_id
    }

    /// Decodes `source` and appends it to `track_id` at 0 s. Not replicated.
    pub fn import(&mut self, track_id: TrackId, source: AudioSource) -> Option<ClipId> {
        let Some(decoder) = self.decoder.clone() else {
            warn!("No decoder configured, import of {} skipped", source.display_name());
            return None;
        };
        let Some(track) = self.store.track(track_id) else {
            debug!("import skipped: {}", TimelineError::TrackNotFound(track_id));
            return None;
        };
        let clip_id = ClipId::generate();
        let pending = Pending {
            clip_id: clip_id.clone(),
            name: Some(source.display_name()),
            destination: Destination::Track {
                id: track_id,
                name: track.name.clone(),
            },
            origin: Origin::Local,
            announce: None,
        };
        self.queue(pending, decoder.decode(source));
        Some(clip_id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_pending(&self, clip_id: &ClipId) -> bool {
        self.pending_ids.contains(clip_id)
    }

    /// Waits for the next render or decode and adds its clip.
    ///
    /// Returns `None` when nothing is pending or the finished job produced no clip.
    pub async fn next_ready(&mut self) -> Option<ClipId> {
        let completed = self.pending.next().await?;
        self.finish(completed)
    }

    /// Applies whatever has already finished, without waiting.
    pub fn poll_ready(&mut self) -> Vec<ClipId> {
        let mut added = Vec::new();
        while let Some(Some(completed)) = self.pending.next().now_or_never() {
            added.extend(self.finish(completed));
        }
        added
    }

    /// Drains every pending job.
    pub async fn settle(&mut self) {
        while self.has_pending() {
            self.next_ready().await;
        }
    }

    // ---- replication ----

    pub fn connect(&mut self, connection: Box<dyn PeerConnection>) {
        info!("Peer connection {} opened", connection.id());
        self.replicator.connect(connection);
    }

    pub fn disconnect(&mut self, id: ConnectionId) {
        self.replicator.disconnect(id);
    }

    /// Handles one inbound frame. Returns true if it changed or will change the store.
    pub fn receive(&mut self, from: ConnectionId, text: &str) -> bool {
        let Some(inbound) = self.replicator.receive(from, text) else {
            return false;
        };
        let applied = self.apply_remote(inbound.message.clone());
        if applied {
            self.replicator.mark_applied(&inbound);
        }
        applied
    }

    /// Applies a peer's message. Nothing here is broadcast or recorded in history.
    pub fn apply_remote(&mut self, message: PeerMessage) -> bool {
        if let PeerMessage::ClipMove {
            track_name,
            clip_id,
            left,
        } = &message
        {
            return match self.store.move_clip_in_named(track_name, clip_id, *left) {
                Ok(mutation) => {
                    self.commit_remote(mutation);
                    true
                }
                Err(e) => {
                    debug!("Remote clipMove ignored: {}", e);
                    false
                }
            };
        }

        let clip_id = message.clip_id().clone();
        if self.store.contains_clip(&clip_id) || self.pending_ids.contains(&clip_id) {
            debug!("Clip {} already known, {} ignored", clip_id, message.kind());
            return false;
        }
        let Some(request) = RenderRequest::from_message(&message) else {
            return false;
        };
        self.queue_render(clip_id, request, Origin::Remote, None);
        true
    }

    // ---- history ----

    pub fn undo(&mut self) -> bool {
        let snapshot = self.history.undo().cloned();
        self.restore(snapshot, "undo")
    }

    pub fn redo(&mut self) -> bool {
        let snapshot = self.history.redo().cloned();
        self.restore(snapshot, "redo")
    }

    // ---- transport ----

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn subscribe_transport(&self) -> watch::Receiver<TransportState> {
        self.transport.subscribe()
    }

    pub fn position_seconds(&self) -> f64 {
        self.transport.position_seconds()
    }

    pub fn play(&mut self) -> bool {
        self.binder.retry_deferred(&self.store, &mut self.graph);
        match self.transport.play(&mut self.graph) {
            Ok(()) => true,
            Err(e) => {
                warn!("Engine refused to start: {}", e);
                false
            }
        }
    }

    pub fn pause(&mut self) -> bool {
        match self.transport.pause(&mut self.graph) {
            Ok(()) => true,
            Err(e) => {
                warn!("Engine refused to pause: {}", e);
                false
            }
        }
    }

    /// Stops and rewinds. Bindings stay in place for the next play.
    pub fn stop(&mut self) -> bool {
        match self.transport.stop(&mut self.graph) {
            Ok(()) => true,
            Err(e) => {
                warn!("Engine refused to stop: {}", e);
                false
            }
        }
    }

    pub fn seek(&mut self, seconds: f64) -> bool {
        match self.transport.seek(seconds, &mut self.graph) {
            Ok(()) => true,
            Err(e) => {
                warn!("Seek to {:.3}s failed: {}", seconds, e);
                false
            }
        }
    }

    // ---- view ----

    pub fn set_zoom(&mut self, pixels_per_second: f64) -> f64 {
        let applied = self.zoom.set(pixels_per_second);
        self.sync_width();
        applied
    }

    pub fn timeline_width(&self) -> f64 {
        self.drag.materialized_width().max(self.content_width())
    }

    pub fn begin_drag(&mut self, clip_id: &ClipId, pointer_x: f64, clip_left: f64, viewport: &Viewport) -> bool {
        let Some((track, _)) = self.store.find_clip(clip_id) else {
            debug!("Drag skipped: {}", TimelineError::ClipNotFound(clip_id.clone()));
            return false;
        };
        let source = track.id;
        self.sync_width();
        match self.drag.begin(clip_id.clone(), source, pointer_x, clip_left, viewport) {
            Ok(()) => true,
            Err(e) => {
                debug!("{}", e);
                false
            }
        }
    }

    pub fn drag_to(&mut self, pointer_x: f64, viewport: &Viewport) -> Option<f64> {
        self.drag.pointer_moved(pointer_x, viewport)
    }

    /// One animation frame while dragging; scrolls `viewport` near its edges.
    pub fn drag_frame(&mut self, viewport: &mut Viewport) -> f64 {
        self.drag.frame(viewport)
    }

    /// Drops on `target`, or cancels when there is no valid target.
    pub fn end_drag(&mut self, target: Option<TrackId>) -> bool {
        let Some(request) = self.drag.drop_on(target, &self.zoom) else {
            return false;
        };
        self.move_clip(&request.clip_id, request.from, request.to, request.start_seconds)
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
    }

    // ---- internals ----

    fn local(&mut self, op: &str, result: Result<Mutation, TimelineError>) -> Option<Mutation> {
        match result {
            Ok(mutation) => {
                self.commit_local(mutation.clone());
                Some(mutation)
            }
            Err(e) if e.is_not_found() => {
                debug!("{} skipped: {}", op, e);
                None
            }
            Err(e) => {
                info!("{} rejected: {}", op, e);
                None
            }
        }
    }

    fn commit_local(&mut self, mutation: Mutation) {
        self.binder.apply(&mutation, &self.store, &mut self.graph);
        self.history.commit(self.store.snapshot());
        self.sync_width();
        self.emit(SessionEvent::Mutated {
            mutation,
            origin: Origin::Local,
        });
    }

    fn commit_remote(&mut self, mutation: Mutation) {
        self.binder.apply(&mutation, &self.store, &mut self.graph);
        self.sync_width();
        self.emit(SessionEvent::Mutated {
            mutation,
            origin: Origin::Remote,
        });
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn restore(&mut self, snapshot: Option<Snapshot>, op: &str) -> bool {
        let Some(snapshot) = snapshot else {
            debug!("Nothing to {}", op);
            return false;
        };
        let before: HashMap<ClipId, (TrackId, f64)> = self
            .store
            .clips()
            .map(|(t, c)| (c.id.clone(), (t.id, c.start_seconds())))
            .collect();

        self.store.restore(&snapshot);
        self.binder.rebind_all(&self.store, &mut self.graph);
        self.sync_width();

        let moved: Vec<PeerMessage> = self
            .store
            .clips()
            .filter(|(t, c)| before.get(&c.id).is_some_and(|&placed| placed != (t.id, c.start_seconds())))
            .map(|(track, c)| PeerMessage::ClipMove {
                track_name: track.name.clone(),
                clip_id: c.id.clone(),
                left: c.start_seconds(),
            })
            .collect();
        for message in moved {
            self.replicator.broadcast(message);
        }

        info!("{} -> history index {}", op, self.history.index());
        self.emit(SessionEvent::HistoryRestored {
            index: self.history.index(),
        });
        true
    }

    fn queue_render(&mut self, clip_id: ClipId, request: RenderRequest, origin: Origin, announce: Option<PeerMessage>) {
        let pending = Pending {
            clip_id,
            name: None,
            destination: Destination::Named(request.destination_track().to_string()),
            origin,
            announce,
        };
        let work = self.renderer.render(request);
        self.queue(pending, work);
    }

    fn queue(&mut self, pending: Pending, work: BoxFuture<'static, playback::Result<DecodedAudio>>) {
        self.pending_ids.insert(pending.clip_id.clone());
        self.pending.push(
            async move {
                let result = work.await;
                Completed { pending, result }
            }
            .boxed(),
        );
    }

    fn finish(&mut self, completed: Completed) -> Option<ClipId> {
        let Completed { pending, result } = completed;
        self.pending_ids.remove(&pending.clip_id);

        let audio = match result {
            Ok(audio) => audio,
            Err(e) => {
                warn!("Audio for clip {} unavailable: {}", pending.clip_id, e);
                return None;
            }
        };

        let track_name = match &pending.destination {
            Destination::Named(name) => name.clone(),
            Destination::Track { id, name } => self.store.track(*id).map_or_else(|| name.clone(), |t| t.name.clone()),
        };
        let clip_name = pending.name.unwrap_or_else(|| format!("{} Pattern", track_name));
        let clip = Clip::new(pending.clip_id.clone(), clip_name, audio.handle, audio.duration_seconds);

        let result = match pending.destination {
            Destination::Track { id, .. } if self.store.track(id).is_some() => self.store.add_clip(id, clip),
            _ => self.store.add_clip_to_named(&track_name, clip),
        };
        let mutation = match result {
            Ok(mutation) => mutation,
            Err(e) => {
                debug!("Clip {} not added: {}", pending.clip_id, e);
                return None;
            }
        };

        match pending.origin {
            Origin::Local => {
                self.commit_local(mutation);
                if let Some(message) = pending.announce {
                    self.replicator.broadcast(message);
                }
            }
            Origin::Remote => self.commit_remote(mutation),
        }
        Some(pending.clip_id)
    }

    fn content_width(&self) -> f64 {
        let content = self.zoom.to_pixels(self.store.end_seconds() + TIMELINE_TAIL_SECONDS);
        self.config.min_timeline_width.max(content)
    }

    fn sync_width(&mut self) {
        let width = self.content_width();
        self.drag.ensure_width(width);
    }
}
