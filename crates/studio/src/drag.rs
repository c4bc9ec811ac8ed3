//! Pointer-driven clip repositioning with edge auto-scroll.
use playback::TransportState;
use timeline::{ClipId, TrackId, Zoom};
use tokio::sync::watch;
use tracing::debug;

use crate::{Result, StudioConfig, StudioError};

/// The scrollable timeline area, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Screen x of the container's left edge.
    pub left: f64,
    pub width: f64,
    pub scroll_left: f64,
}

impl Viewport {
    pub fn new(left: f64, width: f64) -> Self {
        Self {
            left,
            width,
            scroll_left: 0.0,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    pub clip_id: ClipId,
    pub source_track: TrackId,
    /// Pointer offset inside the clip at grab time.
    pub cursor_anchor: f64,
    pub candidate_px: f64,
    pub pointer_x: f64,
}

/// Where a finished drag wants the clip to go.
#[derive(Debug, Clone, PartialEq)]
pub struct DropRequest {
    pub clip_id: ClipId,
    pub from: TrackId,
    pub to: TrackId,
    pub start_seconds: f64,
}

pub struct DragController {
    state: Option<DragState>,
    transport: watch::Receiver<TransportState>,
    margin: f64,
    speed: f64,
    increment: f64,
    materialized_width: f64,
}

impl DragController {
    pub fn new(config: &StudioConfig, transport: watch::Receiver<TransportState>) -> Self {
        Self {
            state: None,
            transport,
            margin: config.auto_scroll_margin,
            speed: config.auto_scroll_speed,
            increment: config.width_increment,
            materialized_width: config.min_timeline_width,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&DragState> {
        self.state.as_ref()
    }

    pub fn materialized_width(&self) -> f64 {
        self.materialized_width
    }

    /// Syncs the materialized width with the content; mid-drag it only grows.
    pub fn ensure_width(&mut self, width: f64) {
        if width > self.materialized_width || !self.is_dragging() {
            self.materialized_width = width;
        }
    }

    /// Starts dragging `clip_id`. `clip_left` is the clip's left edge in screen pixels.
    ///
    /// Refused while the transport is playing.
    pub fn begin(
        &mut self,
        clip_id: ClipId,
        source_track: TrackId,
        pointer_x: f64,
        clip_left: f64,
        viewport: &Viewport,
    ) -> Result<()> {
        if self.transport.borrow().is_playing() {
            return Err(StudioError::DragRejected("transport is playing".to_string()));
        }
        if let Some(active) = &self.state {
            return Err(StudioError::DragRejected(format!("already dragging {}", active.clip_id)));
        }
        let cursor_anchor = (pointer_x - clip_left).max(0.0);
        debug!("Drag start {} anchor {:.1}px", clip_id, cursor_anchor);
        self.state = Some(DragState {
            clip_id,
            source_track,
            cursor_anchor,
            candidate_px: candidate(pointer_x, viewport, cursor_anchor),
            pointer_x,
        });
        Ok(())
    }

    /// Recomputes the candidate pixel position for a pointer move.
    pub fn pointer_moved(&mut self, pointer_x: f64, viewport: &Viewport) -> Option<f64> {
        let state = self.state.as_mut()?;
        state.pointer_x = pointer_x;
        state.candidate_px = candidate(pointer_x, viewport, state.cursor_anchor);
        Some(state.candidate_px)
    }

    /// One animation frame of edge auto-scroll. Returns the applied scroll delta.
    pub fn frame(&mut self, viewport: &mut Viewport) -> f64 {
        let Some(state) = self.state.as_mut() else {
            return 0.0;
        };

        let before = viewport.scroll_left;
        if state.pointer_x < viewport.left + self.margin {
            viewport.scroll_left = (viewport.scroll_left - self.speed).max(0.0);
        } else if state.pointer_x > viewport.right() - self.margin {
            viewport.scroll_left += self.speed;
            if viewport.scroll_left + viewport.width + self.margin >= self.materialized_width {
                self.materialized_width += self.increment;
                debug!("Timeline width extended to {:.0}px", self.materialized_width);
            }
        }

        let delta = viewport.scroll_left - before;
        if delta != 0.0 {
            state.candidate_px = candidate(state.pointer_x, viewport, state.cursor_anchor);
        }
        delta
    }

    /// Ends the drag. With no valid `target` the drag is cancelled.
    pub fn drop_on(&mut self, target: Option<TrackId>, zoom: &Zoom) -> Option<DropRequest> {
        let state = self.state.take()?;
        let Some(to) = target else {
            debug!("Drag of {} cancelled", state.clip_id);
            return None;
        };
        Some(DropRequest {
            start_seconds: zoom.to_seconds(state.candidate_px),
            clip_id: state.clip_id,
            from: state.source_track,
            to,
        })
    }

    pub fn cancel(&mut self) {
        self.state = None;
    }
}

fn candidate(pointer_x: f64, viewport: &Viewport, anchor: f64) -> f64 {
    (pointer_x - viewport.left + viewport.scroll_left - anchor).max(0.0)
}
