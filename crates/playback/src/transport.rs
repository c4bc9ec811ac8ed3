//! Shared playback transport: a wall-clock anchored position plus a watch
//! channel so other components can see whether playback is running.
use std::time::Instant;
use tokio::sync::watch;
use tracing::info;

use crate::{AudioGraph, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }
}

#[derive(Default, Debug, Clone)]
struct PlaybackClock {
    playing: bool,
    anchor_instant: Option<Instant>,
    anchor_seconds: f64, // transport time at anchor
}

impl PlaybackClock {
    fn play(&mut self, current_seconds: f64) {
        self.playing = true;
        self.anchor_seconds = current_seconds;
        self.anchor_instant = Some(Instant::now());
    }

    fn pause(&mut self, current_seconds: f64) {
        self.playing = false;
        self.anchor_seconds = current_seconds;
        self.anchor_instant = None;
    }

    fn now(&self) -> f64 {
        match (self.playing, self.anchor_instant) {
            (true, Some(anchor)) => self.anchor_seconds + anchor.elapsed().as_secs_f64(),
            _ => self.anchor_seconds,
        }
    }

    fn seek_to(&mut self, seconds: f64) {
        self.anchor_seconds = seconds;
        if self.playing {
            self.anchor_instant = Some(Instant::now());
        }
    }
}

pub struct Transport {
    clock: PlaybackClock,
    state: watch::Sender<TransportState>,
}

impl Transport {
    pub fn new() -> Self {
        let (state, _) = watch::channel(TransportState::Stopped);
        Self {
            clock: PlaybackClock::default(),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TransportState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TransportState {
        *self.state.borrow()
    }

    pub fn position_seconds(&self) -> f64 {
        self.clock.now()
    }

    /// Starts the engine at the current position. The state only changes if the engine accepts.
    pub fn play(&mut self, graph: &mut AudioGraph) -> Result<()> {
        if self.state().is_playing() {
            return Ok(());
        }
        let position = self.clock.now();
        graph.engine_mut().start(position)?;
        self.clock.play(position);
        self.state.send_replace(TransportState::Playing);
        info!("Transport playing from {:.3}s", position);
        Ok(())
    }

    pub fn pause(&mut self, graph: &mut AudioGraph) -> Result<()> {
        if !self.state().is_playing() {
            return Ok(());
        }
        let position = self.clock.now();
        graph.engine_mut().stop()?;
        self.clock.pause(position);
        self.state.send_replace(TransportState::Paused);
        info!("Transport paused at {:.3}s", position);
        Ok(())
    }

    /// Stops and rewinds to zero.
    pub fn stop(&mut self, graph: &mut AudioGraph) -> Result<()> {
        if self.state() == TransportState::Playing {
            graph.engine_mut().stop()?;
        }
        self.clock.pause(0.0);
        self.state.send_replace(TransportState::Stopped);
        info!("Transport stopped");
        Ok(())
    }

    pub fn seek(&mut self, seconds: f64, graph: &mut AudioGraph) -> Result<()> {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if self.state().is_playing() {
            graph.engine_mut().start(seconds)?;
        }
        self.clock.seek_to(seconds);
        Ok(())
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessEngine;

    #[test]
    fn test_stop_rewinds_and_notifies() {
        let mut graph = AudioGraph::new(Box::new(HeadlessEngine::new()));
        let mut transport = Transport::new();
        let rx = transport.subscribe();

        transport.seek(4.0, &mut graph).unwrap();
        transport.play(&mut graph).unwrap();
        assert!(rx.borrow().is_playing());
        assert!(transport.position_seconds() >= 4.0);

        transport.stop(&mut graph).unwrap();
        assert_eq!(*rx.borrow(), TransportState::Stopped);
        assert_eq!(transport.position_seconds(), 0.0);
    }

    #[test]
    fn test_pause_holds_position() {
        let mut graph = AudioGraph::new(Box::new(HeadlessEngine::new()));
        let mut transport = Transport::new();
        transport.seek(2.5, &mut graph).unwrap();
        transport.play(&mut graph).unwrap();
        transport.pause(&mut graph).unwrap();

        let held = transport.position_seconds();
        assert!(held >= 2.5);
        assert_eq!(transport.position_seconds(), held);
        assert_eq!(transport.state(), TransportState::Paused);
    }

    #[test]
    fn test_seek_clamps_negative() {
        let mut graph = AudioGraph::new(Box::new(HeadlessEngine::new()));
        let mut transport = Transport::new();
        transport.seek(-3.0, &mut graph).unwrap();
        assert_eq!(transport.position_seconds(), 0.0);
    }
}
