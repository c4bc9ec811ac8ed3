//! Engine that schedules nothing audible; it tracks bindings and logs them.
//! Used by headless peers and as a stand-in when no audio device exists.
use std::collections::HashMap;
use timeline::AudioHandle;
use tracing::{debug, info};

use crate::{AudioEngine, ChannelId, Result};

#[derive(Debug, Default)]
pub struct HeadlessEngine {
    scheduled: HashMap<AudioHandle, (ChannelId, f64)>,
    running_from: Option<f64>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self, audio: AudioHandle) -> Option<(ChannelId, f64)> {
        self.scheduled.get(&audio).copied()
    }

    pub fn is_running(&self) -> bool {
        self.running_from.is_some()
    }
}

impl AudioEngine for HeadlessEngine {
    fn bind(&mut self, audio: AudioHandle, channel: ChannelId, start_seconds: f64) -> Result<()> {
        debug!("bind {} -> {} @ {:.3}s", audio, channel, start_seconds);
        self.scheduled.insert(audio, (channel, start_seconds));
        Ok(())
    }

    fn unbind(&mut self, audio: AudioHandle) -> Result<()> {
        debug!("unbind {}", audio);
        self.scheduled.remove(&audio);
        Ok(())
    }

    fn start(&mut self, offset_seconds: f64) -> Result<()> {
        info!("Engine start at {:.3}s with {} scheduled buffers", offset_seconds, self.scheduled.len());
        self.running_from = Some(offset_seconds);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        info!("Engine stop");
        self.running_from = None;
        Ok(())
    }
}
