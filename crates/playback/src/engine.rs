use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;
use timeline::AudioHandle;

use crate::{ChannelId, Result};

/// The external audio renderer/player.
///
/// Runs on its own clock; every method must be safe to call at any time,
/// including right before or after the transport starts.
pub trait AudioEngine: Send {
    /// Schedule `audio` to start at `start_seconds` on the transport, feeding `channel`.
    fn bind(&mut self, audio: AudioHandle, channel: ChannelId, start_seconds: f64) -> Result<()>;

    /// Drop any schedule for `audio`.
    fn unbind(&mut self, audio: AudioHandle) -> Result<()>;

    /// Start playback at `offset_seconds` on the transport.
    fn start(&mut self, offset_seconds: f64) -> Result<()>;

    fn stop(&mut self) -> Result<()>;
}

/// Input to the asynchronous decoder.
#[derive(Debug, Clone)]
pub enum AudioSource {
    File(PathBuf),
    Buffer { name: String, bytes: Arc<[u8]> },
}

impl AudioSource {
    /// Name shown on the clip created from this source.
    pub fn display_name(&self) -> String {
        match self {
            AudioSource::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            AudioSource::Buffer { name, .. } => name.clone(),
        }
    }
}

/// A fully decoded buffer, ready to become a clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedAudio {
    pub handle: AudioHandle,
    pub duration_seconds: f64,
}

pub trait Decoder: Send + Sync {
    fn decode(&self, source: AudioSource) -> BoxFuture<'static, Result<DecodedAudio>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_uses_file_name() {
        let source = AudioSource::File(PathBuf::from("/tmp/loops/beat.wav"));
        assert_eq!(source.display_name(), "beat.wav");

        let source = AudioSource::Buffer {
            name: "take 3".to_string(),
            bytes: Arc::from(vec![0u8; 4]),
        };
        assert_eq!(source.display_name(), "take 3");
    }
}
