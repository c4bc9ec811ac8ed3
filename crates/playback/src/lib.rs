//! Playback side of the timeline: the audio-engine contract, the explicit
//! audio graph context, clip binding and the shared transport.
use thiserror::Error;
use timeline::AudioHandle;

mod engine;
pub use engine::*;

mod graph;
pub use graph::*;

mod binder;
pub use binder::*;

mod transport;
pub use transport::*;

mod headless;
pub use headless::*;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("audio not decoded yet: {0}")]
    NotDecoded(AudioHandle),

    #[error("engine busy")]
    Busy,

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("engine failure: {0}")]
    Failed(String),
}

impl EngineError {
    /// Errors worth retrying on the next mutation touching the clip.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::NotDecoded(_) | EngineError::Busy)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
