//! Editing session for a shared multi-track timeline.
//! Ties the store, playback binding, history and replication together and
//! hosts the interactive drag controller.
use thiserror::Error;

mod config;
pub use config::*;

mod drag;
pub use drag::*;

mod render;
pub use render::*;

mod session;
pub use session::*;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("config io error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("drag rejected: {0}")]
    DragRejected(String),
}

pub type Result<T> = std::result::Result<T, StudioError>;
