//! Timeline state: tracks, clips, coordinate mapping and undo history.
use thiserror::Error;

mod model;
pub use model::*;
pub mod coords;
pub use coords::Zoom;
mod store;
pub use store::*;
mod history;
pub use history::*;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("track not found: {0}")]
    TrackNotFound(TrackId),
    #[error("no track named {0:?}")]
    TrackNameNotFound(String),
    #[error("clip not found: {0}")]
    ClipNotFound(ClipId),
    #[error("clip already exists: {0}")]
    ClipExists(ClipId),
    #[error("name must not be empty")]
    InvalidName,
    #[error("invalid track order: {0}")]
    InvalidOrder(String),
}

impl TimelineError {
    /// Missing targets are expected under replication races.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TimelineError::TrackNotFound(_)
                | TimelineError::TrackNameNotFound(_)
                | TimelineError::ClipNotFound(_)
        )
    }
}
