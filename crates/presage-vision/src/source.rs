//! Frame acquisition seam.

use thiserror::Error;

use crate::frame::Frame;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("frame source already stopped")]
    Stopped,
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplies grayscale frames to the presence loop.
///
/// Implementations are handed to a dedicated capture thread, hence `Send`.
/// `read` returns `Ok(None)` when the source is alive but produced nothing
/// this attempt; once `stop` has run, further reads fail with
/// [`SourceError::Stopped`]. `stop` is idempotent.
pub trait FrameSource: Send {
    fn read(&mut self) -> Result<Option<Frame>, SourceError>;

    fn stop(&mut self);
}
