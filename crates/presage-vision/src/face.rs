//! Face detection and classification seams.

use std::path::PathBuf;

use thiserror::Error;

use crate::frame::Frame;

/// Axis-aligned face rectangle in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Raw classifier verdict for one face crop.
///
/// `label` is the backend's user label: positive for a trained user, zero
/// for the negative sample set, negative when the distance threshold
/// rejected the match. `confidence` is the backend's distance measure
/// (lower is closer).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: i32,
    pub confidence: f64,
}

#[derive(Debug, Error)]
pub enum FaceError {
    #[error("face backend error: {0}")]
    Backend(String),
    #[error("model file not found: {0}")]
    ModelNotFound(PathBuf),
    #[error("scripted collaborator exhausted")]
    Exhausted,
}

/// Locates at most one face per frame.
pub trait FaceFinder: Send {
    /// The box of the single detected face, or `None` when the frame holds
    /// no face (or the backend cannot commit to exactly one).
    fn detect_single(&mut self, frame: &Frame) -> Result<Option<FaceBox>, FaceError>;

    /// Cut the face region out of `frame`, padded by `margin` pixels.
    fn crop(&self, frame: &Frame, face: FaceBox, margin: u32) -> Frame {
        frame.crop_with_margin(face.x, face.y, face.width, face.height, margin)
    }
}

/// Maps a face crop to a user label.
pub trait FaceClassifier: Send {
    fn predict(&mut self, face: &Frame) -> Result<Prediction, FaceError>;
}
