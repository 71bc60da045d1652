//! presage-vision — collaborator seams for the presence loop.
//!
//! The polling driver talks to the outside world through the traits in
//! this crate: a frame source, a face finder/classifier pair, and a motion
//! gauge. Shipped implementations: a built-in differencing gauge,
//! queue-driven scripted doubles for tests and replay, and an OpenCV
//! cascade/LBPH/contour pipeline behind the `backend-opencv` feature.

#[cfg(feature = "backend-opencv")]
pub mod cv;
pub mod face;
pub mod frame;
pub mod motion;
pub mod source;
pub mod stub;

pub use face::{FaceBox, FaceClassifier, FaceError, FaceFinder, Prediction};
pub use frame::Frame;
pub use motion::{DiffGauge, FrameWindow, MotionError, MotionGauge};
pub use source::{FrameSource, SourceError};
