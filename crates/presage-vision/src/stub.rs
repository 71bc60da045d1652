//! Queue-driven collaborator doubles for tests and trace replay.

use std::collections::VecDeque;

use crate::face::{FaceBox, FaceClassifier, FaceError, FaceFinder, Prediction};
use crate::frame::Frame;
use crate::motion::{MotionError, MotionGauge};
use crate::source::{FrameSource, SourceError};

/// Frame source that hands out a fixed sequence and then runs dry.
#[derive(Debug)]
pub struct ScriptedSource {
    frames: VecDeque<Frame>,
    stopped: bool,
}

impl ScriptedSource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            stopped: false,
        }
    }

    pub fn repeated(frame: Frame, count: usize) -> Self {
        Self::new(std::iter::repeat(frame).take(count))
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }
}

impl FrameSource for ScriptedSource {
    fn read(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.stopped {
            return Err(SourceError::Stopped);
        }
        Ok(self.frames.pop_front())
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

/// Finder that replays a fixed run of detections, then errors out.
#[derive(Debug)]
pub struct ScriptedFinder {
    results: VecDeque<Option<FaceBox>>,
}

impl ScriptedFinder {
    pub fn new(results: impl IntoIterator<Item = Option<FaceBox>>) -> Self {
        Self {
            results: results.into_iter().collect(),
        }
    }
}

impl FaceFinder for ScriptedFinder {
    fn detect_single(&mut self, _frame: &Frame) -> Result<Option<FaceBox>, FaceError> {
        self.results.pop_front().ok_or(FaceError::Exhausted)
    }
}

/// Classifier that replays a fixed run of predictions, then errors out.
#[derive(Debug)]
pub struct ScriptedClassifier {
    predictions: VecDeque<Prediction>,
}

impl ScriptedClassifier {
    pub fn new(predictions: impl IntoIterator<Item = Prediction>) -> Self {
        Self {
            predictions: predictions.into_iter().collect(),
        }
    }
}

impl FaceClassifier for ScriptedClassifier {
    fn predict(&mut self, _face: &Frame) -> Result<Prediction, FaceError> {
        self.predictions.pop_front().ok_or(FaceError::Exhausted)
    }
}

/// Gauge that replays a fixed run of scores, then errors out.
#[derive(Debug)]
pub struct ScriptedGauge {
    scores: VecDeque<f64>,
}

impl ScriptedGauge {
    pub fn new(scores: impl IntoIterator<Item = f64>) -> Self {
        Self {
            scores: scores.into_iter().collect(),
        }
    }
}

impl MotionGauge for ScriptedGauge {
    fn score(&mut self, _t0: &Frame, _t1: &Frame, _t2: &Frame) -> Result<f64, MotionError> {
        self.scores.pop_front().ok_or(MotionError::Exhausted)
    }
}
