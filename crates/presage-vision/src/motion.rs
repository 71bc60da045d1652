//! Motion scoring seam plus the built-in frame-differencing gauge.

use std::collections::VecDeque;

use thiserror::Error;

use crate::frame::Frame;

/// Frames held for triple differencing.
const WINDOW_LEN: usize = 3;

/// Minimum per-pixel change, in gray levels, for a step to count as movement.
const PIXEL_DELTA: u8 = 25;

#[derive(Debug, Error)]
pub enum MotionError {
    #[error("window frames differ in size: {expected_width}x{expected_height} vs {actual_width}x{actual_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("motion backend error: {0}")]
    Backend(String),
    #[error("scripted collaborator exhausted")]
    Exhausted,
}

/// Scores the amount of movement across three consecutive frames,
/// oldest first. Higher means more movement; the scale is backend-defined.
pub trait MotionGauge: Send {
    fn score(&mut self, t0: &Frame, t1: &Frame, t2: &Frame) -> Result<f64, MotionError>;
}

/// Sliding window of the most recent frames, oldest at the front.
#[derive(Debug, Default)]
pub struct FrameWindow {
    frames: VecDeque<Frame>,
}

impl FrameWindow {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::with_capacity(WINDOW_LEN),
        }
    }

    pub fn push(&mut self, frame: Frame) {
        if self.frames.len() == WINDOW_LEN {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// The full window as `(oldest, middle, newest)`, once three frames
    /// have been pushed.
    pub fn triple(&self) -> Option<(&Frame, &Frame, &Frame)> {
        if self.frames.len() < WINDOW_LEN {
            return None;
        }
        Some((&self.frames[0], &self.frames[1], &self.frames[2]))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Pure-Rust gauge: counts pixels that moved more than [`PIXEL_DELTA`] in
/// both steps of the triple. A one-off jump between two frames (a light
/// switching on, sensor noise) only registers on one step and scores zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffGauge;

impl MotionGauge for DiffGauge {
    fn score(&mut self, t0: &Frame, t1: &Frame, t2: &Frame) -> Result<f64, MotionError> {
        for other in [t1, t2] {
            if other.width != t0.width || other.height != t0.height {
                return Err(MotionError::DimensionMismatch {
                    expected_width: t0.width,
                    expected_height: t0.height,
                    actual_width: other.width,
                    actual_height: other.height,
                });
            }
        }
        let moved = t0
            .data
            .iter()
            .zip(&t1.data)
            .zip(&t2.data)
            .filter(|((&a, &b), &c)| b.abs_diff(a) > PIXEL_DELTA && c.abs_diff(b) > PIXEL_DELTA)
            .count();
        Ok(moved as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(value: u8) -> Frame {
        Frame::new(vec![value; 16], 4, 4)
    }

    fn with_block(value: u8) -> Frame {
        let mut frame = flat(0);
        for i in [5usize, 6, 9, 10] {
            frame.data[i] = value;
        }
        frame
    }

    #[test]
    fn test_window_needs_three_frames() {
        let mut window = FrameWindow::new();
        window.push(flat(0));
        window.push(flat(1));
        assert!(window.triple().is_none());
        window.push(flat(2));
        assert!(window.triple().is_some());
    }

    #[test]
    fn test_window_slides() {
        let mut window = FrameWindow::new();
        for value in 0..4u8 {
            window.push(flat(value));
        }
        assert_eq!(window.len(), 3);
        let (t0, t1, t2) = window.triple().unwrap();
        assert_eq!(t0.data[0], 1);
        assert_eq!(t1.data[0], 2);
        assert_eq!(t2.data[0], 3);
    }

    #[test]
    fn test_static_scene_scores_zero() {
        let mut gauge = DiffGauge;
        let score = gauge.score(&flat(90), &flat(90), &flat(90)).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_movement_in_both_steps_is_counted() {
        let mut gauge = DiffGauge;
        // Four pixels flare up and drop back: both steps exceed the delta.
        let score = gauge.score(&flat(0), &with_block(200), &flat(0)).unwrap();
        assert_eq!(score, 4.0);
    }

    #[test]
    fn test_single_step_change_is_ignored() {
        let mut gauge = DiffGauge;
        let lit = with_block(200);
        let score = gauge.score(&flat(0), &lit.clone(), &lit).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_small_deltas_below_threshold_score_zero() {
        let mut gauge = DiffGauge;
        let score = gauge.score(&flat(0), &flat(25), &flat(0)).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_dimension_mismatch_is_reported() {
        let mut gauge = DiffGauge;
        let small = Frame::new(vec![0; 4], 2, 2);
        let err = gauge.score(&flat(0), &small, &flat(0)).unwrap_err();
        assert!(matches!(err, MotionError::DimensionMismatch { .. }));
    }
}
