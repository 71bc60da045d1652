//! OpenCV-backed collaborators: Haar cascade finder, LBPH classifier and
//! the contour-area motion gauge. Compiled only with `backend-opencv`;
//! needs a system OpenCV build that includes the contrib `face` module.

use std::path::Path;

use opencv::core::{self, Mat, MatTraitConst, Point, Ptr, Rect, Size, Vector};
use opencv::face::{FaceRecognizerTrait, FaceRecognizerTraitConst, LBPHFaceRecognizer};
use opencv::imgproc;
use opencv::objdetect::{CascadeClassifier, CascadeClassifierTrait, CascadeClassifierTraitConst};
use tracing::info;

use crate::face::{FaceBox, FaceClassifier, FaceError, FaceFinder, Prediction};
use crate::frame::Frame;
use crate::motion::{MotionError, MotionGauge};

/// Cascade pyramid scale step.
const SCALE_FACTOR: f64 = 1.3;

/// Neighbor votes required to keep a cascade hit.
const MIN_NEIGHBORS: i32 = 4;

/// Smallest face edge, in pixels, the cascade will report.
const MIN_SIZE: i32 = 30;

/// Gray-level change required before a pixel counts as moving.
const DIFF_THRESHOLD: f64 = 25.0;

/// Dilation passes applied to the motion mask before contouring.
const DILATE_PASSES: i32 = 2;

/// LBPH operator parameters: sample radius, sampled neighbors, grid cells.
const LBPH_RADIUS: i32 = 1;
const LBPH_NEIGHBORS: i32 = 8;
const LBPH_GRID: i32 = 8;

fn gray_mat(frame: &Frame) -> opencv::Result<Mat> {
    let mat = Mat::new_rows_cols_with_data(frame.height as i32, frame.width as i32, &frame.data)?;
    mat.try_clone()
}

fn face_backend(err: opencv::Error) -> FaceError {
    FaceError::Backend(err.to_string())
}

fn motion_backend(err: opencv::Error) -> MotionError {
    MotionError::Backend(err.to_string())
}

/// Haar cascade detector that only commits when the frame holds exactly
/// one face. Zero hits and multi-face frames both come back as `None`.
pub struct CascadeFaceFinder {
    cascade: CascadeClassifier,
}

impl CascadeFaceFinder {
    pub fn open(path: &Path) -> Result<Self, FaceError> {
        if !path.exists() {
            return Err(FaceError::ModelNotFound(path.to_path_buf()));
        }
        let cascade = CascadeClassifier::new(&path.to_string_lossy()).map_err(face_backend)?;
        if cascade.empty().map_err(face_backend)? {
            return Err(FaceError::Backend(format!(
                "cascade {} loaded empty",
                path.display()
            )));
        }
        info!(path = %path.display(), "face cascade loaded");
        Ok(Self { cascade })
    }
}

impl FaceFinder for CascadeFaceFinder {
    fn detect_single(&mut self, frame: &Frame) -> Result<Option<FaceBox>, FaceError> {
        let mat = gray_mat(frame).map_err(face_backend)?;
        let mut faces = Vector::<Rect>::new();
        self.cascade
            .detect_multi_scale(
                &mat,
                &mut faces,
                SCALE_FACTOR,
                MIN_NEIGHBORS,
                0,
                Size::new(MIN_SIZE, MIN_SIZE),
                Size::new(0, 0),
            )
            .map_err(face_backend)?;
        if faces.len() != 1 {
            return Ok(None);
        }
        let rect = faces.get(0).map_err(face_backend)?;
        Ok(Some(FaceBox {
            x: rect.x.max(0) as u32,
            y: rect.y.max(0) as u32,
            width: rect.width.max(0) as u32,
            height: rect.height.max(0) as u32,
        }))
    }
}

/// LBPH recognizer loaded from a trained model file. Labels past the
/// distance threshold come back negative from the backend.
pub struct LbphClassifier {
    model: Ptr<LBPHFaceRecognizer>,
}

impl LbphClassifier {
    pub fn load(path: &Path, threshold: f64) -> Result<Self, FaceError> {
        if !path.exists() {
            return Err(FaceError::ModelNotFound(path.to_path_buf()));
        }
        let mut model = LBPHFaceRecognizer::create(
            LBPH_RADIUS,
            LBPH_NEIGHBORS,
            LBPH_GRID,
            LBPH_GRID,
            threshold,
        )
        .map_err(face_backend)?;
        model
            .read(&path.to_string_lossy())
            .map_err(face_backend)?;
        info!(path = %path.display(), threshold, "recognition model loaded");
        Ok(Self { model })
    }
}

impl FaceClassifier for LbphClassifier {
    fn predict(&mut self, face: &Frame) -> Result<Prediction, FaceError> {
        let mat = gray_mat(face).map_err(face_backend)?;
        let mut label = -1i32;
        let mut confidence = 0.0f64;
        self.model
            .predict(&mat, &mut label, &mut confidence)
            .map_err(face_backend)?;
        Ok(Prediction { label, confidence })
    }
}

/// Contour-area gauge: ANDs the two step diffs so only pixels that moved
/// in both count, binarizes, dilates, and scores the largest blob.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContourGauge;

impl MotionGauge for ContourGauge {
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
        let m0 = gray_mat(t0).map_err(motion_backend)?;
        let m1 = gray_mat(t1).map_err(motion_backend)?;
        let m2 = gray_mat(t2).map_err(motion_backend)?;

        let mut d1 = Mat::default();
        core::absdiff(&m1, &m0, &mut d1).map_err(motion_backend)?;
        let mut d2 = Mat::default();
        core::absdiff(&m2, &m1, &mut d2).map_err(motion_backend)?;
        let mut moved = Mat::default();
        core::bitwise_and(&d1, &d2, &mut moved, &core::no_array()).map_err(motion_backend)?;

        let mut mask = Mat::default();
        imgproc::threshold(&moved, &mut mask, DIFF_THRESHOLD, 255.0, imgproc::THRESH_BINARY)
            .map_err(motion_backend)?;
        let mut dilated = Mat::default();
        imgproc::dilate(
            &mask,
            &mut dilated,
            &Mat::default(),
            Point::new(-1, -1),
            DILATE_PASSES,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value().map_err(motion_backend)?,
        )
        .map_err(motion_backend)?;

        let mut contours = Vector::<Vector<Point>>::new();
        imgproc::find_contours(
            &dilated,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )
        .map_err(motion_backend)?;

        let mut largest = 0.0f64;
        for contour in contours.iter() {
            let area = imgproc::contour_area(&contour, false).map_err(motion_backend)?;
            if area > largest {
                largest = area;
            }
        }
        Ok(largest)
    }
}
