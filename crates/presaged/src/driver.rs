//! Polling loop that feeds frames through the detection pipelines and
//! forwards debounced events to the sink.

use std::io;
use std::time::{Duration, Instant};

use presage_core::{
    Detection, IdentityDebouncer, MatchOutcome, MotionDebouncer, MotionPolicy, SessionPolicy,
};
use presage_vision::{
    FaceClassifier, FaceError, FaceFinder, FrameSource, FrameWindow, MotionError, MotionGauge,
    SourceError,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::sink::EventSink;

/// Frames pushed into the motion window before the loop starts, so the
/// first in-loop push completes a triple.
const WINDOW_SEED_FRAMES: usize = 2;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("camera produced no first frame")]
    CameraInit,
    #[error("camera stopped producing frames")]
    FrameUnavailable,
    #[error("frame source failed: {0}")]
    Source(#[from] SourceError),
    #[error("face pipeline failed: {0}")]
    Face(#[from] FaceError),
    #[error("motion pipeline failed: {0}")]
    Motion(#[from] MotionError),
    #[error("event output failed: {0}")]
    Sink(#[from] io::Error),
}

/// Face detection and classification stages, wired together.
pub struct FacePipeline {
    pub finder: Box<dyn FaceFinder>,
    pub classifier: Box<dyn FaceClassifier>,
    /// Crop margin as a fraction of the detected face width.
    pub margin_factor: f64,
}

struct MotionPipeline {
    gauge: Box<dyn MotionGauge>,
    window: FrameWindow,
}

/// Owns the frame source, the optional pipelines and both debouncers.
/// `run` blocks for the life of the loop and is meant for a dedicated
/// thread; the caller signals shutdown through the watch channel.
pub struct Driver<K: EventSink> {
    source: Box<dyn FrameSource>,
    face: Option<FacePipeline>,
    motion: Option<MotionPipeline>,
    session: IdentityDebouncer,
    motion_state: MotionDebouncer,
    interval: Duration,
    sink: K,
}

impl<K: EventSink> Driver<K> {
    /// The construction instant doubles as the identity debouncer's
    /// baseline, arming the unknown-face cooldown at startup.
    pub fn new(
        source: Box<dyn FrameSource>,
        sink: K,
        interval: Duration,
        session_policy: SessionPolicy,
        motion_policy: MotionPolicy,
    ) -> Self {
        Self {
            source,
            face: None,
            motion: None,
            session: IdentityDebouncer::new(session_policy, Instant::now()),
            motion_state: MotionDebouncer::new(motion_policy),
            interval,
            sink,
        }
    }

    pub fn with_face(mut self, pipeline: FacePipeline) -> Self {
        self.face = Some(pipeline);
        self
    }

    pub fn with_motion(mut self, gauge: Box<dyn MotionGauge>) -> Self {
        self.motion = Some(MotionPipeline {
            gauge,
            window: FrameWindow::new(),
        });
        self
    }

    /// Run the loop until shutdown is requested or a stage fails. The
    /// frame source is released on every exit path.
    pub fn run(&mut self, shutdown: &watch::Receiver<bool>) -> Result<(), DriverError> {
        let result = self.drive(shutdown);
        if let Err(err) = &result {
            error!(error = %err, "presence loop failed");
            // CameraInit already reported its own status line.
            if !matches!(err, DriverError::CameraInit) {
                let _ = self.sink.status(&format!("Presence loop failed: {err}"));
            }
        }
        self.source.stop();
        result
    }

    fn drive(&mut self, shutdown: &watch::Receiver<bool>) -> Result<(), DriverError> {
        match self.source.read()? {
            Some(frame) => {
                debug!(
                    width = frame.width,
                    height = frame.height,
                    "camera produced first frame"
                );
            }
            None => {
                self.sink.status("Camera failed to initialize! Shutting down.")?;
                return Err(DriverError::CameraInit);
            }
        }

        if let Some(pipeline) = self.motion.as_mut() {
            for _ in 0..WINDOW_SEED_FRAMES {
                let frame = self.source.read()?.ok_or(DriverError::FrameUnavailable)?;
                pipeline.window.push(frame);
            }
        }

        info!(interval = ?self.interval, "presence loop running");
        loop {
            if *shutdown.borrow() {
                info!("shutdown requested");
                self.sink.status("Shutdown: cleaning up camera...")?;
                return Ok(());
            }
            std::thread::sleep(self.interval);
            self.tick(Instant::now())?;
        }
    }

    fn tick(&mut self, now: Instant) -> Result<(), DriverError> {
        if self.face.is_none() && self.motion.is_none() {
            return Ok(());
        }

        // One shared read per tick; the motion window advances by one
        // additional fresh frame, so a tick reads the camera twice.
        let shared = self.source.read()?.ok_or(DriverError::FrameUnavailable)?;

        if let Some(pipeline) = self.motion.as_mut() {
            let fresh = self.source.read()?.ok_or(DriverError::FrameUnavailable)?;
            pipeline.window.push(fresh);
            if let Some((t0, t1, t2)) = pipeline.window.triple() {
                let score = pipeline.gauge.score(t0, t1, t2)?;
                if let Some(event) = self.motion_state.observe(score, now) {
                    self.sink.event(&event)?;
                }
            }
        }

        if let Some(pipeline) = self.face.as_mut() {
            let detection = match pipeline.finder.detect_single(&shared)? {
                Some(face) => {
                    let margin = (pipeline.margin_factor * f64::from(face.width)) as u32;
                    let crop = pipeline.finder.crop(&shared, face, margin);
                    let prediction = pipeline.classifier.predict(&crop)?;
                    Detection::Face(MatchOutcome::from_raw(
                        prediction.label,
                        prediction.confidence,
                    ))
                }
                None => Detection::NoFace,
            };
            if let Some(event) = self.session.observe(detection, now) {
                self.sink.event(&event)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use presage_vision::stub::{ScriptedClassifier, ScriptedFinder, ScriptedGauge, ScriptedSource};
    use presage_vision::{FaceBox, Frame, Prediction};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted source that counts reads and records `stop`.
    struct TrackingSource {
        inner: ScriptedSource,
        reads: Arc<AtomicUsize>,
        stopped: Arc<AtomicBool>,
    }

    impl FrameSource for TrackingSource {
        fn read(&mut self) -> Result<Option<Frame>, SourceError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read()
        }

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
            self.inner.stop();
        }
    }

    fn tracking(frames: usize) -> (TrackingSource, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicBool::new(false));
        let source = TrackingSource {
            inner: ScriptedSource::repeated(Frame::new(vec![0; 64], 8, 8), frames),
            reads: reads.clone(),
            stopped: stopped.clone(),
        };
        (source, reads, stopped)
    }

    fn policies() -> (SessionPolicy, MotionPolicy) {
        (
            SessionPolicy {
                logout_delay: Duration::ZERO,
                unknown_cooldown: Duration::from_secs(1000),
            },
            MotionPolicy {
                threshold: 500.0,
                stop_delay: Duration::ZERO,
            },
        )
    }

    fn face_pipeline(finds: Vec<Option<FaceBox>>, predictions: Vec<Prediction>) -> FacePipeline {
        FacePipeline {
            finder: Box::new(ScriptedFinder::new(finds)),
            classifier: Box::new(ScriptedClassifier::new(predictions)),
            margin_factor: 0.1,
        }
    }

    #[test]
    fn test_missing_first_frame_reports_camera_failure() {
        let sink = RecordingSink::new();
        let (source, _reads, stopped) = tracking(0);
        let (session, motion) = policies();
        let mut driver = Driver::new(
            Box::new(source),
            sink.clone(),
            Duration::ZERO,
            session,
            motion,
        );
        let (_tx, rx) = watch::channel(false);

        let result = driver.run(&rx);

        assert!(matches!(result, Err(DriverError::CameraInit)));
        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(
            sink.messages(),
            vec![(
                "status".to_string(),
                json!("Camera failed to initialize! Shutting down.")
            )]
        );
    }

    #[test]
    fn test_shutdown_request_exits_before_first_tick() {
        let sink = RecordingSink::new();
        let (source, reads, stopped) = tracking(4);
        let (session, motion) = policies();
        let mut driver = Driver::new(
            Box::new(source),
            sink.clone(),
            Duration::ZERO,
            session,
            motion,
        )
        .with_motion(Box::new(ScriptedGauge::new([])));
        let (_tx, rx) = watch::channel(true);

        let result = driver.run(&rx);

        assert!(result.is_ok());
        // One init read plus two window seeds, no tick reads.
        assert_eq!(reads.load(Ordering::SeqCst), 3);
        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(
            sink.messages(),
            vec![(
                "status".to_string(),
                json!("Shutdown: cleaning up camera...")
            )]
        );
    }

    #[test]
    fn test_two_matches_log_in_then_quiet_logs_out() {
        let sink = RecordingSink::new();
        let (source, _reads, stopped) = tracking(5);
        let (session, motion) = policies();
        let face = FaceBox {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
        };
        let mut driver = Driver::new(
            Box::new(source),
            sink.clone(),
            Duration::ZERO,
            session,
            motion,
        )
        .with_face(face_pipeline(
            vec![Some(face), Some(face), None, None],
            vec![
                Prediction {
                    label: 5,
                    confidence: 42.5,
                },
                Prediction {
                    label: 5,
                    confidence: 40.0,
                },
            ],
        ));
        let (_tx, rx) = watch::channel(false);

        let result = driver.run(&rx);

        // The source running dry ends the loop after the scripted ticks.
        assert!(matches!(result, Err(DriverError::FrameUnavailable)));
        assert!(stopped.load(Ordering::SeqCst));
        let messages = sink.messages();
        assert_eq!(
            messages[0],
            (
                "login".to_string(),
                json!({ "user": 5, "confidence": 40.0 })
            )
        );
        assert_eq!(messages[1], ("logout".to_string(), json!({ "user": 5 })));
        assert_eq!(messages[2].0, "status");
    }

    #[test]
    fn test_motion_only_reads_two_frames_per_tick() {
        let sink = RecordingSink::new();
        // 1 init + 2 seeds + 2 per tick for 3 ticks, then the dry read.
        let (source, reads, _stopped) = tracking(9);
        let (session, motion) = policies();
        let mut driver = Driver::new(
            Box::new(source),
            sink.clone(),
            Duration::ZERO,
            session,
            motion,
        )
        .with_motion(Box::new(ScriptedGauge::new([600.0, 0.0, 0.0])));
        let (_tx, rx) = watch::channel(false);

        let result = driver.run(&rx);

        assert!(matches!(result, Err(DriverError::FrameUnavailable)));
        assert_eq!(reads.load(Ordering::SeqCst), 10);
        let names = sink.names();
        assert_eq!(
            names[..2],
            ["motion-detected".to_string(), "motion-stopped".to_string()]
        );
        assert_eq!(names.last().map(String::as_str), Some("status"));
    }

    #[test]
    fn test_face_path_shares_the_tick_frame() {
        let sink = RecordingSink::new();
        // Both pipelines active must still cost two reads per tick: the
        // face path works on the shared frame.
        let (source, reads, _stopped) = tracking(7);
        let (session, motion) = policies();
        let mut driver = Driver::new(
            Box::new(source),
            sink.clone(),
            Duration::ZERO,
            session,
            motion,
        )
        .with_face(face_pipeline(vec![None, None], vec![]))
        .with_motion(Box::new(ScriptedGauge::new([0.0, 0.0])));
        let (_tx, rx) = watch::channel(false);

        let result = driver.run(&rx);

        assert!(matches!(result, Err(DriverError::FrameUnavailable)));
        // 1 init + 2 seeds + 2 ticks of 2 + the dry read.
        assert_eq!(reads.load(Ordering::SeqCst), 8);
        assert_eq!(sink.names(), vec!["status".to_string()]);
    }
}
