//! Motion debounce.
//!
//! A tick whose intensity clears the threshold marks motion. The return to
//! "stopped" is itself debounced: the quiet period must outlast the stop
//! delay, so a single calm frame never ends a motion run.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::event::Event;

/// Knobs for the motion debouncer.
#[derive(Debug, Clone, Copy)]
pub struct MotionPolicy {
    /// Intensity above which a tick counts as motion. Units are whatever
    /// the configured gauge produces (changed pixels, contour area).
    pub threshold: f64,
    /// Quiet time required before motion is reported as stopped.
    pub stop_delay: Duration,
}

impl Default for MotionPolicy {
    fn default() -> Self {
        MotionPolicy {
            threshold: 500.0,
            stop_delay: Duration::from_secs(120),
        }
    }
}

/// Debounces per-tick motion intensities into detected/stopped events.
#[derive(Debug)]
pub struct MotionDebouncer {
    policy: MotionPolicy,
    /// Time of the most recent above-threshold tick; `None` while idle.
    last_motion: Option<Instant>,
}

impl MotionDebouncer {
    pub fn new(policy: MotionPolicy) -> Self {
        MotionDebouncer { policy, last_motion: None }
    }

    /// Whether a motion run is currently active.
    pub fn active(&self) -> bool {
        self.last_motion.is_some()
    }

    /// Advance the machine by one tick. At most one event per call:
    /// `MotionDetected` on the first tick of a run, `MotionStopped` once
    /// the quiet period outlasts the stop delay.
    pub fn observe(&mut self, intensity: f64, now: Instant) -> Option<Event> {
        if intensity > self.policy.threshold {
            let event = if self.last_motion.is_none() {
                debug!(intensity, "motion run started");
                Some(Event::MotionDetected)
            } else {
                None
            };
            self.last_motion = Some(now);
            return event;
        }
        if let Some(last) = self.last_motion {
            if now.saturating_duration_since(last) > self.policy.stop_delay {
                self.last_motion = None;
                debug!("quiet period elapsed, motion stopped");
                return Some(Event::MotionStopped);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(threshold: f64, stop_secs: u64) -> MotionPolicy {
        MotionPolicy {
            threshold,
            stop_delay: Duration::from_secs(stop_secs),
        }
    }

    fn at(base: Instant, secs: f64) -> Instant {
        base + Duration::from_secs_f64(secs)
    }

    #[test]
    fn test_detected_once_per_contiguous_run() {
        let base = Instant::now();
        let mut motion = MotionDebouncer::new(policy(100.0, 10));

        assert_eq!(motion.observe(500.0, at(base, 1.0)), Some(Event::MotionDetected));
        assert_eq!(motion.observe(700.0, at(base, 2.0)), None);
        assert_eq!(motion.observe(101.0, at(base, 3.0)), None);
        assert!(motion.active());
    }

    #[test]
    fn test_threshold_is_strict() {
        let base = Instant::now();
        let mut motion = MotionDebouncer::new(policy(100.0, 10));

        assert_eq!(motion.observe(100.0, at(base, 1.0)), None);
        assert!(!motion.active());
        assert_eq!(motion.observe(100.1, at(base, 2.0)), Some(Event::MotionDetected));
    }

    #[test]
    fn test_stop_requires_sustained_quiet() {
        let base = Instant::now();
        let mut motion = MotionDebouncer::new(policy(100.0, 10));

        motion.observe(500.0, at(base, 1.0));
        // Quiet, but not for long enough.
        assert_eq!(motion.observe(0.0, at(base, 5.0)), None);
        assert_eq!(motion.observe(0.0, at(base, 11.0)), None);
        // Strictly past the stop delay.
        assert_eq!(motion.observe(0.0, at(base, 11.5)), Some(Event::MotionStopped));
        assert!(!motion.active());
    }

    #[test]
    fn test_refresh_keeps_run_alive() {
        let base = Instant::now();
        let mut motion = MotionDebouncer::new(policy(100.0, 10));

        motion.observe(500.0, at(base, 1.0));
        // New motion inside the quiet window restarts the stop clock and
        // emits nothing.
        assert_eq!(motion.observe(500.0, at(base, 9.0)), None);
        assert_eq!(motion.observe(0.0, at(base, 18.0)), None);
        assert_eq!(motion.observe(0.0, at(base, 19.5)), Some(Event::MotionStopped));
    }

    #[test]
    fn test_new_run_after_stop_fires_again() {
        let base = Instant::now();
        let mut motion = MotionDebouncer::new(policy(100.0, 10));

        assert_eq!(motion.observe(500.0, at(base, 1.0)), Some(Event::MotionDetected));
        assert_eq!(motion.observe(0.0, at(base, 12.0)), Some(Event::MotionStopped));
        assert_eq!(motion.observe(500.0, at(base, 13.0)), Some(Event::MotionDetected));
    }

    #[test]
    fn test_stop_fires_only_once() {
        let base = Instant::now();
        let mut motion = MotionDebouncer::new(policy(100.0, 10));

        motion.observe(500.0, at(base, 1.0));
        assert_eq!(motion.observe(0.0, at(base, 12.0)), Some(Event::MotionStopped));
        assert_eq!(motion.observe(0.0, at(base, 13.0)), None);
        assert_eq!(motion.observe(0.0, at(base, 30.0)), None);
    }
}
