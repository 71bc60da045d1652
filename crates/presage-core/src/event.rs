//! Domain events and their wire representation.
//!
//! The consumer expects one JSON object per line, a single-key envelope
//! `{<name>: <payload>}`. Event names and payload keys here are the fixed
//! vocabulary of that protocol.

use serde_json::{json, Value};

use crate::types::Identity;

/// A discrete presence transition produced by the debouncers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// Motion intensity rose above the threshold after a quiet period.
    MotionDetected,
    /// Motion stayed below the threshold for the full stop delay.
    MotionStopped,
    /// A user (or the unknown identity) became present.
    Login {
        user: Identity,
        /// Model confidence of the confirming match; absent for unknown.
        confidence: Option<f64>,
    },
    /// The present user went unseen for longer than the logout delay.
    Logout { user: Identity },
}

impl Event {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Event::MotionDetected => "motion-detected",
            Event::MotionStopped => "motion-stopped",
            Event::Login { .. } => "login",
            Event::Logout { .. } => "logout",
        }
    }

    /// Wire payload. Motion events carry an empty object.
    pub fn payload(&self) -> Value {
        match self {
            Event::MotionDetected | Event::MotionStopped => json!({}),
            Event::Login { user, confidence } => json!({
                "user": user.wire_label(),
                "confidence": confidence,
            }),
            Event::Logout { user } => json!({ "user": user.wire_label() }),
        }
    }
}
