use serde::{Deserialize, Serialize};

/// Raw label recognition models reserve for negative training samples.
pub const LABEL_NEGATIVE: i32 = 0;

/// Raw label recognition models report when the best match was rejected by
/// the acceptance-confidence threshold.
pub const LABEL_REJECTED: i32 = -1;

/// Identity label of a trained user.
///
/// Always positive; `0` stands for the unknown identity on the event wire
/// and negative labels never name a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(i32);

impl UserId {
    /// Build from a raw model label. Returns `None` for the reserved
    /// non-user labels (zero and negatives).
    pub fn from_label(label: i32) -> Option<UserId> {
        if label > 0 {
            Some(UserId(label))
        } else {
            None
        }
    }

    /// The raw integer label.
    pub fn label(&self) -> i32 {
        self.0
    }
}

/// Who the debouncer considers present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    /// A trained user, confirmed by consecutive matches.
    Known(UserId),
    /// Somebody is in front of the camera but the model does not know them.
    Unknown,
}

impl Identity {
    /// Integer form used on the event wire; the unknown identity is `0`.
    pub fn wire_label(&self) -> i32 {
        match self {
            Identity::Known(user) => user.label(),
            Identity::Unknown => 0,
        }
    }
}

/// Verdict of the recognition model for one cropped face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchOutcome {
    /// Confident match of a trained user.
    Match { user: UserId, confidence: f64 },
    /// The face matched the negative training samples (raw label `0`).
    NegativeSample,
    /// Best match was rejected by the confidence threshold (raw label `-1`).
    RejectedByThreshold,
}

impl MatchOutcome {
    /// Map a raw `(label, confidence)` pair from a recognition model.
    ///
    /// Zero is the negative-sample label and any negative label means the
    /// threshold rejected the match; both are treated as an unknown person
    /// by the state machine.
    pub fn from_raw(label: i32, confidence: f64) -> MatchOutcome {
        match UserId::from_label(label) {
            Some(user) => MatchOutcome::Match { user, confidence },
            None if label == LABEL_NEGATIVE => MatchOutcome::NegativeSample,
            None => MatchOutcome::RejectedByThreshold,
        }
    }

    /// Whether the state machine treats this outcome as an unknown person.
    pub fn is_unknown(&self) -> bool {
        !matches!(self, MatchOutcome::Match { .. })
    }
}

/// Per-tick input to the identity debouncer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    /// No face found in the frame.
    NoFace,
    /// A face was found and classified.
    Face(MatchOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_rejects_reserved_labels() {
        assert_eq!(UserId::from_label(0), None);
        assert_eq!(UserId::from_label(-1), None);
        assert_eq!(UserId::from_label(-42), None);
        assert_eq!(UserId::from_label(3).map(|u| u.label()), Some(3));
    }

    #[test]
    fn test_from_raw_positive_label_is_match() {
        let outcome = MatchOutcome::from_raw(5, 67.2);
        match outcome {
            MatchOutcome::Match { user, confidence } => {
                assert_eq!(user.label(), 5);
                assert!((confidence - 67.2).abs() < 1e-9);
            }
            other => panic!("expected match, got {other:?}"),
        }
        assert!(!outcome.is_unknown());
    }

    #[test]
    fn test_from_raw_sentinels() {
        assert_eq!(MatchOutcome::from_raw(0, 0.0), MatchOutcome::NegativeSample);
        assert_eq!(MatchOutcome::from_raw(-1, 99.0), MatchOutcome::RejectedByThreshold);
        // Any negative label counts as a threshold rejection.
        assert_eq!(MatchOutcome::from_raw(-7, 0.0), MatchOutcome::RejectedByThreshold);
        assert!(MatchOutcome::from_raw(0, 0.0).is_unknown());
        assert!(MatchOutcome::from_raw(-1, 0.0).is_unknown());
    }

    #[test]
    fn test_wire_labels() {
        let user = UserId::from_label(11).unwrap();
        assert_eq!(Identity::Known(user).wire_label(), 11);
        assert_eq!(Identity::Unknown.wire_label(), 0);
    }
}
