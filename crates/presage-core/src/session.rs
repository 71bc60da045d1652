//! Identity debounce state machine.
//!
//! A single frame can misclassify a user, miss a face during movement, or
//! reject a known face on a bad angle. The debouncer requires corroboration
//! before reporting identity changes: two consecutive identical matches for
//! a login, a sustained quiet period for a logout, and a cooldown before
//! conceding that a visible face belongs to a stranger.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::event::Event;
use crate::types::{Detection, Identity, MatchOutcome, UserId};

/// Consecutive identical matches required before a login is reported.
const LOGIN_STREAK: u8 = 2;

/// Timing knobs for the identity debouncer.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// Continuous no-face time before the present user is logged out.
    pub logout_delay: Duration,
    /// Minimum time since the last positive detection before a
    /// non-matching face may be reported as the unknown identity.
    pub unknown_cooldown: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        SessionPolicy {
            logout_delay: Duration::from_secs(15),
            unknown_cooldown: Duration::from_secs(5),
        }
    }
}

/// Debounces raw face-match results into login and logout events.
///
/// All state lives for the process lifetime; nothing persists across
/// restarts. Time is injected per tick so transitions can be tested
/// without sleeping.
#[derive(Debug)]
pub struct IdentityDebouncer {
    policy: SessionPolicy,
    /// Who is currently logged in, if anyone.
    current: Option<Identity>,
    /// Most recent raw match; may differ from `current`.
    last_match: Option<UserId>,
    /// Consecutive sightings of `last_match`, saturating at `LOGIN_STREAK`.
    streak: u8,
    /// Time of the last positive or unknown detection. The baseline is the
    /// construction instant, which arms the unknown cooldown at startup.
    login_at: Instant,
}

impl IdentityDebouncer {
    pub fn new(policy: SessionPolicy, now: Instant) -> Self {
        IdentityDebouncer {
            policy,
            current: None,
            last_match: None,
            streak: 0,
            login_at: now,
        }
    }

    /// Who is currently considered present.
    pub fn current(&self) -> Option<Identity> {
        self.current
    }

    /// Advance the machine by one tick. Returns at most one event; a login
    /// and a logout can never fire on the same tick.
    pub fn observe(&mut self, detection: Detection, now: Instant) -> Option<Event> {
        match detection {
            Detection::NoFace => self.observe_absence(now),
            Detection::Face(MatchOutcome::Match { user, confidence }) => {
                self.observe_match(user, confidence, now)
            }
            Detection::Face(_) => self.observe_unknown(now),
        }
    }

    /// No face in the frame: log the present user out once the quiet
    /// period outlasts the logout delay. A single quiet tick right after a
    /// match never logs anyone out.
    fn observe_absence(&mut self, now: Instant) -> Option<Event> {
        let user = self.current?;
        if now.saturating_duration_since(self.login_at) > self.policy.logout_delay {
            self.streak = 0;
            self.current = None;
            debug!(user = user.wire_label(), "quiet period elapsed, logging out");
            return Some(Event::Logout { user });
        }
        None
    }

    /// A confident match: refresh the session and report a login on the
    /// second consecutive sighting of the same label.
    fn observe_match(&mut self, user: UserId, confidence: f64, now: Instant) -> Option<Event> {
        self.login_at = now;
        if self.last_match == Some(user) {
            self.streak = (self.streak + 1).min(LOGIN_STREAK);
        } else {
            self.streak = 1;
        }
        self.last_match = Some(user);
        if self.current != Some(Identity::Known(user)) && self.streak >= LOGIN_STREAK {
            self.current = Some(Identity::Known(user));
            debug!(user = user.label(), confidence, "consecutive matches confirmed, logging in");
            return Some(Event::Login {
                user: Identity::Known(user),
                confidence: Some(confidence),
            });
        }
        None
    }

    /// An unrecognized face: report the unknown identity only once the
    /// cooldown since the last positive detection has elapsed, so a known
    /// user briefly matched badly (turning, moving) is not demoted.
    ///
    /// `last_match` and the streak are intentionally left untouched: a
    /// confident run survives an unknown interlude, and a single
    /// re-sighting of that user logs them straight back in.
    fn observe_unknown(&mut self, now: Instant) -> Option<Event> {
        if self.current == Some(Identity::Unknown) {
            return None;
        }
        if now.saturating_duration_since(self.login_at) > self.policy.unknown_cooldown {
            self.login_at = now;
            self.current = Some(Identity::Unknown);
            debug!("unrecognized face held steady, logging in unknown");
            return Some(Event::Login { user: Identity::Unknown, confidence: None });
        }
        None
    }
}
