//! presage-core — presence and identity debouncing state machines.
//!
//! Raw per-tick detection results (face match, motion intensity) are noisy.
//! The debouncers in this crate turn them into discrete login, logout and
//! motion events, requiring corroboration across consecutive ticks before
//! any transition is reported.

pub mod event;
pub mod motion;
pub mod session;
pub mod types;

pub use event::Event;
pub use motion::{MotionDebouncer, MotionPolicy};
pub use session::{IdentityDebouncer, SessionPolicy};
pub use types::{Detection, Identity, MatchOutcome, UserId};
