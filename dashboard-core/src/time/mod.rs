//! Wall-clock timing module
//!
//! Frames are stamped with their receipt time. The clock is injected so that
//! tests and offline replays can control the timeline.

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
