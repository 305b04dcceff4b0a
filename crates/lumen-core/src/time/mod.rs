//! Frame timing.
//!
//! Each context owns a `FrameClock`; BeginFrame ticks it and uses the clamped
//! delta when the caller does not supply one.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
