//! Frame time base.
//!
//! All scheduling and logging is frame-indexed at a fixed 60 frames per
//! second.

/// Simulation frame index.
pub type Frame = u32;

/// Frames per simulated second.
pub const FRAMES_PER_SECOND: u32 = 60;

/// Converts seconds to whole frames, rounding to the nearest frame.
#[must_use]
pub fn seconds_to_frames(seconds: f64) -> Frame {
    if seconds <= 0.0 {
        0
    } else {
        (seconds * f64::from(FRAMES_PER_SECOND)).round() as Frame
    }
}

/// Converts frames to seconds.
#[must_use]
pub fn frames_to_seconds(frames: Frame) -> f64 {
    f64::from(frames) / f64::from(FRAMES_PER_SECOND)
}
