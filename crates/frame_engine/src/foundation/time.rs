//! Time management utilities

use std::time::{Duration, Instant};

/// Longest frame time handed to the simulation, in seconds
pub const MAX_FRAME_TIME: f32 = 0.33;

/// Per-frame clock that clamps large gaps
///
/// A window drag or a minimized window can stall the loop for seconds; the
/// clamp keeps camera movement and light rotation from jumping when it resumes.
pub struct FrameClock {
    last_frame: Instant,
    max_frame_time: f32,
    frame_count: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(MAX_FRAME_TIME)
    }
}

impl FrameClock {
    /// Create a clock starting now
    pub fn new(max_frame_time: f32) -> Self {
        Self {
            last_frame: Instant::now(),
            max_frame_time,
            frame_count: 0,
        }
    }

    /// Advance to `now` and return the clamped frame time in seconds
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        self.frame_count += 1;
        clamp_frame_time(elapsed, self.max_frame_time)
    }

    /// Advance to the current instant
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// Number of ticks so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Clamp an elapsed duration to `max_seconds`
pub fn clamp_frame_time(elapsed: Duration, max_seconds: f32) -> f32 {
    elapsed.as_secs_f32().min(max_seconds)
}
