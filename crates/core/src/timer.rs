//! Frame timing.

use std::time::{Duration, Instant};

use tracing::debug;

/// Measures per-frame delta time and reports frames-per-second once a second.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_tick: Instant,
    window_start: Instant,
    window_frames: u32,
    last_fps: f32,
}

impl FrameClock {
    /// Create a new clock, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            window_start: now,
            window_frames: 0,
            last_fps: 0.0,
        }
    }

    /// Total time since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Advance one frame and return the delta time in seconds.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        self.tick_at(now)
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.window_frames += 1;

        let window = now.saturating_duration_since(self.window_start);
        if window >= Duration::from_secs(1) {
            self.last_fps = self.window_frames as f32 / window.as_secs_f32();
            debug!("{:.1} fps", self.last_fps);
            self.window_start = now;
            self.window_frames = 0;
        }

        delta.as_secs_f32()
    }

    /// Frames-per-second measured over the last full reporting window.
    pub fn fps(&self) -> f32 {
        self.last_fps
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
