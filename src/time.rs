//! Frame timing for the step loop.
//!
//! The engine ticks a [`FrameClock`] once per presented frame and hands the
//! resulting [`FrameInfo`] to its delegate.
//!
//! # Example
//!
//! ```
//! use particle_lab::time::FrameClock;
//!
//! let mut clock = FrameClock::new();
//! let info = clock.tick();
//! assert_eq!(info.frame, 1);
//! ```

use std::time::{Duration, Instant};

/// Snapshot of the clock after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameInfo {
    /// Frames presented so far, including this one.
    pub frame: u64,
    /// Seconds since the clock started.
    pub elapsed: f32,
    /// Seconds since the previous tick.
    pub delta: f32,
    /// Frames per second, refreshed every half second.
    pub fps: f32,
}

/// Counts presented frames and estimates the frame rate.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_frame: Instant,
    frame_count: u64,
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
        }
    }

    /// Record one presented frame.
    pub fn tick(&mut self) -> FrameInfo {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frame_count += 1;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
            log::trace!("{:.1} fps at frame {}", self.fps, self.frame_count);
        }

        FrameInfo {
            frame: self.frame_count,
            elapsed: now.duration_since(self.start).as_secs_f32(),
            delta,
            fps: self.fps,
        }
    }

    /// Frames ticked so far.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clock_new() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.fps(), 0.0);
    }

    #[test]
    fn test_tick_counts_frames() {
        let mut clock = FrameClock::new();
        thread::sleep(Duration::from_millis(10));
        let info = clock.tick();
        assert_eq!(info.frame, 1);
        assert!(info.delta > 0.0);
        assert!(info.elapsed >= info.delta);
        assert_eq!(clock.tick().frame, 2);
    }

    #[test]
    fn test_fps_updates_after_interval() {
        let mut clock = FrameClock::new();
        clock.tick();
        thread::sleep(Duration::from_millis(520));
        let info = clock.tick();
        assert!(info.fps > 0.0);
    }
}
