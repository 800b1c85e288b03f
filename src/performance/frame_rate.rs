//! Windowed frames-per-second measurement.

use web_time::Duration;

/// Frame counter that reports frames per second once per measurement
/// window, plus an exponentially smoothed rate for display.
#[derive(Debug, Clone)]
pub struct FrameRate {
    /// Length of one measurement window in milliseconds.
    window_ms: f64,
    /// Timestamp the current window started at.
    window_start: f64,
    /// Timestamp of the previous frame.
    last_frame: f64,
    /// Frames seen in the current window.
    frames: u32,
    /// Rate of the last completed window.
    last_fps: Option<u32>,
    /// Smoothed FPS using exponential moving average
    smoothed_fps: f32,
    /// Smoothing factor (lower = smoother, 0.0-1.0)
    smoothing: f32,
}

impl FrameRate {
    /// Counter whose first window opens at `started_at` (ms).
    pub fn new(started_at: f64, window: Duration) -> Self {
        Self {
            window_ms: window.as_secs_f64() * 1000.0,
            window_start: started_at,
            last_frame: started_at,
            frames: 0,
            last_fps: None,
            smoothed_fps: 60.0,
            smoothing: 0.25,
        }
    }

    /// Drop the current window and open a new one at `at` (ms).
    pub fn restart(&mut self, at: f64) {
        self.window_start = at;
        self.last_frame = at;
        self.frames = 0;
    }

    /// Count a frame at `timestamp` (ms). Returns the window's rate when
    /// this frame closes it.
    ///
    /// A gap between two frames longer than a whole window discards the
    /// window instead of reporting it. Hidden pages receive no frames.
    pub fn record(&mut self, timestamp: f64) -> Option<u32> {
        if timestamp - self.last_frame > self.window_ms {
            self.restart(timestamp);
            return None;
        }
        self.last_frame = timestamp;
        self.frames += 1;
        let elapsed = timestamp - self.window_start;
        if elapsed < self.window_ms || elapsed <= 0.0 {
            return None;
        }
        let fps = (f64::from(self.frames) * 1000.0 / elapsed).round() as u32;
        self.smoothed_fps = self.smoothed_fps * (1.0 - self.smoothing)
            + fps as f32 * self.smoothing;
        self.frames = 0;
        self.window_start = timestamp;
        self.last_fps = Some(fps);
        Some(fps)
    }

    /// Rate of the most recent completed window.
    pub fn last(&self) -> Option<u32> {
        self.last_fps
    }

    /// Get the current FPS (smoothed)
    pub fn smoothed(&self) -> f32 {
        self.smoothed_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_window() {
        let mut rate = FrameRate::new(0.0, Duration::from_secs(1));
        let mut reports = Vec::new();
        for i in 1..=120 {
            if let Some(fps) = rate.record(f64::from(i) * 20.0) {
                reports.push(fps);
            }
        }
        assert_eq!(reports, vec![50, 50]);
        assert_eq!(rate.last(), Some(50));
    }

    #[test]
    fn slow_frames_report_a_low_rate() {
        let mut rate = FrameRate::new(0.0, Duration::from_secs(1));
        let reported = (1..=20).find_map(|i| rate.record(f64::from(i) * 50.0));
        assert_eq!(reported, Some(20));
        assert!(rate.smoothed() < 60.0);
    }

    #[test]
    fn a_gap_without_frames_is_not_a_slow_window() {
        let mut rate = FrameRate::new(0.0, Duration::from_secs(1));
        for i in 1..=30 {
            assert_eq!(rate.record(f64::from(i) * 16.0), None);
        }
        assert_eq!(rate.record(5480.0), None);
        assert_eq!(rate.record(5496.0), None);
        assert_eq!(rate.last(), None);

        let reported = (2..=70).find_map(|i| rate.record(5480.0 + f64::from(i) * 16.0));
        assert_eq!(reported, Some(63));
    }

    #[test]
    fn restart_opens_a_fresh_window() {
        let mut rate = FrameRate::new(0.0, Duration::from_secs(1));
        for i in 1..=10 {
            let _ = rate.record(f64::from(i) * 16.0);
        }
        rate.restart(900.0);
        assert_eq!(rate.record(1100.0), None);
        assert_eq!(rate.record(1900.0), Some(2));
    }

    #[test]
    fn nothing_before_the_window_closes() {
        let mut rate = FrameRate::new(100.0, Duration::from_secs(1));
        assert_eq!(rate.record(116.0), None);
        assert_eq!(rate.record(1099.0), None);
        assert_eq!(rate.last(), None);
    }
}
