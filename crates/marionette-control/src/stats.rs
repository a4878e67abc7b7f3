//! Rolling simulation-rate measurement.
//!
//! [`SimRate`] accumulates physics steps and simulated time over a fixed
//! wall-clock window and publishes the rates once the window closes.

use std::time::Duration;

use tokio::time::Instant;

// ---------------------------------------------------------------------------
// SimRate
// ---------------------------------------------------------------------------

/// Physics steps per second and real-time factor over a rolling window.
#[derive(Clone, Debug)]
pub struct SimRate {
    window: Duration,
    window_start: Option<Instant>,
    steps: u64,
    sim_time: f64,
    steps_per_sec: f64,
    realtime_factor: f64,
}

impl SimRate {
    /// Meter that recomputes its rates every `window`.
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: None,
            steps: 0,
            sim_time: 0.0,
            steps_per_sec: 0.0,
            realtime_factor: 0.0,
        }
    }

    /// Record `steps` physics steps of `dt` seconds each, finished at `now`.
    ///
    /// The first call after construction or [`reset`](Self::reset) only
    /// opens a window.
    #[allow(clippy::cast_precision_loss)]
    pub fn record(&mut self, now: Instant, steps: usize, dt: f64) {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return;
        };
        self.steps += steps as u64;
        self.sim_time += steps as f64 * dt;

        let elapsed = now.saturating_duration_since(start);
        if elapsed >= self.window {
            let secs = elapsed.as_secs_f64();
            self.steps_per_sec = self.steps as f64 / secs;
            self.realtime_factor = self.sim_time / secs;
            self.window_start = Some(now);
            self.steps = 0;
            self.sim_time = 0.0;
        }
    }

    /// Drop the open window and zero the published rates.
    pub const fn reset(&mut self) {
        self.window_start = None;
        self.steps = 0;
        self.sim_time = 0.0;
        self.steps_per_sec = 0.0;
        self.realtime_factor = 0.0;
    }

    /// Physics steps per wall-clock second over the last closed window.
    pub const fn steps_per_sec(&self) -> f64 {
        self.steps_per_sec
    }

    /// Simulated seconds per wall-clock second over the last closed window.
    pub const fn realtime_factor(&self) -> f64 {
        self.realtime_factor
    }

    pub const fn window(&self) -> Duration {
        self.window
    }
}

impl Default for SimRate {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn rates_start_at_zero() {
        let rate = SimRate::default();
        assert_eq!(rate.window(), Duration::from_millis(500));
        assert_relative_eq!(rate.steps_per_sec(), 0.0);
        assert_relative_eq!(rate.realtime_factor(), 0.0);
    }

    #[test]
    fn rates_published_when_window_closes() {
        let mut rate = SimRate::new(Duration::from_millis(500));
        let t0 = Instant::now();
        rate.record(t0, 5, 0.004);
        // 25 ticks of 5 steps at 20 ms each = 500 ms.
        for i in 1..=24 {
            rate.record(t0 + Duration::from_millis(20 * i), 5, 0.004);
            assert_relative_eq!(rate.steps_per_sec(), 0.0);
        }
        rate.record(t0 + Duration::from_millis(500), 5, 0.004);
        assert_relative_eq!(rate.steps_per_sec(), 250.0, epsilon = 1e-9);
        assert_relative_eq!(rate.realtime_factor(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn slow_wall_clock_lowers_realtime_factor() {
        let mut rate = SimRate::new(Duration::from_millis(100));
        let t0 = Instant::now();
        rate.record(t0, 5, 0.004);
        rate.record(t0 + Duration::from_millis(200), 5, 0.004);
        // 20 ms simulated in 200 ms.
        assert_relative_eq!(rate.realtime_factor(), 0.1, epsilon = 1e-9);
        assert_relative_eq!(rate.steps_per_sec(), 25.0, epsilon = 1e-9);
    }

    #[test]
    fn reset_clears_rates() {
        let mut rate = SimRate::new(Duration::from_millis(10));
        let t0 = Instant::now();
        rate.record(t0, 1, 0.01);
        rate.record(t0 + Duration::from_millis(10), 1, 0.01);
        assert!(rate.steps_per_sec() > 0.0);
        rate.reset();
        assert_relative_eq!(rate.steps_per_sec(), 0.0);
        // Next record only reopens the window.
        rate.record(t0 + Duration::from_millis(20), 1, 0.01);
        assert_relative_eq!(rate.steps_per_sec(), 0.0);
    }
}
