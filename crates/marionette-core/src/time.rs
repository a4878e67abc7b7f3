use std::time::Duration;

// ---------------------------------------------------------------------------
// Decimation
// ---------------------------------------------------------------------------

/// Number of physics sub-steps per policy invocation.
///
/// `max(1, round(control_dt / physics_dt))`. Non-positive or non-finite
/// inputs yield 1.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn decimation(control_dt: f64, physics_dt: f64) -> usize {
    let ratio = control_dt / physics_dt;
    if !ratio.is_finite() || ratio <= 0.0 {
        return 1;
    }
    (ratio.round() as usize).max(1)
}

// ---------------------------------------------------------------------------
// LoopTiming
// ---------------------------------------------------------------------------

/// Derived timing of one control tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopTiming {
    /// Physics timestep in seconds.
    pub physics_dt: f64,
    /// Policy period in seconds.
    pub control_dt: f64,
    /// Physics sub-steps per tick.
    pub decimation: usize,
}

impl LoopTiming {
    pub fn new(physics_dt: f64, control_dt: f64) -> Self {
        Self {
            physics_dt,
            control_dt,
            decimation: decimation(control_dt, physics_dt),
        }
    }

    /// Nominal wall-clock length of one tick: `physics_dt * decimation`.
    ///
    /// Saturates at `Duration::MAX` when the product does not fit, and is
    /// zero for NaN or negative products.
    #[allow(clippy::cast_precision_loss)]
    pub fn tick_period(&self) -> Duration {
        let secs = self.physics_dt * self.decimation as f64;
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Time left in the tick after `elapsed` has been spent, never negative.
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.tick_period().saturating_sub(elapsed)
    }

    /// Policy rate in Hz.
    pub fn control_hz(&self) -> f64 {
        1.0 / self.control_dt
    }

    /// Physics rate in Hz.
    pub fn physics_hz(&self) -> f64 {
        1.0 / self.physics_dt
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
