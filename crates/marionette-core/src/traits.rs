use async_trait::async_trait;

use crate::error::PolicyError;
use crate::types::{PdGains, PolicyState};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// A stateful controller producing target joint positions from robot state.
///
/// `step` may suspend (e.g. while an inference backend runs). Returning
/// `Ok(None)` means the policy had no action this tick; the loop skips that
/// robot. Returning `Err` stops the loop.
#[async_trait]
pub trait Policy: Send {
    /// Produce raw target joint positions for the current state.
    async fn step(&mut self, state: &PolicyState) -> Result<Option<Vec<f32>>, PolicyError>;

    /// Reset internal state (history buffers, phase, motion cursor).
    async fn reset(&mut self, state: &PolicyState) -> Result<(), PolicyError>;

    /// Human-readable name for this policy.
    fn name(&self) -> &str;

    /// PD gains shipped with the policy, overriding the loop's global gains.
    fn pd_gains(&self) -> Option<&PdGains> {
        None
    }

    /// Named-motion tracking capability, if the policy supports it.
    fn tracking(&mut self) -> Option<&mut dyn MotionTracking> {
        None
    }
}

// ---------------------------------------------------------------------------
// MotionTracking
// ---------------------------------------------------------------------------

/// Optional capability of policies that track named reference motions.
pub trait MotionTracking: Send {
    /// Names of the motions this policy knows.
    fn motions(&self) -> Vec<&str>;

    /// Whether `name` is a known motion.
    fn has_motion(&self, name: &str) -> bool {
        self.motions().iter().any(|m| *m == name)
    }

    /// Ask to start `name`, subject to the policy's own gating.
    fn request_motion(&mut self, name: &str, state: &PolicyState) -> bool;

    /// Start `name` immediately from the current state, bypassing gating.
    fn force_motion(&mut self, name: &str, state: &PolicyState) -> bool;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
