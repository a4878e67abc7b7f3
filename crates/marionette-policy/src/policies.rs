//! Basic policy implementations.
//!
//! All policies implement [`Policy`] from `marionette-core`.

use async_trait::async_trait;
use marionette_core::error::PolicyError;
use marionette_core::layout::ActionLayout;
use marionette_core::traits::Policy;
use marionette_core::types::{PdGains, PolicyState};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ---------------------------------------------------------------------------
// HoldPosePolicy
// ---------------------------------------------------------------------------

/// Policy that always targets the same pose.
pub struct HoldPosePolicy {
    pose: Vec<f32>,
    gains: Option<PdGains>,
}

impl HoldPosePolicy {
    pub const fn new(pose: Vec<f32>) -> Self {
        Self { pose, gains: None }
    }

    /// Hold the layout's default pose with the layout's gains.
    pub fn from_layout(layout: &ActionLayout) -> Self {
        Self {
            pose: layout.default_pose(),
            gains: layout.gains(),
        }
    }

    #[must_use]
    pub fn with_gains(mut self, gains: PdGains) -> Self {
        self.gains = Some(gains);
        self
    }

    pub fn pose(&self) -> &[f32] {
        &self.pose
    }
}

#[async_trait]
impl Policy for HoldPosePolicy {
    async fn step(&mut self, _state: &PolicyState) -> Result<Option<Vec<f32>>, PolicyError> {
        Ok(Some(self.pose.clone()))
    }

    async fn reset(&mut self, _state: &PolicyState) -> Result<(), PolicyError> {
        Ok(())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "HoldPosePolicy"
    }

    fn pd_gains(&self) -> Option<&PdGains> {
        self.gains.as_ref()
    }
}

// ---------------------------------------------------------------------------
// ScriptedPolicy
// ---------------------------------------------------------------------------

/// Policy that replays a fixed sequence of targets, cycling when exhausted.
pub struct ScriptedPolicy {
    targets: Vec<Vec<f32>>,
    index: usize,
}

impl ScriptedPolicy {
    /// Create a scripted policy from a sequence of targets.
    ///
    /// # Panics
    ///
    /// Panics if `targets` is empty.
    pub fn new(targets: Vec<Vec<f32>>) -> Self {
        assert!(
            !targets.is_empty(),
            "ScriptedPolicy requires at least one target"
        );
        Self { targets, index: 0 }
    }

    /// Index of the target the next `step` returns.
    pub const fn cursor(&self) -> usize {
        self.index
    }
}

#[async_trait]
impl Policy for ScriptedPolicy {
    async fn step(&mut self, _state: &PolicyState) -> Result<Option<Vec<f32>>, PolicyError> {
        let target = self.targets[self.index].clone();
        self.index = (self.index + 1) % self.targets.len();
        Ok(Some(target))
    }

    async fn reset(&mut self, _state: &PolicyState) -> Result<(), PolicyError> {
        self.index = 0;
        Ok(())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ScriptedPolicy"
    }
}

// ---------------------------------------------------------------------------
// RandomPolicy
// ---------------------------------------------------------------------------

/// Policy that samples targets uniformly around a center pose.
///
/// Uses a seeded RNG for determinism; `reset` reseeds it.
pub struct RandomPolicy {
    center: Vec<f32>,
    amplitude: f32,
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    /// Targets in `center[i] ± amplitude`.
    pub fn new(center: Vec<f32>, amplitude: f32, seed: u64) -> Self {
        Self {
            center,
            amplitude: amplitude.abs(),
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

#[async_trait]
impl Policy for RandomPolicy {
    async fn step(&mut self, _state: &PolicyState) -> Result<Option<Vec<f32>>, PolicyError> {
        let a = self.amplitude;
        let target = self
            .center
            .iter()
            .map(|&c| c + self.rng.gen_range(-a..=a))
            .collect();
        Ok(Some(target))
    }

    async fn reset(&mut self, _state: &PolicyState) -> Result<(), PolicyError> {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        Ok(())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "RandomPolicy"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
