//! Mock policies for exercising the control loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use marionette_core::error::PolicyError;
use marionette_core::traits::Policy;
use marionette_core::types::{PdGains, PolicyState};

/// Shared call counters for a mock policy.
#[derive(Debug, Clone, Default)]
pub struct PolicyCounters {
    steps: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
}

impl PolicyCounters {
    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// ConstantPolicy
// ---------------------------------------------------------------------------

/// Returns the same target every tick.
pub struct ConstantPolicy {
    target: Vec<f32>,
    gains: Option<PdGains>,
    counters: PolicyCounters,
}

impl ConstantPolicy {
    pub fn new(target: Vec<f32>) -> Self {
        Self {
            target,
            gains: None,
            counters: PolicyCounters::default(),
        }
    }

    /// Ship per-policy PD gains.
    #[must_use]
    pub fn with_gains(mut self, gains: PdGains) -> Self {
        self.gains = Some(gains);
        self
    }

    pub fn counters(&self) -> PolicyCounters {
        self.counters.clone()
    }
}

#[async_trait]
impl Policy for ConstantPolicy {
    async fn step(&mut self, _state: &PolicyState) -> Result<Option<Vec<f32>>, PolicyError> {
        self.counters.steps.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.target.clone()))
    }

    async fn reset(&mut self, _state: &PolicyState) -> Result<(), PolicyError> {
        self.counters.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ConstantPolicy"
    }

    fn pd_gains(&self) -> Option<&PdGains> {
        self.gains.as_ref()
    }
}

// ---------------------------------------------------------------------------
// SilentPolicy
// ---------------------------------------------------------------------------

/// Never produces an action.
#[derive(Default)]
pub struct SilentPolicy {
    counters: PolicyCounters,
}

impl SilentPolicy {
    pub fn counters(&self) -> PolicyCounters {
        self.counters.clone()
    }
}

#[async_trait]
impl Policy for SilentPolicy {
    async fn step(&mut self, _state: &PolicyState) -> Result<Option<Vec<f32>>, PolicyError> {
        self.counters.steps.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn reset(&mut self, _state: &PolicyState) -> Result<(), PolicyError> {
        self.counters.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "SilentPolicy"
    }
}

// ---------------------------------------------------------------------------
// FailingPolicy
// ---------------------------------------------------------------------------

/// Fails inference, and optionally reset.
pub struct FailingPolicy {
    fail_reset: bool,
    counters: PolicyCounters,
}

impl FailingPolicy {
    /// Fails `step`; `reset` succeeds.
    pub fn on_step() -> Self {
        Self {
            fail_reset: false,
            counters: PolicyCounters::default(),
        }
    }

    /// Fails both `step` and `reset`.
    pub fn always() -> Self {
        Self {
            fail_reset: true,
            counters: PolicyCounters::default(),
        }
    }

    pub fn counters(&self) -> PolicyCounters {
        self.counters.clone()
    }
}

#[async_trait]
impl Policy for FailingPolicy {
    async fn step(&mut self, _state: &PolicyState) -> Result<Option<Vec<f32>>, PolicyError> {
        self.counters.steps.fetch_add(1, Ordering::SeqCst);
        Err(PolicyError::Inference("backend crashed".into()))
    }

    async fn reset(&mut self, _state: &PolicyState) -> Result<(), PolicyError> {
        self.counters.resets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reset {
            return Err(PolicyError::Reset("history buffer corrupted".into()));
        }
        Ok(())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "FailingPolicy"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
