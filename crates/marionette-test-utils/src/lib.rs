//! Shared test fixtures and utilities for Marionette crates.
//!
//! Provides a biped scene template and matching model metadata, an
//! array-backed [`MockPhysics`], mock policies and deterministic RNG setup.

pub mod fixtures;
pub mod physics;
pub mod policies;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use fixtures::{BIPED_JOINTS, BIPED_MJCF, biped_layout, biped_model, spawn_row};
pub use physics::{AppliedForce, MockPhysics, PhysicsProbe};
pub use policies::{ConstantPolicy, FailingPolicy, PolicyCounters, SilentPolicy};
pub use rng::{deterministic_vec, seeded_rng};
