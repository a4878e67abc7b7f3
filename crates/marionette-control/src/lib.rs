//! Real-time control loop for policy-driven robots.
//!
//! [`ControlLoop`] couples one or more [`Policy`](marionette_core::traits::Policy)
//! implementations to a [`Physics`](marionette_core::physics::Physics) engine:
//! per tick it samples state, awaits inference, applies PD control and any
//! interactive drag over `decimation` physics sub-steps, publishes a
//! [`PoseSnapshot`] and paces itself to wall-clock time.
//!
//! Other tasks steer a running loop through its [`LoopHandle`].

pub mod drag;
pub mod error;
pub mod handle;
pub mod pd;
pub mod scheduler;
pub mod snapshot;
pub mod stats;

#[cfg(test)]
mod integration;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use drag::{Drag, DragForce};
pub use error::LoopError;
pub use handle::LoopHandle;
pub use scheduler::{ControlLoop, LoopBuilder, TickOutcome, policy_state};
pub use snapshot::PoseSnapshot;
pub use stats::SimRate;
