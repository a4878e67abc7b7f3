//! Address mapping for multi-robot scenes.
//!
//! [`ModelIndex`] is built once per loaded model and answers name lookups in
//! constant time. [`resolve`] uses it to derive one
//! [`JointMapping`](marionette_core::types::JointMapping) per robot: the
//! `qpos`/`qvel`/`ctrl` addresses of every policy joint plus the root free
//! joint offsets. Robots that cannot be resolved are skipped with a warning
//! and reported in [`Resolution::skipped`].

pub mod error;
pub mod index;
pub mod resolve;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::MappingError;
pub use index::ModelIndex;
pub use resolve::{Resolution, resolve, resolve_robot};
