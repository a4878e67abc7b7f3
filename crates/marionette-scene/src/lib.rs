//! Scene synthesis for multi-robot simulations.
//!
//! [`synthesize`] takes a single-robot MJCF template and a list of spawn
//! positions and produces one scene text holding every robot. Each robot is a
//! copy of the template's anchor body sub-tree with its element names
//! prefixed, and each gets its own group of actuator entries.
//!
//! # Example
//!
//! ```
//! use marionette_core::types::RobotSpawnConfig;
//! use marionette_scene::synthesize;
//!
//! let template = r#"<mujoco>
//!   <worldbody>
//!     <body name="pelvis" pos="0 0 1"><joint name="hip"/></body>
//!   </worldbody>
//!   <actuator><motor name="hip" joint="hip"/></actuator>
//! </mujoco>"#;
//! let spawns = [
//!     RobotSpawnConfig::new(0.0, 0.0, 1.0),
//!     RobotSpawnConfig::new(2.0, 0.0, 1.0),
//! ];
//! let scene = synthesize(template, &spawns).unwrap();
//! assert!(scene.contains(r#"name="robot2_pelvis""#));
//! assert!(scene.contains(r#"joint="robot2_hip""#));
//! ```

pub mod error;
pub mod scan;
pub mod synth;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::SynthesisError;
pub use synth::{anchor_spawn, load_template, synthesize, synthesize_file, write_scene};
