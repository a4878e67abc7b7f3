//! Reference policies for Marionette.
//!
//! Simple controllers (hold pose, scripted, random) for bring-up and tests,
//! and [`KeyframePolicy`](keyframe::KeyframePolicy), which tracks named
//! keyframe motions through the
//! [`MotionTracking`](marionette_core::traits::MotionTracking) capability.
//!
//! # Example
//!
//! ```
//! use marionette_core::layout::ActionLayout;
//! use marionette_policy::prelude::*;
//!
//! let layout = ActionLayout::from_json(r#"{
//!     "joint_names": ["hip", "knee"],
//!     "default_joint_pos": [0.0, 0.4],
//!     "kp": [80.0, 80.0],
//!     "kd": [2.0, 2.0]
//! }"#).unwrap();
//! let policy = HoldPosePolicy::from_layout(&layout);
//! assert_eq!(policy.pose(), &[0.0, 0.4]);
//! ```

pub mod keyframe;
pub mod policies;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::keyframe::{Keyframe, KeyframePolicy, Motion, MotionLibrary};
    pub use crate::policies::{HoldPosePolicy, RandomPolicy, ScriptedPolicy};
}
