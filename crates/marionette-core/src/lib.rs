// marionette-core: Types, traits, config, timing and errors shared by the Marionette crates.

pub mod config;
pub mod error;
pub mod layout;
pub mod physics;
pub mod time;
pub mod traits;
pub mod types;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::config::{DragConfig, LoopConfig, PdConfig};
    pub use crate::error::{ActionError, ConfigError, PolicyError};
    pub use crate::layout::ActionLayout;
    pub use crate::physics::{JointKind, ModelInfo, Physics};
    pub use crate::time::{LoopTiming, decimation};
    pub use crate::traits::{MotionTracking, Policy};
    pub use crate::types::{
        ANCHOR_BODY, ActionTarget, JointMapping, MAX_ROBOTS, PdGains, PolicyState,
        RobotSpawnConfig, anchor_name, prefixed_name, robot_prefix,
    };
}
