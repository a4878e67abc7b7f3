use serde::{Deserialize, Serialize};

use crate::error::{ActionError, ConfigError};

/// Maximum number of robots a synthesized scene may hold.
pub const MAX_ROBOTS: usize = 11;

/// Name of the anchor body each robot instance is cloned from.
pub const ANCHOR_BODY: &str = "pelvis";

// ---------------------------------------------------------------------------
// Robot naming
// ---------------------------------------------------------------------------

/// Name prefix for the robot at `index`.
///
/// The primary robot (index 0) keeps the template names; every other robot
/// is prefixed with `robot{index+1}_`.
pub fn robot_prefix(index: usize) -> String {
    if index == 0 {
        String::new()
    } else {
        format!("robot{}_", index + 1)
    }
}

/// Apply the robot prefix for `index` to `name`.
///
/// Names that already carry the prefix are returned unchanged.
pub fn prefixed_name(name: &str, index: usize) -> String {
    let prefix = robot_prefix(index);
    if name.starts_with(&prefix) {
        name.to_owned()
    } else {
        format!("{prefix}{name}")
    }
}

/// Expected anchor body name for the robot at `index`.
pub fn anchor_name(index: usize) -> String {
    prefixed_name(ANCHOR_BODY, index)
}

// ---------------------------------------------------------------------------
// RobotSpawnConfig
// ---------------------------------------------------------------------------

/// World position of one robot's root body.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotSpawnConfig {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RobotSpawnConfig {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Whether every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.position().iter().all(|v| v.is_finite())
    }
}

impl From<[f64; 3]> for RobotSpawnConfig {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

// ---------------------------------------------------------------------------
// JointMapping
// ---------------------------------------------------------------------------

/// Per-robot table of state-array addresses.
///
/// `qpos_adr_policy[i]`, `qvel_adr_policy[i]` and `ctrl_adr_policy[i]` all
/// refer to the degree of freedom driven by action element `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointMapping {
    /// Index of the robot this table belongs to.
    pub robot: usize,
    pub qpos_adr_policy: Vec<usize>,
    pub qvel_adr_policy: Vec<usize>,
    pub ctrl_adr_policy: Vec<usize>,
    pub num_actions: usize,
    /// Base offset of the free root joint in `qpos` (7 values: pos + quat).
    pub freejoint_qpos_adr: usize,
    /// Base offset of the free root joint in `qvel` (6 values: lin + ang).
    pub freejoint_qvel_adr: usize,
    /// Body id of the robot's anchor body.
    pub pelvis_body: usize,
}

impl JointMapping {
    /// Whether every address fits the given state array sizes.
    pub fn in_bounds(&self, nq: usize, nv: usize, nu: usize) -> bool {
        self.qpos_adr_policy.len() == self.num_actions
            && self.qvel_adr_policy.len() == self.num_actions
            && self.ctrl_adr_policy.len() == self.num_actions
            && self.qpos_adr_policy.iter().all(|&a| a < nq)
            && self.qvel_adr_policy.iter().all(|&a| a < nv)
            && self.ctrl_adr_policy.iter().all(|&a| a < nu)
            && self.freejoint_qpos_adr + 7 <= nq
            && self.freejoint_qvel_adr + 6 <= nv
    }
}

// ---------------------------------------------------------------------------
// PolicyState
// ---------------------------------------------------------------------------

/// Observation handed to a policy, sampled from the physics arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyState {
    pub joint_pos: Vec<f32>,
    pub joint_vel: Vec<f32>,
    pub root_pos: [f32; 3],
    /// Root orientation as `(w, x, y, z)`.
    pub root_quat: [f32; 4],
    pub root_ang_vel: [f32; 3],
}

impl PolicyState {
    /// State with `num_actions` zeroed joints and an identity root pose.
    pub fn zeros(num_actions: usize) -> Self {
        Self {
            joint_pos: vec![0.0; num_actions],
            joint_vel: vec![0.0; num_actions],
            root_pos: [0.0; 3],
            root_quat: [1.0, 0.0, 0.0, 0.0],
            root_ang_vel: [0.0; 3],
        }
    }
}

// ---------------------------------------------------------------------------
// ActionTarget
// ---------------------------------------------------------------------------

/// Validated target joint positions for one robot.
///
/// Only constructible through [`ActionTarget::new`], so consumers never need
/// to re-check length or finiteness.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTarget {
    values: Vec<f32>,
}

impl ActionTarget {
    /// Validate raw policy output against the expected action count.
    pub fn new(values: Vec<f32>, expected: usize) -> Result<Self, ActionError> {
        if values.is_empty() {
            return Err(ActionError::Empty);
        }
        if values.len() != expected {
            return Err(ActionError::DimMismatch {
                expected,
                got: values.len(),
            });
        }
        if let Some(dim) = values.iter().position(|v| !v.is_finite()) {
            return Err(ActionError::NonFinite { dim });
        }
        Ok(Self { values })
    }

    /// Validate an optional policy output; `None` is [`ActionError::Missing`].
    pub fn from_output(output: Option<Vec<f32>>, expected: usize) -> Result<Self, ActionError> {
        output.map_or(Err(ActionError::Missing), |values| {
            Self::new(values, expected)
        })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }
}

// ---------------------------------------------------------------------------
// PdGains
// ---------------------------------------------------------------------------

/// Per-joint proportional and derivative gains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdGains {
    kp: Vec<f32>,
    kd: Vec<f32>,
}

impl PdGains {
    pub fn new(kp: Vec<f32>, kd: Vec<f32>) -> Result<Self, ConfigError> {
        if kp.len() != kd.len() {
            return Err(ConfigError::GainLengthMismatch {
                kp: kp.len(),
                kd: kd.len(),
            });
        }
        Ok(Self { kp, kd })
    }

    /// The same `kp`/`kd` on every one of `len` joints.
    pub fn uniform(len: usize, kp: f32, kd: f32) -> Self {
        Self {
            kp: vec![kp; len],
            kd: vec![kd; len],
        }
    }

    pub fn kp(&self) -> &[f32] {
        &self.kp
    }

    pub fn kd(&self) -> &[f32] {
        &self.kd
    }

    pub fn len(&self) -> usize {
        self.kp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kp.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
