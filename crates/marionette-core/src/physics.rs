//! Engine-agnostic physics capability.
//!
//! Any engine exposing MuJoCo-style flat state arrays implements [`Physics`]
//! and hands it to the control loop. The loop is the only writer of these
//! arrays while it runs.

// ---------------------------------------------------------------------------
// JointKind
// ---------------------------------------------------------------------------

/// Joint type as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    /// Six-DOF floating joint (7 qpos, 6 qvel).
    Free,
    /// Three-DOF rotational joint (4 qpos, 3 qvel).
    Ball,
    /// One-DOF prismatic joint.
    Slide,
    /// One-DOF revolute joint.
    Hinge,
}

impl JointKind {
    /// Number of `qpos` entries the joint occupies.
    pub const fn nq(self) -> usize {
        match self {
            Self::Free => 7,
            Self::Ball => 4,
            Self::Slide | Self::Hinge => 1,
        }
    }

    /// Number of `qvel` entries the joint occupies.
    pub const fn nv(self) -> usize {
        match self {
            Self::Free => 6,
            Self::Ball => 3,
            Self::Slide | Self::Hinge => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// ModelInfo
// ---------------------------------------------------------------------------

/// Static model metadata: name tables and per-element addresses.
///
/// Per-joint vectors are indexed by joint id, per-body vectors by body id and
/// per-actuator vectors by actuator id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelInfo {
    /// Physics timestep in seconds.
    pub timestep: f64,
    pub body_names: Vec<String>,
    pub body_mass: Vec<f64>,
    pub joint_names: Vec<String>,
    pub jnt_type: Vec<JointKind>,
    /// Owning body of each joint.
    pub jnt_bodyid: Vec<usize>,
    pub jnt_qposadr: Vec<usize>,
    pub jnt_dofadr: Vec<usize>,
    pub actuator_names: Vec<String>,
    /// Joint driven by each actuator, `None` for non-joint transmissions.
    pub actuator_joint: Vec<Option<usize>>,
    /// `[min, max]` control range per actuator.
    pub actuator_ctrlrange: Vec<[f64; 2]>,
    pub nlight: usize,
}

impl ModelInfo {
    pub fn nbody(&self) -> usize {
        self.body_names.len()
    }

    pub fn njnt(&self) -> usize {
        self.joint_names.len()
    }

    pub fn nu(&self) -> usize {
        self.actuator_names.len()
    }

    /// Length of `qpos` implied by the joint table.
    pub fn nq(&self) -> usize {
        self.jnt_type
            .iter()
            .zip(&self.jnt_qposadr)
            .map(|(kind, adr)| adr + kind.nq())
            .max()
            .unwrap_or(0)
    }

    /// Length of `qvel` implied by the joint table.
    pub fn nv(&self) -> usize {
        self.jnt_type
            .iter()
            .zip(&self.jnt_dofadr)
            .map(|(kind, adr)| adr + kind.nv())
            .max()
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Mutable simulation state plus the operations the control loop needs.
///
/// Array layouts follow MuJoCo: `xpos` is `3 * nbody`, `xquat` is
/// `4 * nbody` in `(w, x, y, z)` order, `light_xpos`/`light_xdir` are
/// `3 * nlight`.
pub trait Physics: Send {
    fn model(&self) -> &ModelInfo;

    fn qpos(&self) -> &[f64];
    fn qpos_mut(&mut self) -> &mut [f64];
    fn qvel(&self) -> &[f64];
    fn qvel_mut(&mut self) -> &mut [f64];
    fn ctrl(&self) -> &[f64];
    fn ctrl_mut(&mut self) -> &mut [f64];
    fn qfrc_applied_mut(&mut self) -> &mut [f64];

    fn xpos(&self) -> &[f64];
    fn xquat(&self) -> &[f64];
    fn light_xpos(&self) -> &[f64];
    fn light_xdir(&self) -> &[f64];

    /// Advance the simulation by one timestep.
    fn step(&mut self);

    /// Recompute derived quantities (body world poses) without integrating.
    fn forward(&mut self);

    /// Restore the model's initial state.
    fn reset_data(&mut self);

    /// Accumulate a world-frame force and torque applied at `point` on `body`
    /// into the applied-force buffer.
    fn apply_force(&mut self, force: [f64; 3], torque: [f64; 3], point: [f64; 3], body: usize);

    /// Human-readable engine name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
