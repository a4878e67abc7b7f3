//! Array-backed physics stand-in.
//!
//! [`MockPhysics`] keeps MuJoCo-shaped state arrays for a [`ModelInfo`] and
//! integrates hinge joints as unit-inertia point masses driven by `ctrl`.
//! Every call the control loop makes is recorded in a shared
//! [`PhysicsProbe`], so tests can inspect it after the physics handle has
//! been moved into the loop.

use std::sync::{Arc, Mutex, MutexGuard};

use marionette_core::physics::{JointKind, ModelInfo, Physics};

/// One recorded `apply_force` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedForce {
    pub force: [f64; 3],
    pub torque: [f64; 3],
    pub point: [f64; 3],
    pub body: usize,
}

#[derive(Debug, Default)]
struct ProbeLog {
    steps: usize,
    forwards: usize,
    resets: usize,
    applied: Vec<AppliedForce>,
    ctrl_at_step: Vec<Vec<f64>>,
}

/// Shared view of the calls made on a [`MockPhysics`].
#[derive(Debug, Clone, Default)]
pub struct PhysicsProbe {
    log: Arc<Mutex<ProbeLog>>,
}

impl PhysicsProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeLog> {
        self.log.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn steps(&self) -> usize {
        self.lock().steps
    }

    pub fn forwards(&self) -> usize {
        self.lock().forwards
    }

    pub fn resets(&self) -> usize {
        self.lock().resets
    }

    pub fn applied(&self) -> Vec<AppliedForce> {
        self.lock().applied.clone()
    }

    /// Contents of `ctrl` at each `step` call, in order.
    pub fn ctrl_at_step(&self) -> Vec<Vec<f64>> {
        self.lock().ctrl_at_step.clone()
    }
}

/// Deterministic physics stand-in with MuJoCo-style flat arrays.
#[derive(Debug)]
pub struct MockPhysics {
    model: ModelInfo,
    qpos0: Vec<f64>,
    qpos: Vec<f64>,
    qvel: Vec<f64>,
    ctrl: Vec<f64>,
    qfrc_applied: Vec<f64>,
    xpos: Vec<f64>,
    xquat: Vec<f64>,
    light_xpos: Vec<f64>,
    light_xdir: Vec<f64>,
    integrate: bool,
    probe: PhysicsProbe,
}

impl MockPhysics {
    /// State arrays sized for `model`, free joints upright at the origin.
    pub fn new(model: ModelInfo) -> Self {
        let nq: usize = model.jnt_type.iter().map(|k| k.nq()).sum();
        let nv: usize = model.jnt_type.iter().map(|k| k.nv()).sum();
        let mut qpos0 = vec![0.0; nq];
        for (kind, &adr) in model.jnt_type.iter().zip(&model.jnt_qposadr) {
            if matches!(kind, JointKind::Free | JointKind::Ball) {
                let quat = if *kind == JointKind::Free { adr + 3 } else { adr };
                qpos0[quat] = 1.0;
            }
        }
        let nbody = model.nbody();
        let nlight = model.nlight;
        let mut physics = Self {
            qpos: qpos0.clone(),
            qpos0,
            qvel: vec![0.0; nv],
            ctrl: vec![0.0; model.nu()],
            qfrc_applied: vec![0.0; nv],
            xpos: vec![0.0; 3 * nbody],
            xquat: vec![0.0; 4 * nbody],
            light_xpos: vec![0.0; 3 * nlight],
            light_xdir: vec![0.0; 3 * nlight],
            integrate: true,
            probe: PhysicsProbe::default(),
            model,
        };
        physics.update_poses();
        physics
    }

    /// Keep joint state fixed across steps so control outputs stay exact.
    #[must_use]
    pub const fn frozen(mut self) -> Self {
        self.integrate = false;
        self
    }

    /// Overwrite the initial joint positions used by `reset_data`.
    #[must_use]
    pub fn with_qpos0(mut self, qpos0: Vec<f64>) -> Self {
        self.qpos.clone_from(&qpos0);
        self.qpos0 = qpos0;
        self.update_poses();
        self
    }

    /// Shared call log; clone before moving the physics into a loop.
    pub fn probe(&self) -> PhysicsProbe {
        self.probe.clone()
    }

    /// Recompute body poses from root joints. Child bodies inherit the
    /// root pose of their robot.
    fn update_poses(&mut self) {
        for body in 0..self.model.nbody() {
            self.xquat[4 * body] = 1.0;
        }
        for (j, kind) in self.model.jnt_type.iter().enumerate() {
            if *kind != JointKind::Free {
                continue;
            }
            let root = self.model.jnt_bodyid[j];
            let adr = self.model.jnt_qposadr[j];
            let next_root = self
                .model
                .jnt_type
                .iter()
                .enumerate()
                .skip(j + 1)
                .find(|(_, k)| **k == JointKind::Free)
                .map_or(self.model.nbody(), |(jj, _)| self.model.jnt_bodyid[jj]);
            for body in root..next_root {
                self.xpos[3 * body..3 * body + 3].copy_from_slice(&self.qpos[adr..adr + 3]);
                self.xquat[4 * body..4 * body + 4].copy_from_slice(&self.qpos[adr + 3..adr + 7]);
            }
        }
        for light in 0..self.model.nlight {
            self.light_xpos[3 * light + 2] = 4.0;
            self.light_xdir[3 * light + 2] = -1.0;
        }
    }
}

impl Physics for MockPhysics {
    fn model(&self) -> &ModelInfo {
        &self.model
    }

    fn qpos(&self) -> &[f64] {
        &self.qpos
    }

    fn qpos_mut(&mut self) -> &mut [f64] {
        &mut self.qpos
    }

    fn qvel(&self) -> &[f64] {
        &self.qvel
    }

    fn qvel_mut(&mut self) -> &mut [f64] {
        &mut self.qvel
    }

    fn ctrl(&self) -> &[f64] {
        &self.ctrl
    }

    fn ctrl_mut(&mut self) -> &mut [f64] {
        &mut self.ctrl
    }

    fn qfrc_applied_mut(&mut self) -> &mut [f64] {
        &mut self.qfrc_applied
    }

    fn xpos(&self) -> &[f64] {
        &self.xpos
    }

    fn xquat(&self) -> &[f64] {
        &self.xquat
    }

    fn light_xpos(&self) -> &[f64] {
        &self.light_xpos
    }

    fn light_xdir(&self) -> &[f64] {
        &self.light_xdir
    }

    fn step(&mut self) {
        {
            let mut log = self.probe.lock();
            log.steps += 1;
            log.ctrl_at_step.push(self.ctrl.clone());
        }
        if self.integrate {
            let dt = self.model.timestep;
            for (u, joint) in self.model.actuator_joint.iter().enumerate() {
                let Some(j) = *joint else { continue };
                let dof = self.model.jnt_dofadr[j];
                let adr = self.model.jnt_qposadr[j];
                self.qvel[dof] += (self.ctrl[u] + self.qfrc_applied[dof]) * dt;
                self.qpos[adr] += self.qvel[dof] * dt;
            }
        }
        self.update_poses();
    }

    fn forward(&mut self) {
        self.probe.lock().forwards += 1;
        self.update_poses();
    }

    fn reset_data(&mut self) {
        self.probe.lock().resets += 1;
        self.qpos.clone_from(&self.qpos0);
        self.qvel.fill(0.0);
        self.ctrl.fill(0.0);
        self.qfrc_applied.fill(0.0);
        self.update_poses();
    }

    fn apply_force(&mut self, force: [f64; 3], torque: [f64; 3], point: [f64; 3], body: usize) {
        self.probe.lock().applied.push(AppliedForce {
            force,
            torque,
            point,
            body,
        });
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "MockPhysics"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
