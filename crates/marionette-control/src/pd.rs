//! PD conversion from target joint positions to actuator commands.

use marionette_core::physics::Physics;
use marionette_core::types::{ActionTarget, JointMapping, PdGains};

/// `kp * (target - pos) + kd * (0 - vel)`, evaluated in `f64`.
#[allow(clippy::suboptimal_flops)]
pub fn pd_torque(kp: f32, kd: f32, target: f32, pos: f64, vel: f64) -> f64 {
    f64::from(kp) * (f64::from(target) - pos) + f64::from(kd) * (0.0 - vel)
}

/// Clamp to `[min, max]` when both ends are finite and `min < max`.
/// Any other range leaves the value untouched.
pub fn clamp_to_range(value: f64, [min, max]: [f64; 2]) -> f64 {
    if min.is_finite() && max.is_finite() && min < max {
        value.clamp(min, max)
    } else {
        value
    }
}

/// Write one robot's PD commands into `ctrl`.
///
/// Addresses outside the engine's arrays are skipped.
pub fn write_ctrl(
    physics: &mut dyn Physics,
    mapping: &JointMapping,
    target: &ActionTarget,
    gains: &PdGains,
) {
    let dofs = mapping
        .qpos_adr_policy
        .iter()
        .zip(&mapping.qvel_adr_policy)
        .zip(&mapping.ctrl_adr_policy)
        .zip(target.as_slice())
        .zip(gains.kp().iter().zip(gains.kd()));

    for ((((&qpos_adr, &qvel_adr), &ctrl_adr), &goal), (&kp, &kd)) in dofs {
        let (Some(&pos), Some(&vel)) = (physics.qpos().get(qpos_adr), physics.qvel().get(qvel_adr))
        else {
            continue;
        };
        let range = physics
            .model()
            .actuator_ctrlrange
            .get(ctrl_adr)
            .copied()
            .unwrap_or([f64::NEG_INFINITY, f64::INFINITY]);
        let torque = clamp_to_range(pd_torque(kp, kd, goal, pos, vel), range);
        if let Some(ctrl) = physics.ctrl_mut().get_mut(ctrl_adr) {
            *ctrl = torque;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
