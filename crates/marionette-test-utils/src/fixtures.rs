//! A small biped used across test suites.
//!
//! [`BIPED_MJCF`] is the single-robot scene template. [`biped_model`] builds
//! the model metadata a physics engine would report after loading the scene
//! synthesized from that template for `n` robots.

use marionette_core::layout::ActionLayout;
use marionette_core::physics::{JointKind, ModelInfo};
use marionette_core::types::{RobotSpawnConfig, prefixed_name};

/// Policy joints of the biped, in action order.
pub const BIPED_JOINTS: [&str; 4] = ["left_hip", "left_knee", "right_hip", "right_knee"];

/// Single-robot biped scene template.
pub const BIPED_MJCF: &str = r#"<mujoco model="biped">
  <compiler angle="radian"/>
  <option timestep="0.004"/>
  <default>
    <joint damping="0.5" armature="0.01"/>
  </default>
  <worldbody>
    <light name="sun" pos="0 0 4" dir="0 0 -1"/>
    <geom name="floor" type="plane" size="20 20 0.1"/>
    <body name="pelvis" pos="0 0 0.8" quat="1 0 0 0">
      <freejoint name="floating_base"/>
      <site name="imu" pos="0 0 0.05"/>
      <geom name="pelvis_geom" type="box" size="0.1 0.15 0.05" mass="5"/>
      <body name="left_thigh" pos="0 0.1 -0.05">
        <joint name="left_hip" axis="0 1 0" range="-1.5 1.5"/>
        <geom name="left_thigh_geom" type="capsule" fromto="0 0 0 0 0 -0.35" size="0.05"/>
        <body name="left_shin" pos="0 0 -0.35">
          <joint name="left_knee" axis="0 1 0" range="0 2.4"/>
          <geom name="left_shin_geom" type="capsule" fromto="0 0 0 0 0 -0.35" size="0.04"/>
          <site name="left_foot" pos="0 0 -0.35"/>
        </body>
      </body>
      <body name="right_thigh" pos="0 -0.1 -0.05">
        <joint name="right_hip" axis="0 1 0" range="-1.5 1.5"/>
        <geom name="right_thigh_geom" type="capsule" fromto="0 0 0 0 0 -0.35" size="0.05"/>
        <body name="right_shin" pos="0 0 -0.35">
          <joint name="right_knee" axis="0 1 0" range="0 2.4"/>
          <geom name="right_shin_geom" type="capsule" fromto="0 0 0 0 0 -0.35" size="0.04"/>
          <site name="right_foot" pos="0 0 -0.35"/>
        </body>
      </body>
    </body>
  </worldbody>
  <actuator>
    <motor name="left_hip" joint="left_hip" gear="1" ctrlrange="-120 120"/>
    <motor name="left_knee" joint="left_knee" gear="1" ctrlrange="-120 120"/>
    <motor name="right_hip" joint="right_hip" gear="1" ctrlrange="-120 120"/>
    <motor name="right_knee" joint="right_knee" gear="1" ctrlrange="-120 120"/>
  </actuator>
</mujoco>
"#;

/// Control range of every biped motor.
pub const BIPED_CTRL_LIMIT: f64 = 120.0;

/// Physics timestep declared by [`BIPED_MJCF`].
pub const BIPED_TIMESTEP: f64 = 0.004;

const BODIES: [(&str, f64); 5] = [
    ("pelvis", 5.0),
    ("left_thigh", 1.5),
    ("left_shin", 1.0),
    ("right_thigh", 1.5),
    ("right_shin", 1.0),
];

/// Body (index into `BODIES`) owning each biped joint.
const JOINT_OWNERS: [usize; 4] = [1, 2, 3, 4];

/// Model metadata for a scene holding `robots` bipeds.
///
/// Layout matches what the synthesizer emits: robot sub-trees in order,
/// then one motor group per robot in order. Body 0 is the world body.
pub fn biped_model(robots: usize) -> ModelInfo {
    let mut model = ModelInfo {
        timestep: BIPED_TIMESTEP,
        body_names: vec!["world".into()],
        body_mass: vec![0.0],
        nlight: 1,
        ..ModelInfo::default()
    };
    let (mut qpos, mut dof) = (0, 0);

    for robot in 0..robots {
        let first_body = model.body_names.len();
        for (name, mass) in BODIES {
            model.body_names.push(prefixed_name(name, robot));
            model.body_mass.push(mass);
        }

        push_joint(
            &mut model,
            prefixed_name("floating_base", robot),
            JointKind::Free,
            first_body,
            &mut qpos,
            &mut dof,
        );
        for (joint, owner) in BIPED_JOINTS.iter().zip(JOINT_OWNERS) {
            push_joint(
                &mut model,
                prefixed_name(joint, robot),
                JointKind::Hinge,
                first_body + owner,
                &mut qpos,
                &mut dof,
            );
        }
    }

    for robot in 0..robots {
        for joint in BIPED_JOINTS {
            let name = prefixed_name(joint, robot);
            let id = model.joint_names.iter().position(|j| *j == name);
            model.actuator_names.push(name);
            model.actuator_joint.push(id);
            model
                .actuator_ctrlrange
                .push([-BIPED_CTRL_LIMIT, BIPED_CTRL_LIMIT]);
        }
    }
    model
}

fn push_joint(
    model: &mut ModelInfo,
    name: String,
    kind: JointKind,
    body: usize,
    qpos: &mut usize,
    dof: &mut usize,
) {
    model.joint_names.push(name);
    model.jnt_type.push(kind);
    model.jnt_bodyid.push(body);
    model.jnt_qposadr.push(*qpos);
    model.jnt_dofadr.push(*dof);
    *qpos += kind.nq();
    *dof += kind.nv();
}

/// Action layout for the biped with a slightly crouched default pose.
pub fn biped_layout() -> ActionLayout {
    ActionLayout {
        joint_names: BIPED_JOINTS.iter().map(|j| (*j).to_owned()).collect(),
        default_joint_pos: vec![-0.1, 0.3, -0.1, 0.3],
        kp: vec![100.0, 150.0, 100.0, 150.0],
        kd: vec![2.0, 4.0, 2.0, 4.0],
    }
}

/// `n` spawn positions spaced 1.5 m apart along x.
pub fn spawn_row(n: usize) -> Vec<RobotSpawnConfig> {
    (0..n)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let x = i as f64 * 1.5;
            RobotSpawnConfig::new(x, 0.0, 0.8)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
