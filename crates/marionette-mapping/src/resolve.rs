//! Per-robot address resolution.

use marionette_core::layout::ActionLayout;
use marionette_core::physics::JointKind;
use marionette_core::types::{JointMapping, anchor_name, prefixed_name};
use tracing::{debug, warn};

use crate::error::MappingError;
use crate::index::ModelIndex;

/// Mappings for every robot that resolved, in robot order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub mappings: Vec<JointMapping>,
    /// Robots that were skipped and why.
    pub skipped: Vec<(usize, MappingError)>,
}

impl Resolution {
    /// Mapping for `robot`, if it resolved.
    pub fn mapping(&self, robot: usize) -> Option<&JointMapping> {
        self.mappings.iter().find(|m| m.robot == robot)
    }

    /// Anchor body ids of the resolved robots, in robot order.
    pub fn pelvis_bodies(&self) -> Vec<usize> {
        self.mappings.iter().map(|m| m.pelvis_body).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Resolve address tables for robots `0..robot_count`.
///
/// A robot that fails to resolve is logged and skipped; the rest continue.
pub fn resolve(index: &ModelIndex<'_>, robot_count: usize, layout: &ActionLayout) -> Resolution {
    let mut resolution = Resolution::default();
    for robot in 0..robot_count {
        match resolve_robot(index, robot, layout) {
            Ok(mapping) => {
                debug!(
                    robot,
                    pelvis = mapping.pelvis_body,
                    num_actions = mapping.num_actions,
                    "robot mapped"
                );
                resolution.mappings.push(mapping);
            }
            Err(err) => {
                warn!(robot, %err, "robot skipped, control disabled");
                resolution.skipped.push((robot, err));
            }
        }
    }
    resolution
}

/// Resolve the address table for one robot.
pub fn resolve_robot(
    index: &ModelIndex<'_>,
    robot: usize,
    layout: &ActionLayout,
) -> Result<JointMapping, MappingError> {
    let model = index.model();

    let anchor = anchor_name(robot);
    let pelvis_body = index
        .body(&anchor)
        .ok_or_else(|| MappingError::AnchorNotFound(anchor.clone()))?;
    let root = index
        .root_joint(pelvis_body)
        .ok_or(MappingError::RootJointNotFound(anchor))?;

    let n = layout.num_actions();
    let mut qpos_adr_policy = Vec::with_capacity(n);
    let mut qvel_adr_policy = Vec::with_capacity(n);
    let mut ctrl_adr_policy = Vec::with_capacity(n);
    for joint_name in &layout.joint_names {
        let name = prefixed_name(joint_name, robot);
        let joint = index
            .joint(&name)
            .ok_or_else(|| MappingError::JointNotFound(name.clone()))?;
        let kind = model.jnt_type[joint];
        if !matches!(kind, JointKind::Hinge | JointKind::Slide) {
            return Err(MappingError::UnsupportedJoint { name, kind });
        }
        let actuator = index
            .actuator_for_joint(joint)
            .ok_or(MappingError::ActuatorNotFound(name))?;
        qpos_adr_policy.push(model.jnt_qposadr[joint]);
        qvel_adr_policy.push(model.jnt_dofadr[joint]);
        ctrl_adr_policy.push(actuator);
    }

    let mapping = JointMapping {
        robot,
        qpos_adr_policy,
        qvel_adr_policy,
        ctrl_adr_policy,
        num_actions: n,
        freejoint_qpos_adr: model.jnt_qposadr[root],
        freejoint_qvel_adr: model.jnt_dofadr[root],
        pelvis_body,
    };
    if !mapping.in_bounds(model.nq(), model.nv(), model.nu()) {
        return Err(MappingError::OutOfBounds(robot));
    }
    Ok(mapping)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
