//! One-time name lookup tables over a loaded model.

use std::collections::HashMap;

use marionette_core::physics::{JointKind, ModelInfo};

/// Name→id maps for bodies, joints and actuators, plus the reverse edges the
/// resolver needs (actuator driving a joint, free joint owned by a body).
///
/// When names repeat, the lowest id wins.
#[derive(Debug, Clone)]
pub struct ModelIndex<'m> {
    model: &'m ModelInfo,
    bodies: HashMap<&'m str, usize>,
    joints: HashMap<&'m str, usize>,
    actuators: HashMap<&'m str, usize>,
    actuator_by_joint: HashMap<usize, usize>,
    free_joint_by_body: HashMap<usize, usize>,
}

impl<'m> ModelIndex<'m> {
    pub fn build(model: &'m ModelInfo) -> Self {
        let mut actuator_by_joint = HashMap::new();
        for (actuator, joint) in model.actuator_joint.iter().enumerate() {
            if let Some(joint) = *joint {
                actuator_by_joint.entry(joint).or_insert(actuator);
            }
        }

        let mut free_joint_by_body = HashMap::new();
        for (joint, (kind, body)) in model.jnt_type.iter().zip(&model.jnt_bodyid).enumerate() {
            if *kind == JointKind::Free {
                free_joint_by_body.entry(*body).or_insert(joint);
            }
        }

        Self {
            model,
            bodies: name_table(&model.body_names),
            joints: name_table(&model.joint_names),
            actuators: name_table(&model.actuator_names),
            actuator_by_joint,
            free_joint_by_body,
        }
    }

    pub const fn model(&self) -> &'m ModelInfo {
        self.model
    }

    pub fn body(&self, name: &str) -> Option<usize> {
        self.bodies.get(name).copied()
    }

    pub fn joint(&self, name: &str) -> Option<usize> {
        self.joints.get(name).copied()
    }

    pub fn actuator(&self, name: &str) -> Option<usize> {
        self.actuators.get(name).copied()
    }

    /// Actuator whose transmission targets `joint`.
    pub fn actuator_for_joint(&self, joint: usize) -> Option<usize> {
        self.actuator_by_joint.get(&joint).copied()
    }

    /// Free joint owned by `body`, i.e. the root joint of a floating robot.
    pub fn root_joint(&self, body: usize) -> Option<usize> {
        self.free_joint_by_body.get(&body).copied()
    }
}

fn name_table(names: &[String]) -> HashMap<&str, usize> {
    let mut table = HashMap::with_capacity(names.len());
    for (id, name) in names.iter().enumerate() {
        table.entry(name.as_str()).or_insert(id);
    }
    table
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
