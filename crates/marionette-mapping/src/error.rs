//! Reasons a robot could not be mapped.

use marionette_core::physics::JointKind;

/// Why one robot's address table could not be built.
///
/// These never abort resolution of the other robots.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("anchor body '{0}' not found")]
    AnchorNotFound(String),

    #[error("no free root joint on body '{0}'")]
    RootJointNotFound(String),

    #[error("policy joint '{0}' not found")]
    JointNotFound(String),

    #[error("policy joint '{name}' is {kind:?}, expected a single-DOF joint")]
    UnsupportedJoint { name: String, kind: JointKind },

    #[error("no actuator drives joint '{0}'")]
    ActuatorNotFound(String),

    #[error("addresses for robot {0} exceed the model's state arrays")]
    OutOfBounds(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            MappingError::AnchorNotFound("robot3_pelvis".into()).to_string(),
            "anchor body 'robot3_pelvis' not found"
        );
        assert_eq!(
            MappingError::UnsupportedJoint {
                name: "neck".into(),
                kind: JointKind::Ball
            }
            .to_string(),
            "policy joint 'neck' is Ball, expected a single-DOF joint"
        );
        assert_eq!(
            MappingError::OutOfBounds(2).to_string(),
            "addresses for robot 2 exceed the model's state arrays"
        );
    }
}
