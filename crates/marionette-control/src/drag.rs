//! Interactive drag force.
//!
//! The presentation layer records a contact point on a body (in body-local
//! coordinates) and a drag delta in its own y-up frame. Each sub-step the
//! delta becomes a spring force in the z-up physics frame, applied at the
//! contact point's current world position.

use marionette_core::config::DragConfig;
use marionette_core::physics::Physics;
use nalgebra::{Point3, Quaternion, UnitQuaternion, Vector3};

/// An active drag, as recorded by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drag {
    /// Body being dragged.
    pub body: usize,
    /// Contact point in the body's local frame.
    pub local_point: [f64; 3],
    /// Cursor displacement from the contact point, presentation frame (y-up).
    pub delta: [f64; 3],
}

/// Force ready to hand to [`Physics::apply_force`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragForce {
    pub force: [f64; 3],
    pub torque: [f64; 3],
    pub point: [f64; 3],
    pub body: usize,
}

/// Presentation (y-up) to physics (z-up): `(x, y, z) -> (x, -z, y)`.
pub fn presentation_to_physics([x, y, z]: [f64; 3]) -> Vector3<f64> {
    Vector3::new(x, -z, y)
}

/// Compute the drag force from the current body poses.
///
/// Returns `None` when the body id is outside the model. Body poses must be
/// current, so callers run `forward()` first.
pub fn drag_force(physics: &dyn Physics, drag: &Drag, config: &DragConfig) -> Option<DragForce> {
    let b = drag.body;
    let pos = physics.xpos().get(3 * b..3 * b + 3)?;
    let quat = physics.xquat().get(4 * b..4 * b + 4)?;
    let mass = *physics.model().body_mass.get(b)?;

    let rotation =
        UnitQuaternion::from_quaternion(Quaternion::new(quat[0], quat[1], quat[2], quat[3]));
    let local = Point3::new(drag.local_point[0], drag.local_point[1], drag.local_point[2]);
    let world = Point3::new(pos[0], pos[1], pos[2]) + rotation * local.coords;

    let mut force = presentation_to_physics(drag.delta) * (config.stiffness * mass);
    let magnitude = force.norm();
    if magnitude > config.max_force {
        force *= config.max_force / magnitude;
    }

    Some(DragForce {
        force: force.into(),
        torque: [0.0; 3],
        point: world.coords.into(),
        body: b,
    })
}

/// Recompute poses and apply `drag` to the physics' applied-force buffer.
pub fn apply_drag(
    physics: &mut dyn Physics,
    drag: &Drag,
    config: &DragConfig,
) -> Option<DragForce> {
    physics.forward();
    let applied = drag_force(physics, drag, config)?;
    physics.apply_force(applied.force, applied.torque, applied.point, applied.body);
    Some(applied)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use marionette_test_utils::{MockPhysics, biped_model};

    use super::*;

    fn config() -> DragConfig {
        DragConfig {
            stiffness: 10.0,
            max_force: 1000.0,
        }
    }

    #[test]
    fn frame_conversion() {
        let v = presentation_to_physics([1.0, 2.0, 3.0]);
        assert_relative_eq!(v, Vector3::new(1.0, -3.0, 2.0));
    }

    #[test]
    fn force_scales_with_mass_and_stiffness() {
        let physics = MockPhysics::new(biped_model(1));
        let drag = Drag {
            body: 1,
            local_point: [0.0; 3],
            delta: [0.0, 1.0, 0.0],
        };
        let f = drag_force(&physics, &drag, &config()).unwrap();
        // pelvis mass 5, presentation up is physics +z
        assert_relative_eq!(f.force[2], 50.0);
        assert_relative_eq!(f.force[0], 0.0);
        assert_eq!(f.body, 1);
    }

    #[test]
    fn force_is_clamped_to_ceiling() {
        let physics = MockPhysics::new(biped_model(1));
        let drag = Drag {
            body: 1,
            local_point: [0.0; 3],
            delta: [30.0, 0.0, -40.0],
        };
        let f = drag_force(&physics, &drag, &config()).unwrap();
        let norm = Vector3::from(f.force).norm();
        assert_relative_eq!(norm, 1000.0, epsilon = 1e-9);
        // Direction preserved: (30, 40, 0) in physics frame.
        assert_relative_eq!(f.force[0] / f.force[1], 0.75, epsilon = 1e-12);
    }

    #[test]
    fn contact_point_follows_body_pose() {
        let mut physics = MockPhysics::new(biped_model(1));
        // Root at (1, 2, 0.8), rotated 90 degrees about z.
        let half = std::f64::consts::FRAC_PI_4;
        physics.qpos_mut()[..7]
            .copy_from_slice(&[1.0, 2.0, 0.8, half.cos(), 0.0, 0.0, half.sin()]);
        physics.forward();
        let drag = Drag {
            body: 1,
            local_point: [0.1, 0.0, 0.0],
            delta: [0.0; 3],
        };
        let f = drag_force(&physics, &drag, &config()).unwrap();
        assert_relative_eq!(f.point[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(f.point[1], 2.1, epsilon = 1e-9);
        assert_relative_eq!(f.point[2], 0.8, epsilon = 1e-9);
    }

    #[test]
    fn unknown_body_is_ignored() {
        let mut physics = MockPhysics::new(biped_model(1));
        let probe = physics.probe();
        let drag = Drag {
            body: 99,
            local_point: [0.0; 3],
            delta: [1.0, 0.0, 0.0],
        };
        assert!(apply_drag(&mut physics, &drag, &config()).is_none());
        assert!(probe.applied().is_empty());
    }

    #[test]
    fn apply_drag_records_force() {
        let mut physics = MockPhysics::new(biped_model(1));
        let probe = physics.probe();
        let drag = Drag {
            body: 2,
            local_point: [0.0; 3],
            delta: [1.0, 0.0, 0.0],
        };
        let applied = apply_drag(&mut physics, &drag, &config()).unwrap();
        assert_eq!(probe.forwards(), 1);
        assert_eq!(probe.applied().len(), 1);
        assert_relative_eq!(applied.force[0], 15.0);
    }
}
