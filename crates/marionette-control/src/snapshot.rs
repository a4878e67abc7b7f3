//! Post-tick pose snapshots for the presentation layer.

use marionette_core::physics::Physics;

/// Copy of body and light world poses taken after a tick's sub-steps.
///
/// The presentation layer reads only these, never the live physics arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseSnapshot {
    /// Completed ticks since the loop was built.
    pub tick: u64,
    /// Simulated seconds since the loop was built or last reset.
    pub sim_time: f64,
    /// `3 * nbody` world positions.
    pub body_xpos: Vec<f64>,
    /// `4 * nbody` world orientations, `(w, x, y, z)`.
    pub body_xquat: Vec<f64>,
    pub light_xpos: Vec<f64>,
    pub light_xdir: Vec<f64>,
    pub steps_per_sec: f64,
    pub realtime_factor: f64,
}

impl PoseSnapshot {
    /// Overwrite the pose arrays from `physics`, reusing allocations.
    pub fn capture_from(&mut self, physics: &dyn Physics) {
        copy_into(&mut self.body_xpos, physics.xpos());
        copy_into(&mut self.body_xquat, physics.xquat());
        copy_into(&mut self.light_xpos, physics.light_xpos());
        copy_into(&mut self.light_xdir, physics.light_xdir());
    }

    pub fn nbody(&self) -> usize {
        self.body_xpos.len() / 3
    }

    pub fn body_position(&self, body: usize) -> Option<[f64; 3]> {
        let s = self.body_xpos.get(3 * body..3 * body + 3)?;
        Some([s[0], s[1], s[2]])
    }

    pub fn body_quat(&self, body: usize) -> Option<[f64; 4]> {
        let s = self.body_xquat.get(4 * body..4 * body + 4)?;
        Some([s[0], s[1], s[2], s[3]])
    }
}

fn copy_into(dst: &mut Vec<f64>, src: &[f64]) {
    dst.clear();
    dst.extend_from_slice(src);
}
