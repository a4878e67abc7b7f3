//! Keyframe motion tracking.
//!
//! A [`KeyframePolicy`] holds a default pose and a library of named
//! [`Motion`]s. While idle it targets the default pose. A motion request is
//! accepted only when the robot has settled in the default pose; a forced
//! request starts immediately, blending from the robot's current joint
//! positions into the motion.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use marionette_core::error::{ConfigError, PolicyError};
use marionette_core::layout::ActionLayout;
use marionette_core::traits::{MotionTracking, Policy};
use marionette_core::types::{PdGains, PolicyState};
use serde::{Deserialize, Serialize};
use tracing::debug;

const fn default_blend() -> f32 {
    0.25
}
const fn default_settle_tolerance() -> f32 {
    0.05
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// One pose at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Seconds from the start of the motion.
    pub time: f32,
    pub pose: Vec<f32>,
}

/// Piecewise-linear joint trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Keyframe>", into = "Vec<Keyframe>")]
pub struct Motion {
    keyframes: Vec<Keyframe>,
}

impl Motion {
    /// Keyframes must be non-empty, in non-decreasing time order starting at
    /// or after zero, and share one pose length.
    pub fn new(keyframes: Vec<Keyframe>) -> Result<Self, ConfigError> {
        let Some(first) = keyframes.first() else {
            return Err(invalid("keyframes must not be empty"));
        };
        let dof = first.pose.len();
        if first.time.is_nan() || first.time < 0.0 {
            return Err(invalid("first keyframe time must be >= 0"));
        }
        for pair in keyframes.windows(2) {
            if pair[1].time.is_nan() || pair[1].time < pair[0].time {
                return Err(invalid("keyframe times must be non-decreasing"));
            }
        }
        if keyframes.iter().any(|k| k.pose.len() != dof) {
            return Err(invalid("keyframe poses differ in length"));
        }
        Ok(Self { keyframes })
    }

    pub fn duration(&self) -> f32 {
        self.keyframes.last().map_or(0.0, |k| k.time)
    }

    pub fn dof(&self) -> usize {
        self.keyframes.first().map_or(0, |k| k.pose.len())
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Pose at time `t`, held constant outside the keyframe span.
    pub fn sample(&self, t: f32) -> Vec<f32> {
        let next = self.keyframes.partition_point(|k| k.time <= t);
        if next == 0 {
            return self.keyframes[0].pose.clone();
        }
        let Some(b) = self.keyframes.get(next) else {
            return self.keyframes[next - 1].pose.clone();
        };
        let a = &self.keyframes[next - 1];
        let span = b.time - a.time;
        let alpha = if span > 0.0 { (t - a.time) / span } else { 1.0 };
        a.pose
            .iter()
            .zip(&b.pose)
            .map(|(&x, &y)| (y - x).mul_add(alpha, x))
            .collect()
    }

    /// This motion preceded by a blend from `pose` lasting `blend` seconds.
    fn spliced_from(&self, pose: &[f32], blend: f32) -> Self {
        let mut keyframes = Vec::with_capacity(self.keyframes.len() + 1);
        keyframes.push(Keyframe {
            time: 0.0,
            pose: pose.to_vec(),
        });
        keyframes.extend(self.keyframes.iter().map(|k| Keyframe {
            time: k.time + blend,
            pose: k.pose.clone(),
        }));
        Self { keyframes }
    }
}

impl TryFrom<Vec<Keyframe>> for Motion {
    type Error = ConfigError;

    fn try_from(keyframes: Vec<Keyframe>) -> Result<Self, Self::Error> {
        Self::new(keyframes)
    }
}

impl From<Motion> for Vec<Keyframe> {
    fn from(motion: Motion) -> Self {
        motion.keyframes
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: "motion".into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Motion library file
// ---------------------------------------------------------------------------

/// On-disk form of a keyframe policy: JSON object of named motions plus
/// tracking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionLibrary {
    pub motions: BTreeMap<String, Motion>,
    /// Seconds spent blending into a forced motion.
    #[serde(default = "default_blend")]
    pub blend: f32,
    /// Max per-joint deviation from the default pose that counts as settled.
    #[serde(default = "default_settle_tolerance")]
    pub settle_tolerance: f32,
}

impl MotionLibrary {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

// ---------------------------------------------------------------------------
// KeyframePolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Active {
    name: String,
    motion: Motion,
    time: f32,
}

/// Default-pose holder that plays named keyframe motions on request.
pub struct KeyframePolicy {
    default_pose: Vec<f32>,
    motions: BTreeMap<String, Motion>,
    active: Option<Active>,
    dt: f32,
    blend: f32,
    settle_tolerance: f32,
    gains: Option<PdGains>,
}

impl KeyframePolicy {
    /// Policy holding `default_pose`, advancing motions by `dt` per step.
    pub fn new(default_pose: Vec<f32>, dt: f32) -> Self {
        Self {
            default_pose,
            motions: BTreeMap::new(),
            active: None,
            dt,
            blend: default_blend(),
            settle_tolerance: default_settle_tolerance(),
            gains: None,
        }
    }

    /// Default pose and gains from a layout.
    pub fn from_layout(layout: &ActionLayout, dt: f32) -> Self {
        let mut policy = Self::new(layout.default_pose(), dt);
        policy.gains = layout.gains();
        policy
    }

    /// Add every motion in `library` and adopt its tracking parameters.
    /// Motions whose pose length differs from the default pose are skipped.
    #[must_use]
    pub fn with_library(mut self, library: MotionLibrary) -> Self {
        self.blend = library.blend;
        self.settle_tolerance = library.settle_tolerance;
        for (name, motion) in library.motions {
            self = self.with_motion(name, motion);
        }
        self
    }

    /// Register `motion` under `name`. A motion whose pose length differs
    /// from the default pose is ignored.
    #[must_use]
    pub fn with_motion(mut self, name: impl Into<String>, motion: Motion) -> Self {
        let name = name.into();
        if motion.dof() == self.default_pose.len() {
            self.motions.insert(name, motion);
        } else {
            debug!(motion = %name, "motion pose length differs from default pose, ignored");
        }
        self
    }

    #[must_use]
    pub const fn with_blend(mut self, seconds: f32) -> Self {
        self.blend = seconds;
        self
    }

    #[must_use]
    pub const fn with_settle_tolerance(mut self, tolerance: f32) -> Self {
        self.settle_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_gains(mut self, gains: PdGains) -> Self {
        self.gains = Some(gains);
        self
    }

    /// Name of the motion being played, if any.
    pub fn active_motion(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.name.as_str())
    }

    /// Whether `state` is at rest in the default pose.
    pub fn is_settled(&self, state: &PolicyState) -> bool {
        state.joint_pos.len() == self.default_pose.len()
            && state
                .joint_pos
                .iter()
                .zip(&self.default_pose)
                .all(|(q, d)| (q - d).abs() <= self.settle_tolerance)
    }

    fn start(&mut self, name: &str, motion: Motion) {
        debug!(motion = name, duration = motion.duration(), "motion started");
        self.active = Some(Active {
            name: name.to_owned(),
            motion,
            time: 0.0,
        });
    }
}

#[async_trait]
impl Policy for KeyframePolicy {
    async fn step(&mut self, _state: &PolicyState) -> Result<Option<Vec<f32>>, PolicyError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(Some(self.default_pose.clone()));
        };
        let pose = active.motion.sample(active.time);
        active.time += self.dt;
        if active.time > active.motion.duration() {
            debug!(motion = %active.name, "motion finished");
            self.active = None;
        }
        Ok(Some(pose))
    }

    async fn reset(&mut self, _state: &PolicyState) -> Result<(), PolicyError> {
        self.active = None;
        Ok(())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "KeyframePolicy"
    }

    fn pd_gains(&self) -> Option<&PdGains> {
        self.gains.as_ref()
    }

    fn tracking(&mut self) -> Option<&mut dyn MotionTracking> {
        Some(self)
    }
}

impl MotionTracking for KeyframePolicy {
    fn motions(&self) -> Vec<&str> {
        self.motions.keys().map(String::as_str).collect()
    }

    fn request_motion(&mut self, name: &str, state: &PolicyState) -> bool {
        if self.active.is_some() || !self.is_settled(state) {
            return false;
        }
        let Some(motion) = self.motions.get(name).cloned() else {
            return false;
        };
        self.start(name, motion);
        true
    }

    fn force_motion(&mut self, name: &str, state: &PolicyState) -> bool {
        if state.joint_pos.len() != self.default_pose.len() {
            return false;
        }
        let Some(motion) = self.motions.get(name) else {
            return false;
        };
        let spliced = motion.spliced_from(&state.joint_pos, self.blend);
        self.start(name, spliced);
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn wave() -> Motion {
        Motion::new(vec![
            Keyframe {
                time: 0.0,
                pose: vec![0.0, 0.0],
            },
            Keyframe {
                time: 0.1,
                pose: vec![1.0, -1.0],
            },
            Keyframe {
                time: 0.2,
                pose: vec![0.0, 0.0],
            },
        ])
        .unwrap()
    }

    fn policy() -> KeyframePolicy {
        KeyframePolicy::new(vec![0.0, 0.0], 0.05).with_motion("wave", wave())
    }

    fn at(pose: [f32; 2]) -> PolicyState {
        let mut state = PolicyState::zeros(2);
        state.joint_pos = pose.to_vec();
        state
    }

    // -- Motion --

    #[test]
    fn sample_interpolates_and_holds() {
        let m = wave();
        assert_relative_eq!(m.duration(), 0.2);
        assert_eq!(m.sample(-1.0), vec![0.0, 0.0]);
        let mid = m.sample(0.05);
        assert_relative_eq!(mid[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(mid[1], -0.5, epsilon = 1e-6);
        assert_eq!(m.sample(0.1), vec![1.0, -1.0]);
        assert_eq!(m.sample(5.0), vec![0.0, 0.0]);
    }

    #[test]
    fn motion_validation() {
        assert!(Motion::new(Vec::new()).is_err());
        let backwards = vec![
            Keyframe {
                time: 0.2,
                pose: vec![0.0],
            },
            Keyframe {
                time: 0.1,
                pose: vec![0.0],
            },
        ];
        assert!(Motion::new(backwards).is_err());
        let ragged = vec![
            Keyframe {
                time: 0.0,
                pose: vec![0.0],
            },
            Keyframe {
                time: 0.1,
                pose: vec![0.0, 1.0],
            },
        ];
        assert!(Motion::new(ragged).is_err());
    }

    #[test]
    fn library_parses_from_json() {
        let library = MotionLibrary::from_json(
            r#"{
                "motions": {
                    "squat": [
                        {"time": 0.0, "pose": [0.0, 0.0]},
                        {"time": 0.5, "pose": [0.6, 1.2]}
                    ]
                },
                "blend": 0.1
            }"#,
        )
        .unwrap();
        assert_relative_eq!(library.blend, 0.1);
        assert_relative_eq!(library.settle_tolerance, 0.05);
        let policy = KeyframePolicy::new(vec![0.0, 0.0], 0.02).with_library(library);
        assert!(policy.has_motion("squat"));
    }

    #[test]
    fn library_rejects_bad_motion() {
        let err = MotionLibrary::from_json(r#"{"motions": {"bad": []}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn mismatched_motion_is_ignored() {
        let policy = KeyframePolicy::new(vec![0.0; 3], 0.02).with_motion("wave", wave());
        assert!(policy.motions().is_empty());
    }

    // -- Policy --

    #[tokio::test]
    async fn idle_targets_default_pose() {
        let mut p = policy();
        assert_eq!(p.step(&at([0.3, 0.3])).await.unwrap(), Some(vec![0.0, 0.0]));
        assert!(p.active_motion().is_none());
    }

    #[tokio::test]
    async fn plays_motion_then_returns_to_default() {
        let mut p = policy();
        let settled = at([0.0, 0.0]);
        assert!(p.request_motion("wave", &settled));
        assert_eq!(p.active_motion(), Some("wave"));

        let mut outputs = Vec::new();
        for _ in 0..6 {
            outputs.push(p.step(&settled).await.unwrap().unwrap());
        }
        assert_relative_eq!(outputs[2][0], 1.0, epsilon = 1e-6);
        assert!(p.active_motion().is_none());
        assert_eq!(outputs[5], vec![0.0, 0.0]);
    }

    // -- MotionTracking --

    #[test]
    fn unknown_motion_rejected() {
        let mut p = policy();
        assert!(!p.request_motion("jump", &at([0.0, 0.0])));
        assert!(!p.force_motion("jump", &at([0.0, 0.0])));
    }

    #[test]
    fn unsettled_request_is_gated() {
        let mut p = policy();
        assert!(!p.request_motion("wave", &at([0.5, 0.0])));
        assert!(p.request_motion("wave", &at([0.04, -0.04])));
        // Busy with a motion.
        assert!(!p.request_motion("wave", &at([0.0, 0.0])));
    }

    #[tokio::test]
    async fn forced_motion_splices_from_current_pose() {
        let mut p = policy().with_blend(0.1);
        let current = at([0.8, 0.4]);
        assert!(p.force_motion("wave", &current));
        let first = p.step(&current).await.unwrap().unwrap();
        assert_eq!(first, vec![0.8, 0.4]);
        // Halfway through the blend.
        let second = p.step(&current).await.unwrap().unwrap();
        assert_relative_eq!(second[0], 0.4, epsilon = 1e-6);
        assert_relative_eq!(second[1], 0.2, epsilon = 1e-6);
    }

    #[tokio::test]
    async fn reset_stops_motion() {
        let mut p = policy();
        let s = at([0.0, 0.0]);
        p.force_motion("wave", &s);
        p.reset(&s).await.unwrap();
        assert!(p.active_motion().is_none());
    }

    #[test]
    fn exposes_tracking() {
        let mut p = policy();
        let tracker = p.tracking().unwrap();
        assert_eq!(tracker.motions(), vec!["wave"]);
    }
}
