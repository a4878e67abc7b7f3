//! Policy action layout metadata.
//!
//! An [`ActionLayout`] ships alongside a policy and names the joints its
//! action vector drives, in action order, together with the default pose and
//! the PD gains the policy was trained with.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::PdGains;

/// Joint ordering and gains for a policy's action vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLayout {
    /// Template (unprefixed) joint names in action order.
    pub joint_names: Vec<String>,
    /// Default joint positions, same order. Empty means all zeros.
    #[serde(default)]
    pub default_joint_pos: Vec<f32>,
    /// Per-joint stiffness, same order. Empty means the loop's fallback.
    #[serde(default)]
    pub kp: Vec<f32>,
    /// Per-joint damping, same order.
    #[serde(default)]
    pub kd: Vec<f32>,
}

impl ActionLayout {
    /// Layout with names only.
    pub fn new(joint_names: Vec<String>) -> Self {
        Self {
            joint_names,
            default_joint_pos: Vec::new(),
            kp: Vec::new(),
            kd: Vec::new(),
        }
    }

    pub fn num_actions(&self) -> usize {
        self.joint_names.len()
    }

    /// Check that every per-joint vector is empty or matches the joint count.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self.num_actions();
        if n == 0 {
            return Err(ConfigError::InvalidValue {
                field: "joint_names".into(),
                message: "must not be empty".into(),
            });
        }
        for (field, len) in [
            ("default_joint_pos", self.default_joint_pos.len()),
            ("kp", self.kp.len()),
            ("kd", self.kd.len()),
        ] {
            if len != 0 && len != n {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    message: format!("expected {n} entries, got {len}"),
                });
            }
        }
        Ok(())
    }

    /// Default pose, zero-filled when the layout carries none.
    pub fn default_pose(&self) -> Vec<f32> {
        if self.default_joint_pos.is_empty() {
            vec![0.0; self.num_actions()]
        } else {
            self.default_joint_pos.clone()
        }
    }

    /// Gains carried by the layout, if both `kp` and `kd` are present.
    pub fn gains(&self) -> Option<PdGains> {
        if self.kp.is_empty() || self.kd.is_empty() {
            return None;
        }
        PdGains::new(self.kp.clone(), self.kd.clone()).ok()
    }

    /// Parse and validate a JSON layout.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let layout: Self = serde_json::from_str(content)?;
        layout.validate()?;
        Ok(layout)
    }

    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT_JSON: &str = r#"{
        "joint_names": ["left_hip", "left_knee", "right_hip", "right_knee"],
        "default_joint_pos": [-0.1, 0.3, -0.1, 0.3],
        "kp": [100.0, 150.0, 100.0, 150.0],
        "kd": [2.0, 4.0, 2.0, 4.0]
    }"#;

    #[test]
    fn parses_full_layout() {
        let layout = ActionLayout::from_json(LAYOUT_JSON).unwrap();
        assert_eq!(layout.num_actions(), 4);
        assert_eq!(layout.default_pose(), vec![-0.1, 0.3, -0.1, 0.3]);
        let gains = layout.gains().unwrap();
        assert_eq!(gains.kp(), &[100.0, 150.0, 100.0, 150.0]);
        assert_eq!(gains.kd(), &[2.0, 4.0, 2.0, 4.0]);
    }

    #[test]
    fn names_only_layout_has_zero_pose_and_no_gains() {
        let layout = ActionLayout::from_json(r#"{"joint_names": ["a", "b"]}"#).unwrap();
        assert_eq!(layout.default_pose(), vec![0.0, 0.0]);
        assert!(layout.gains().is_none());
    }

    #[test]
    fn rejects_mismatched_gain_length() {
        let err = ActionLayout::from_json(r#"{"joint_names": ["a", "b"], "kp": [1.0]}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "kp"));
    }

    #[test]
    fn rejects_empty_joint_list() {
        let err = ActionLayout::from_json(r#"{"joint_names": []}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn malformed_json_is_json_error() {
        let err = ActionLayout::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
