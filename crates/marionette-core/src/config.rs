use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::time::LoopTiming;
use crate::types::{MAX_ROBOTS, RobotSpawnConfig};

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_control_dt() -> f64 {
    0.02
}
const fn default_rate_window_ms() -> u64 {
    500
}
const fn default_drag_stiffness() -> f64 {
    250.0
}
const fn default_drag_max_force() -> f64 {
    1000.0
}

// ---------------------------------------------------------------------------
// DragConfig
// ---------------------------------------------------------------------------

/// Interactive drag force tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragConfig {
    /// Spring stiffness per kilogram of the dragged body (N/(m·kg)).
    #[serde(default = "default_drag_stiffness")]
    pub stiffness: f64,
    /// Ceiling on the applied force magnitude (N).
    #[serde(default = "default_drag_max_force")]
    pub max_force: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            stiffness: default_drag_stiffness(),
            max_force: default_drag_max_force(),
        }
    }
}

// ---------------------------------------------------------------------------
// PdConfig
// ---------------------------------------------------------------------------

/// Global PD gains used for robots whose policy ships none.
///
/// A single value is broadcast to every joint.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PdConfig {
    #[serde(default)]
    pub kp: f32,
    #[serde(default)]
    pub kd: f32,
}

// ---------------------------------------------------------------------------
// LoopConfig
// ---------------------------------------------------------------------------

/// Control loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Physics timestep override in seconds. `None` uses the model's own.
    #[serde(default)]
    pub physics_dt: Option<f64>,

    /// Policy period in seconds (default: 0.02 = 50 Hz).
    #[serde(default = "default_control_dt")]
    pub control_dt: f64,

    /// Window of the rolling simulation-rate measurement in milliseconds.
    #[serde(default = "default_rate_window_ms")]
    pub rate_window_ms: u64,

    #[serde(default)]
    pub drag: DragConfig,

    /// Global PD fallback. `None` means robots without policy gains are
    /// left uncontrolled.
    #[serde(default)]
    pub pd: Option<PdConfig>,

    /// Spawn poses. Empty means a single robot at the template's own pose,
    /// which `marionette synth --config` reads from the anchor body.
    #[serde(default)]
    pub robots: Vec<RobotSpawnConfig>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            physics_dt: None,
            control_dt: default_control_dt(),
            rate_window_ms: default_rate_window_ms(),
            drag: DragConfig::default(),
            pd: None,
            robots: Vec::new(),
        }
    }
}

impl LoopConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dt) = self.physics_dt {
            if !dt.is_finite() || dt <= 0.0 {
                return Err(ConfigError::InvalidPhysicsDt(dt));
            }
        }
        if !self.control_dt.is_finite() || self.control_dt <= 0.0 {
            return Err(ConfigError::InvalidControlDt(self.control_dt));
        }
        if self.robots.len() > MAX_ROBOTS {
            return Err(ConfigError::TooManyRobots(self.robots.len()));
        }
        if let Some(index) = self.robots.iter().position(|r| !r.is_finite()) {
            return Err(invalid(&format!("robots[{index}]"), "position must be finite"));
        }
        if self.rate_window_ms == 0 {
            return Err(invalid("rate_window_ms", "must be > 0"));
        }
        if self.drag.stiffness.is_nan() || self.drag.stiffness < 0.0 {
            return Err(invalid("drag.stiffness", "must be >= 0"));
        }
        if self.drag.max_force.is_nan() || self.drag.max_force <= 0.0 {
            return Err(invalid("drag.max_force", "must be > 0"));
        }
        Ok(())
    }

    /// Timing derived against the model's own timestep.
    pub fn timing(&self, model_timestep: f64) -> LoopTiming {
        LoopTiming::new(self.physics_dt.unwrap_or(model_timestep), self.control_dt)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
