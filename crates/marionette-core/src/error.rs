use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid physics_dt: {0} (must be > 0)")]
    InvalidPhysicsDt(f64),

    #[error("Invalid control_dt: {0} (must be > 0)")]
    InvalidControlDt(f64),

    #[error("Too many robots: {0} (at most {max})", max = crate::types::MAX_ROBOTS)]
    TooManyRobots(usize),

    #[error("Gain length mismatch: kp={kp}, kd={kd}")]
    GainLengthMismatch { kp: usize, kd: usize },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Action target validation errors.
///
/// Copy + static messages for cheap propagation in the control hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Policy produced no action")]
    Missing,

    #[error("Action is empty")]
    Empty,

    #[error("Action dimension mismatch: expected {expected}, got {got}")]
    DimMismatch { expected: usize, got: usize },

    #[error("Action contains non-finite value at dimension {dim}")]
    NonFinite { dim: usize },
}

/// Errors raised by a policy implementation.
///
/// Any of these returned from [`Policy::step`](crate::traits::Policy::step)
/// stops the control loop.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Observation dimension mismatch: expected {expected}, got {got}")]
    ObservationDimMismatch { expected: usize, got: usize },

    #[error("Reset failed: {0}")]
    Reset(String),
}
