use marionette_core::error::{ConfigError, PolicyError};
use thiserror::Error;

/// Errors surfaced by the control loop.
#[derive(Debug, Error)]
pub enum LoopError {
    /// A policy failed during inference. The loop has stopped.
    #[error("Policy for robot {robot} failed: {source}")]
    Inference {
        robot: usize,
        #[source]
        source: PolicyError,
    },

    /// A policy failed to reset. The loop keeps running.
    #[error("Policy reset for robot {robot} failed: {source}")]
    Reset {
        robot: usize,
        #[source]
        source: PolicyError,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The loop was dropped before answering a handle request.
    #[error("Control loop is not running")]
    Stopped,
}
