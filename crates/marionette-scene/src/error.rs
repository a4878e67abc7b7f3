//! Error types for scene synthesis.

use std::path::PathBuf;

use marionette_core::types::MAX_ROBOTS;

use crate::scan::ScanError;

/// Errors that can occur while synthesizing a multi-robot scene.
///
/// All variants are terminal for the call: no partial scene is returned.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// No spawn configs were given.
    #[error("spawn config list is empty")]
    EmptyConfig,

    /// More spawn configs than the scene may hold.
    #[error("too many robots: {0} (at most {max})", max = MAX_ROBOTS)]
    TooManyRobots(usize),

    /// A spawn position has a NaN or infinite coordinate.
    #[error("spawn config {index} has a non-finite position")]
    InvalidSpawn { index: usize },

    /// The template has no anchor body to clone.
    #[error("anchor body '{0}' not found")]
    AnchorNotFound(String),

    /// The template has more than one anchor body.
    #[error("anchor body '{name}' appears {count} times")]
    DuplicateAnchor { name: String, count: usize },

    /// The template has no `<actuator>` block.
    #[error("actuator block not found")]
    ActuatorBlockNotFound,

    /// The template has more than one `<actuator>` block.
    #[error("actuator block appears {0} times")]
    DuplicateActuatorBlock(usize),

    /// Template structure the synthesizer cannot work with.
    #[error("malformed template: {0}")]
    Malformed(String),

    /// Unbalanced or unterminated markup.
    #[error("malformed template: {0}")]
    Scan(#[from] ScanError),

    /// Failed to read the template.
    #[error("failed to load template {path}: {source}")]
    TemplateLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write the synthesized scene.
    #[error("failed to write scene {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
