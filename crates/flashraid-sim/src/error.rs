//! Error types for the simulation

use std::path::PathBuf;

use thiserror::Error;

/// Simulation and scenario errors
#[derive(Debug, Error)]
pub enum SimError {
    /// Failed to read a scenario file
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Scenario file is not valid TOML or does not match the schema
    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),

    /// Scenario or board configuration is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error from the controller model or a host-side helper
    #[error("{0}")]
    Core(#[from] flashraid_core::Error),

    /// An expectation did not hold
    #[error("Step {index} ({step}): {message}")]
    Expectation {
        /// Step index
        index: usize,
        /// Step kind
        step: String,
        /// What went wrong
        message: String,
    },
}

/// Result type for simulation operations
pub type Result<T> = std::result::Result<T, SimError>;
