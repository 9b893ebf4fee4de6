//! Error types

use thiserror::Error;

/// Errors raised while configuring networks and solvers
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid update_rule \"{0}\"")]
    UnknownUpdateRule(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    #[error("Invalid forward mode \"{0}\" (expected \"train\" or \"test\")")]
    InvalidMode(String),

    #[error("Invalid weight scale {0}: must be finite and non-negative")]
    InvalidWeightScale(f64),

    #[error("Invalid dropout probability {0}: must be in [0, 1]")]
    InvalidDropout(f64),

    #[error("Dataset mismatch for {split}: {inputs} inputs but {labels} labels")]
    DatasetMismatch {
        split: &'static str,
        inputs: usize,
        labels: usize,
    },

    #[error("The {0} split is empty")]
    EmptySplit(&'static str),

    #[error("{0} must be at least 1")]
    ZeroSetting(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for crate operations
pub type Result<T> = std::result::Result<T, Error>;
