//! Grading Errors
//!
//! Only caller-side configuration mistakes are errors. Missing data and
//! degenerate populations resolve to `None` and never surface here.

use thiserror::Error;

/// Errors raised while building a registry, a config or a population.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GradingError {
    #[error("metric definition has an empty display name")]
    EmptyDisplayName,

    #[error("metric '{metric}' has an empty source key")]
    EmptySourceKey { metric: String },

    #[error("metric '{0}' is defined more than once")]
    DuplicateMetric(String),

    #[error("metric '{metric}' has a media filter with no entries")]
    EmptyMediaFilter { metric: String },

    #[error("metric '{metric}' has an invalid correction factor {factor}")]
    InvalidCorrectionFactor { metric: String, factor: f64 },

    #[error("metric '{metric}' has a detail gate with no allowed values")]
    EmptyDetailGate { metric: String },

    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("metric registry is empty")]
    EmptyRegistry,

    #[error("cutoff must be a positive episode number, got {0}")]
    InvalidCutoff(i64),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for GradingError {
    fn from(err: serde_json::Error) -> Self {
        GradingError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for GradingError {
    fn from(err: serde_yaml::Error) -> Self {
        GradingError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GradingError>;
