//! Error types surfaced by the environment.
use thiserror::Error;

use crate::track::MapKind;

/// Configuration invariant violations detected by `validate()`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnvConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be finite (got {value})")]
    NonFinite { field: &'static str, value: f64 },
}

/// Raised when a discrete action index is outside `0..=3`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ActionError {
    #[error("invalid action {0}; expected 0 (accelerate), 1 (brake), 2 (left) or 3 (right)")]
    Invalid(i64),
}

/// Reward shaper construction and registration failures.
#[derive(Debug, Error)]
pub enum RewardError {
    #[error("unknown reward shaper '{name}'; registered: {}", available.join(", "))]
    UnknownShaper {
        name: String,
        available: Vec<String>,
    },
    #[error("reward shaper names must be non-empty and free of whitespace (got '{0}')")]
    InvalidName(String),
    #[error("invalid parameters for reward shaper '{name}': {source}")]
    InvalidParams {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("reward shaper '{name}' weight '{field}' must be finite")]
    NonFiniteWeight { name: String, field: &'static str },
}

/// Top-level environment error.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error(transparent)]
    Config(#[from] EnvConfigError),
    #[error(transparent)]
    Reward(#[from] RewardError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("no drivable spawn point found on {map} after {attempts} attempts")]
    SpawnExhausted { attempts: u32, map: MapKind },
    #[error("environment must be reset before stepping")]
    NotReset,
    #[error("episode has finished; call reset to start a new one")]
    EpisodeFinished,
    #[error("expected {expected} actions, got {actual}")]
    ActionCount { expected: usize, actual: usize },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
