//! Error types for the weightplan_core library.

use serde::Serialize;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for weightplan_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store rejected or failed an operation
    #[error("Store error: {0}")]
    Store(String),

    /// Goal definition error
    #[error("Goal error: {0}")]
    Goal(String),

    /// Log entry rejected before it reached the store
    #[error("Invalid log entry: {0}")]
    Entry(String),

    /// Log import error
    #[error("Import error: {0}")]
    Import(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Coarse category of a [`Shortfall`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallKind {
    NoGoal,
    InsufficientData,
    ImplausibleResult,
    InvalidGoalConfiguration,
}

/// Why a calculation produced no value.
///
/// These are ordinary outcomes, not failures: they travel alongside results
/// so callers can tell "no goal" from "not enough data" from "bad number".
#[derive(Clone, Debug, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Shortfall {
    #[error("no active goal")]
    NoActiveGoal,

    #[error("need at least {required} days with both weight and calories, found {available}")]
    InsufficientEntries { available: usize, required: usize },

    #[error("need ≥{required_days} days coverage, have {span_days}")]
    InsufficientCoverage { span_days: i64, required_days: i64 },

    #[error("{what} of {value} kcal is outside the plausible range {min}–{max}")]
    ImplausibleResult {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("goal is missing {field}")]
    MissingField { field: &'static str },

    #[error("{field} is not valid: {detail}")]
    InvalidField { field: &'static str, detail: String },

    #[error("weekly rate is zero")]
    ZeroRate,

    #[error("no maintenance estimate available")]
    MissingMaintenance,
}

impl Shortfall {
    pub fn kind(&self) -> ShortfallKind {
        match self {
            Shortfall::NoActiveGoal => ShortfallKind::NoGoal,
            Shortfall::InsufficientEntries { .. }
            | Shortfall::InsufficientCoverage { .. }
            | Shortfall::MissingMaintenance => ShortfallKind::InsufficientData,
            Shortfall::ImplausibleResult { .. } => ShortfallKind::ImplausibleResult,
            Shortfall::MissingField { .. }
            | Shortfall::InvalidField { .. }
            | Shortfall::ZeroRate => ShortfallKind::InvalidGoalConfiguration,
        }
    }
}
