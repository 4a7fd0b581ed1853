//! Error types for the circuit_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for circuit_core operations
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

    /// Catalog validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// Key-value store error
    #[error("Store error: {0}")]
    Store(String),

    /// Too few exercises match the active filters to start a session
    #[error(
        "Only {available} exercises match the current filters; at least {required} are needed to start a workout"
    )]
    InsufficientPool { available: usize, required: usize },

    /// A plan without any main exercises cannot be run
    #[error("Workout plan has no main exercises")]
    EmptyPlan,

    /// Rejected custom exercise definition
    #[error("Invalid custom exercise: {0}")]
    InvalidCustomExercise(String),

    /// Session runner misuse (e.g. completing a session twice)
    #[error("Session error: {0}")]
    Session(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
