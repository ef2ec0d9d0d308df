//! Error types for the RepCoach core.
//!
//! Boundary failures (configuration, exercise selection, malformed frames)
//! are reported through [`RepCoachError`]. Missing or degenerate landmark
//! data is not an error of the session and is modelled separately by
//! [`crate::angle::Unavailable`].

use std::path::PathBuf;

/// A specialized `Result` type for RepCoach operations.
pub type Result<T> = std::result::Result<T, RepCoachError>;

/// Errors that can occur at the boundaries of the classification pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RepCoachError {
    // ========================================================================
    // Selection Errors
    // ========================================================================
    /// The requested exercise has no profile.
    #[error("Unknown exercise: '{name}'\n\nSuggestion: Use one of 'squat', 'lunge', 'dumbbell curl', 'shoulder press'")]
    UnknownExercise {
        /// The name that failed to resolve.
        name: String,
    },

    /// A frame arrived before any exercise was selected.
    #[error("No exercise selected\n\nSuggestion: Select an exercise before sending frames")]
    NoExerciseSelected,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your repcoach.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// A landmark frame could not be accepted.
    #[error("Invalid landmark frame: {message}")]
    InvalidFrame {
        /// Why the frame was rejected.
        message: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RepCoachError {
    /// Creates a new `UnknownExercise` error.
    #[must_use]
    pub fn unknown_exercise(name: impl Into<String>) -> Self {
        Self::UnknownExercise { name: name.into() }
    }

    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `InvalidFrame` error.
    #[must_use]
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    /// Returns `true` if this error should stop the process at startup.
    ///
    /// Selection and frame errors are rejected per request and never stop a
    /// running session.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. } | Self::ConfigValidationError { .. }
        )
    }
}
