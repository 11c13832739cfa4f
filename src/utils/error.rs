//! Error Handling Module
//!
//! Defines custom error types for the grain classification library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for grain classification operations
#[derive(Error, Debug)]
pub enum GrainError {
    /// Error loading or processing an image
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error during training
    #[error("Training error: {0}")]
    Training(String),

    /// The chosen loss function isn't valid
    #[error("Unknown loss function '{0}' (expected 'crossentropy' or 'focal')")]
    UnknownLossFunction(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Convenience Result type for grain classification operations
pub type Result<T> = std::result::Result<T, GrainError>;
