//! Utility modules: metrics, experiment logging, structured logging, errors

pub mod error;
pub mod experiment;
pub mod logging;
pub mod metrics;

pub use error::{GrainError, Result};
pub use experiment::{EpochScalars, ExperimentLog};
pub use metrics::{AccuracyTracker, ClassAccuracy, ConfusionMatrix, Metrics};
