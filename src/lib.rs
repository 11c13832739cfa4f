//! Grain Image Classification with Burn
//!
//! Trains a convolutional classifier over five grain types (Barley, Broken,
//! Oat, Rye, Wheat) with either plain cross-entropy or a class-weighted
//! focal loss, per-class accuracy tracking, file-based experiment logging,
//! and timestamped checkpoints.

pub mod backend;
pub mod dataset;
pub mod model;
pub mod training;
pub mod utils;

pub use backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
pub use dataset::{GRAIN_CLASSES, IMAGE_HEIGHT, IMAGE_WIDTH, NUM_CLASSES};
pub use model::{GrainClassifier, ModelConfig, ModelKind};
pub use training::{run_training, LossFunction, RunPaths, TrainingMode};
pub use utils::error::{GrainError, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
