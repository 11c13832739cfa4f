//! Model module for the grain classifier CNN
//!
//! This module provides:
//! - The convolutional architecture (with optional scale-feature fusion)
//! - Model configuration and hyperparameters

pub mod cnn;
pub mod config;

// Re-export main types for convenience
pub use cnn::{ConvBlock, GrainClassifier};
pub use config::{ModelConfig, ModelKind};

/// Default dropout rate for regularization
pub const DEFAULT_DROPOUT: f64 = 0.5;

/// Default number of convolutional blocks
pub const DEFAULT_NUM_BLOCKS: usize = 3;

/// Default base filter count
pub const DEFAULT_FEATURES: usize = 16;
