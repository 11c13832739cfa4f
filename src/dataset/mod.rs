//! Dataset module for grain kernel image data
//!
//! This module provides:
//! - Loading the grain image dataset from disk (one directory per class)
//! - A seeded, stratified train/test split
//! - Burn `Dataset`/`Batcher` integration for training batches
//! - Optional training-time augmentation

pub mod augmentation;
pub mod burn_dataset;
pub mod loader;
pub mod split;

// Re-export main types for convenience
pub use augmentation::Augmenter;
pub use burn_dataset::{batch_range, GrainBatch, GrainBatcher, GrainBurnDataset, GrainItem, Preprocess};
pub use loader::{DatasetStats, GrainDataset, GrainSample};
pub use split::{train_test_split, SplitConfig};

/// Number of grain classes
pub const NUM_CLASSES: usize = 5;

/// Default image height (grain kernel crops are tall)
pub const IMAGE_HEIGHT: usize = 256;

/// Default image width
pub const IMAGE_WIDTH: usize = 128;

/// Grain class names, indexed by label id
pub const GRAIN_CLASSES: [&str; NUM_CLASSES] = ["Barley", "Broken", "Oat", "Rye", "Wheat"];

/// Observed class frequencies in the grain dataset, indexed by label id
///
/// Barley dominates the collection while broken kernels are rare; the focal
/// loss weight table is derived from these (see `training::loss`).
pub const CLASS_FREQUENCIES: [f32; NUM_CLASSES] = [0.455, 0.015, 0.227, 0.136, 0.166];

/// Get the class name for a given label index
pub fn class_name(label: usize) -> Option<&'static str> {
    GRAIN_CLASSES.get(label).copied()
}

/// Get the label index for a given class name
pub fn class_index(name: &str) -> Option<usize> {
    GRAIN_CLASSES.iter().position(|&n| n == name)
}
