//! Training Module
//!
//! Loss functions, learning rate scheduling, the epoch-level trainer, and
//! the end-to-end run driver.

pub mod loss;
pub mod run;
pub mod scheduler;
pub mod trainer;

pub use loss::{ClassWeights, FocalLoss, LossFunction};
pub use run::{run_training, RunPaths, TrainingMode, TrainingReport};
pub use scheduler::LrSchedule;
pub use trainer::{Trainer, TrainingState};

/// Default focusing parameter for the focal loss
pub const DEFAULT_GAMMA: f64 = 2.0;
