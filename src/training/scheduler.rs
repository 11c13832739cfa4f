//! Learning Rate Scheduling
//!
//! Epoch-level learning rate schedules. The rate is a pure function of the
//! epoch index, so a run that skips per-epoch evaluation sees exactly the
//! same rate trajectory as a monitored run.

use serde::{Deserialize, Serialize};

use crate::model::config::LrScheduleKind;

/// Learning rate schedule evaluated per epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LrSchedule {
    /// Constant learning rate (no scheduling)
    Constant { lr: f64 },

    /// Step decay: multiply by `decay_factor` every `step_size` epochs
    StepDecay {
        initial_lr: f64,
        decay_factor: f64,
        step_size: usize,
    },

    /// Exponential decay: lr = initial_lr * decay_rate^epoch
    Exponential { initial_lr: f64, decay_rate: f64 },

    /// Cosine annealing: smooth decay following a cosine curve
    CosineAnnealing {
        initial_lr: f64,
        min_lr: f64,
        total_epochs: usize,
    },
}

impl LrSchedule {
    /// Create a constant schedule
    pub fn constant(lr: f64) -> Self {
        Self::Constant { lr }
    }

    /// Create a step decay schedule
    pub fn step_decay(initial_lr: f64, decay_factor: f64, step_size: usize) -> Self {
        Self::StepDecay {
            initial_lr,
            decay_factor,
            step_size,
        }
    }

    /// Create an exponential decay schedule
    pub fn exponential(initial_lr: f64, decay_rate: f64) -> Self {
        Self::Exponential {
            initial_lr,
            decay_rate,
        }
    }

    /// Create a cosine annealing schedule
    pub fn cosine_annealing(initial_lr: f64, min_lr: f64, total_epochs: usize) -> Self {
        Self::CosineAnnealing {
            initial_lr,
            min_lr,
            total_epochs,
        }
    }

    /// Build a schedule from the configured kind, initial rate and run length
    pub fn from_kind(kind: LrScheduleKind, initial_lr: f64, total_epochs: usize) -> Self {
        match kind {
            LrScheduleKind::Constant => Self::constant(initial_lr),
            LrScheduleKind::StepDecay => Self::step_decay(initial_lr, 0.1, 10),
            LrScheduleKind::Exponential => Self::exponential(initial_lr, 0.95),
            LrScheduleKind::CosineAnnealing => {
                Self::cosine_annealing(initial_lr, initial_lr * 1e-3, total_epochs)
            }
        }
    }

    /// Learning rate for a given epoch (zero-based)
    pub fn lr_at(&self, epoch: usize) -> f64 {
        match self {
            Self::Constant { lr } => *lr,

            Self::StepDecay {
                initial_lr,
                decay_factor,
                step_size,
            } => initial_lr * decay_factor.powi((epoch / step_size) as i32),

            Self::Exponential {
                initial_lr,
                decay_rate,
            } => initial_lr * decay_rate.powi(epoch as i32),

            Self::CosineAnnealing {
                initial_lr,
                min_lr,
                total_epochs,
            } => {
                let progress = (epoch as f64) / (*total_epochs as f64).max(1.0);
                let cosine_factor = (1.0 + (std::f64::consts::PI * progress).cos()) / 2.0;
                min_lr + (initial_lr - min_lr) * cosine_factor
            }
        }
    }

    /// Short description for logs
    pub fn description(&self) -> String {
        match self {
            Self::Constant { lr } => format!("Constant LR: {:.6}", lr),
            Self::StepDecay {
                initial_lr,
                decay_factor,
                step_size,
            } => format!(
                "Step Decay: initial={:.6}, factor={}, every {} epochs",
                initial_lr, decay_factor, step_size
            ),
            Self::Exponential {
                initial_lr,
                decay_rate,
            } => format!(
                "Exponential: initial={:.6}, decay={:.4}",
                initial_lr, decay_rate
            ),
            Self::CosineAnnealing {
                initial_lr,
                min_lr,
                total_epochs,
            } => format!(
                "Cosine Annealing: initial={:.6}, min={:.6}, epochs={}",
                initial_lr, min_lr, total_epochs
            ),
        }
    }
}

impl Default for LrSchedule {
    fn default() -> Self {
        Self::StepDecay {
            initial_lr: 0.1,
            decay_factor: 0.1,
            step_size: 10,
        }
    }
}
