//! Model and Training Configuration
//!
//! Serde-backed configuration for the CNN architecture and training
//! hyperparameters, with JSON save/load and validation.

use serde::{Deserialize, Serialize};

use crate::dataset::{IMAGE_HEIGHT, IMAGE_WIDTH, NUM_CLASSES};
use crate::utils::error::{GrainError, Result};

/// Which model variant to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Plain convolutional classifier over the image alone
    ConvNet,
    /// Classifier that fuses the per-sample scale scalar into the head
    ConvNetScale,
}

impl ModelKind {
    /// Short name used in run directories and checkpoint filenames
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::ConvNet => "convnet",
            ModelKind::ConvNetScale => "convnet-scale",
        }
    }
}

impl Default for ModelKind {
    fn default() -> Self {
        Self::ConvNet
    }
}

impl std::str::FromStr for ModelKind {
    type Err = GrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "convnet" => Ok(ModelKind::ConvNet),
            "convnet-scale" | "convnetscale" => Ok(ModelKind::ConvNetScale),
            other => Err(GrainError::Config(format!(
                "unknown model kind '{}' (expected 'convnet' or 'convnet-scale')",
                other
            ))),
        }
    }
}

/// Configuration for the CNN architecture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model variant
    pub kind: ModelKind,

    /// Number of output classes
    pub num_classes: usize,

    /// Input image height
    pub height: usize,

    /// Input image width
    pub width: usize,

    /// Base number of convolutional filters; doubles each block
    pub n_features: usize,

    /// Number of convolutional blocks
    pub num_blocks: usize,

    /// Dropout rate for the classifier head (0.0 to 1.0)
    pub droprate: f64,

    /// Number of input channels (3 for RGB)
    pub in_channels: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::ConvNet,
            num_classes: NUM_CLASSES,
            height: IMAGE_HEIGHT,
            width: IMAGE_WIDTH,
            n_features: super::DEFAULT_FEATURES,
            num_blocks: super::DEFAULT_NUM_BLOCKS,
            droprate: super::DEFAULT_DROPOUT,
            in_channels: 3,
        }
    }
}

impl ModelConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(GrainError::Config(
                "num_classes must be greater than 0".to_string(),
            ));
        }

        if self.num_blocks == 0 {
            return Err(GrainError::Config(
                "num_blocks must be greater than 0".to_string(),
            ));
        }

        // Each block halves both spatial dimensions.
        let divisor = 1usize << self.num_blocks;
        if self.height % divisor != 0 || self.width % divisor != 0 {
            return Err(GrainError::Config(format!(
                "image size {}x{} is not divisible by 2^{} (num_blocks)",
                self.height, self.width, self.num_blocks
            )));
        }

        if !(0.0..1.0).contains(&self.droprate) {
            return Err(GrainError::Config(
                "droprate must be in range [0.0, 1.0)".to_string(),
            ));
        }

        if self.n_features == 0 {
            return Err(GrainError::Config(
                "n_features must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Filter count of the last convolutional block
    pub fn final_filters(&self) -> usize {
        self.n_features << (self.num_blocks - 1)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GrainError::Serialization(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| GrainError::Serialization(e.to_string()))
    }
}

/// Learning rate scheduler types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LrScheduleKind {
    /// Constant learning rate
    Constant,
    /// Step decay every 10 epochs
    StepDecay,
    /// Exponential decay per epoch
    Exponential,
    /// Cosine annealing over the run
    CosineAnnealing,
}

impl Default for LrScheduleKind {
    fn default() -> Self {
        Self::StepDecay
    }
}

impl std::str::FromStr for LrScheduleKind {
    type Err = GrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "constant" => Ok(Self::Constant),
            "step" | "step-decay" => Ok(Self::StepDecay),
            "exponential" => Ok(Self::Exponential),
            "cosine" | "cosine-annealing" => Ok(Self::CosineAnnealing),
            other => Err(GrainError::Config(format!(
                "unknown lr schedule '{}' (expected 'constant', 'step', 'exponential' or 'cosine')",
                other
            ))),
        }
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,

    /// Batch size
    pub batch_size: usize,

    /// Initial learning rate
    pub learning_rate: f64,

    /// Weight decay (L2 regularization)
    pub weight_decay: f32,

    /// Learning rate scheduler
    pub lr_schedule: LrScheduleKind,

    /// Loss function name ("crossentropy" or "focal")
    pub loss_function: String,

    /// Focusing parameter for the focal loss
    pub gamma: f64,

    /// Whether the focal loss uses the class-frequency weight table
    pub weighted: bool,

    /// Fraction of samples held out for the test set
    pub test_fraction: f64,

    /// Random seed for reproducibility
    pub seed: u64,

    /// Augmentation intensity; 0.0 disables augmentation
    pub augment_intensity: f32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 1,
            batch_size: 128,
            learning_rate: 0.1,
            weight_decay: 1e-4,
            lr_schedule: LrScheduleKind::StepDecay,
            loss_function: "crossentropy".to_string(),
            gamma: 2.0,
            weighted: true,
            test_fraction: 0.2,
            seed: 42,
            augment_intensity: 0.0,
        }
    }
}

impl TrainingConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(GrainError::Config("epochs must be greater than 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(GrainError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(GrainError::Config(
                "learning_rate must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(GrainError::Config(
                "test_fraction must be in range [0.0, 1.0)".to_string(),
            ));
        }
        if self.gamma < 0.0 {
            return Err(GrainError::Config("gamma must be non-negative".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_model_config_default_valid() {
        let config = ModelConfig::default();
        assert_eq!(config.num_classes, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_model_config_validation() {
        let mut config = ModelConfig::default();
        config.num_classes = 0;
        assert!(config.validate().is_err());

        config = ModelConfig::default();
        config.height = 100; // 100 not divisible by 2^3
        assert!(config.validate().is_err());

        config = ModelConfig::default();
        config.droprate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_final_filters() {
        let config = ModelConfig {
            n_features: 16,
            num_blocks: 3,
            ..Default::default()
        };
        // 16 -> 32 -> 64
        assert_eq!(config.final_filters(), 64);
    }

    #[test]
    fn test_model_kind_parse() {
        assert_eq!(ModelKind::from_str("convnet").unwrap(), ModelKind::ConvNet);
        assert_eq!(
            ModelKind::from_str("convnet-scale").unwrap(),
            ModelKind::ConvNetScale
        );
        assert!(ModelKind::from_str("resnet").is_err());
    }

    #[test]
    fn test_training_config_validation() {
        let config = TrainingConfig::default();
        assert!(config.validate().is_ok());

        let mut bad = TrainingConfig::default();
        bad.test_fraction = 1.0;
        assert!(bad.validate().is_err());

        let mut bad = TrainingConfig::default();
        bad.gamma = -1.0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_model_config_json_roundtrip() {
        let config = ModelConfig {
            kind: ModelKind::ConvNetScale,
            n_features: 32,
            ..Default::default()
        };

        let path = std::env::temp_dir().join(format!(
            "grainclass_model_config_{}.json",
            std::process::id()
        ));
        config.save(&path).unwrap();
        let loaded = ModelConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.kind, ModelKind::ConvNetScale);
        assert_eq!(loaded.n_features, 32);
    }
}
