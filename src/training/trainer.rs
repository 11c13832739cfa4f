//! Training Loop for the Grain Classifier
//!
//! Implements the epoch-level training loop using the Burn framework:
//! - Forward/backward passes with automatic differentiation
//! - Cross-entropy or class-weighted focal loss
//! - Adam optimizer with epoch-level learning rate scheduling
//! - Evaluation on the inner (non-autodiff) backend
//! - Checkpoint saving and loading

use std::path::Path;

use burn::{
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, ElementConversion, Int, Tensor},
};
use tracing::{debug, info};

use crate::dataset::GrainBatch;
use crate::model::config::TrainingConfig;
use crate::model::GrainClassifier;
use crate::training::loss::{ClassWeights, FocalLoss, LossFunction};
use crate::training::scheduler::LrSchedule;
use crate::utils::metrics::Metrics;

/// Training state for checkpointing and monitoring
#[derive(Debug, Clone)]
pub struct TrainingState {
    /// Current epoch (0-indexed)
    pub epoch: usize,
    /// Current iteration within epoch
    pub iteration: usize,
    /// Best test accuracy seen so far
    pub best_test_accuracy: f64,
    /// Training loss history (per epoch)
    pub train_losses: Vec<f64>,
    /// Test accuracy history (per epoch)
    pub test_accuracies: Vec<f64>,
    /// Total training samples seen
    pub samples_seen: usize,
    /// Current learning rate
    pub current_lr: f64,
}

impl Default for TrainingState {
    fn default() -> Self {
        Self {
            epoch: 0,
            iteration: 0,
            best_test_accuracy: 0.0,
            train_losses: Vec::new(),
            test_accuracies: Vec::new(),
            samples_seen: 0,
            current_lr: 0.1,
        }
    }
}

impl TrainingState {
    /// Create a new training state with initial learning rate
    pub fn new(initial_lr: f64) -> Self {
        Self {
            current_lr: initial_lr,
            ..Default::default()
        }
    }

    /// Record training loss for current epoch
    pub fn record_train_loss(&mut self, loss: f64) {
        if self.train_losses.len() <= self.epoch {
            self.train_losses.push(loss);
        } else {
            self.train_losses[self.epoch] = loss;
        }
    }

    /// Record test accuracy for current epoch, tracking the best so far
    pub fn record_test_accuracy(&mut self, accuracy: f64) {
        if self.test_accuracies.len() <= self.epoch {
            self.test_accuracies.push(accuracy);
        } else {
            self.test_accuracies[self.epoch] = accuracy;
        }
        if accuracy > self.best_test_accuracy {
            self.best_test_accuracy = accuracy;
        }
    }
}

/// Trainer for the grain classifier
pub struct Trainer<B: AutodiffBackend> {
    /// Model being trained
    pub model: GrainClassifier<B>,
    /// Adam optimizer
    optimizer: burn::optim::adaptor::OptimizerAdaptor<
        burn::optim::Adam<B::InnerBackend>,
        GrainClassifier<B>,
        B,
    >,
    /// Training configuration
    pub config: TrainingConfig,
    /// Loss selection
    loss_function: LossFunction,
    /// Focal loss (used when the focal loss is selected)
    focal: FocalLoss,
    /// Learning rate schedule
    schedule: LrSchedule,
    /// Current training state
    pub state: TrainingState,
    /// Device to train on
    device: B::Device,
    /// Number of classes
    num_classes: usize,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a new trainer with the given model and configuration
    pub fn new(
        model: GrainClassifier<B>,
        config: TrainingConfig,
        loss_function: LossFunction,
        class_weights: ClassWeights,
        device: B::Device,
    ) -> Self {
        let optimizer = AdamConfig::new()
            .with_weight_decay(Some(burn::optim::decay::WeightDecayConfig::new(
                config.weight_decay as f64,
            )))
            .init();

        let schedule = LrSchedule::from_kind(config.lr_schedule, config.learning_rate, config.epochs);
        let num_classes = model.num_classes();

        Self {
            model,
            optimizer,
            focal: FocalLoss::new(config.gamma, class_weights),
            loss_function,
            schedule,
            state: TrainingState::new(config.learning_rate),
            config,
            device,
            num_classes,
        }
    }

    /// Compute the configured loss from logits and targets
    fn compute_loss(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        match self.loss_function {
            LossFunction::CrossEntropy => CrossEntropyLossConfig::new()
                .init(&logits.device())
                .forward(logits, targets),
            LossFunction::Focal => self.focal.forward(logits, targets),
        }
    }

    /// Train for one epoch
    ///
    /// Returns `(average_loss, accuracy)` over the epoch.
    pub fn train_epoch(&mut self, batches: &[GrainBatch<B>]) -> (f64, f64) {
        let mut total_loss = 0.0;
        let mut correct = 0usize;
        let mut total = 0usize;
        let num_batches = batches.len();

        info!(
            "Training epoch {} with {} batches (lr = {:.6})",
            self.state.epoch + 1,
            num_batches,
            self.state.current_lr
        );

        for (batch_idx, batch) in batches.iter().enumerate() {
            let output = self
                .model
                .forward(batch.images.clone(), Some(batch.scales.clone()));

            let loss = self.compute_loss(output.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            total_loss += loss_value;

            let predictions = output.argmax(1).squeeze::<1>(1);
            let batch_correct_tensor = predictions.equal(batch.targets.clone()).int().sum();
            let batch_correct: i64 = batch_correct_tensor.into_scalar().elem();
            correct += batch_correct as usize;
            total += batch.targets.dims()[0];

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self
                .optimizer
                .step(self.state.current_lr, self.model.clone(), grads);

            self.state.iteration += 1;
            self.state.samples_seen += batch.targets.dims()[0];

            if (batch_idx + 1) % 10 == 0 || batch_idx == num_batches - 1 {
                debug!(
                    "  Batch {}/{}: loss = {:.4}, acc = {:.2}%",
                    batch_idx + 1,
                    num_batches,
                    loss_value,
                    100.0 * correct as f64 / total.max(1) as f64
                );
            }
        }

        let avg_loss = if num_batches > 0 {
            total_loss / num_batches as f64
        } else {
            0.0
        };
        let accuracy = if total > 0 {
            correct as f64 / total as f64
        } else {
            0.0
        };

        self.state.record_train_loss(avg_loss);

        info!(
            "Epoch {} training: loss = {:.4}, accuracy = {:.2}%",
            self.state.epoch + 1,
            avg_loss,
            accuracy * 100.0
        );

        (avg_loss, accuracy)
    }

    /// Evaluate the model on a test set
    ///
    /// Uses the inner (non-autodiff) model. Prediction and target counters
    /// are local to the call, so repeated evaluations never accumulate.
    pub fn evaluate(&self, batches: &[GrainBatch<B::InnerBackend>]) -> Metrics {
        let model_valid = self.model.valid();

        let mut correct = 0usize;
        let mut total = 0usize;
        let mut total_loss = 0.0;
        let mut all_predictions: Vec<usize> = Vec::new();
        let mut all_targets: Vec<usize> = Vec::new();

        for batch in batches.iter() {
            let output = model_valid.forward(batch.images.clone(), Some(batch.scales.clone()));

            let batch_size = batch.targets.dims()[0];
            let loss = CrossEntropyLossConfig::new()
                .init(&output.device())
                .forward(output.clone(), batch.targets.clone());
            let loss_value: f64 = loss.into_scalar().elem();
            // Weight by batch size so a short final batch does not skew the
            // average.
            total_loss += loss_value * batch_size as f64;

            let predictions = output.argmax(1).squeeze::<1>(1);

            let batch_correct_tensor = predictions
                .clone()
                .equal(batch.targets.clone())
                .int()
                .sum();
            let batch_correct: i64 = batch_correct_tensor.into_scalar().elem();
            correct += batch_correct as usize;
            total += batch_size;

            let pred_vec: Vec<i64> = predictions.into_data().to_vec().unwrap();
            let target_vec: Vec<i64> = batch.targets.clone().into_data().to_vec().unwrap();

            all_predictions.extend(pred_vec.iter().map(|&p| p as usize));
            all_targets.extend(target_vec.iter().map(|&t| t as usize));
        }

        let accuracy = if total > 0 {
            correct as f64 / total as f64
        } else {
            0.0
        };
        let avg_loss = total_loss / total.max(1) as f64;

        let mut metrics =
            Metrics::from_predictions(&all_predictions, &all_targets, self.num_classes);
        metrics.loss = Some(avg_loss);
        metrics.accuracy = accuracy;

        info!(
            "Evaluation: loss = {:.4}, accuracy = {:.2}%, samples = {}",
            avg_loss,
            accuracy * 100.0,
            total
        );

        metrics
    }

    /// Save model checkpoint
    pub fn save_checkpoint(&self, path: &Path) -> anyhow::Result<()> {
        info!("Saving checkpoint to {:?}", path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let recorder = CompactRecorder::new();
        self.model
            .clone()
            .save_file(path, &recorder)
            .map_err(|e| anyhow::anyhow!("Failed to save model: {:?}", e))?;

        info!("Checkpoint saved (epoch {})", self.state.epoch + 1);

        Ok(())
    }

    /// Load model from checkpoint
    pub fn load_checkpoint(&mut self, path: &Path) -> anyhow::Result<()> {
        info!("Loading checkpoint from {:?}", path);

        let recorder = CompactRecorder::new();
        self.model = self
            .model
            .clone()
            .load_file(path, &recorder, &self.device)
            .map_err(|e| anyhow::anyhow!("Failed to load model: {:?}", e))?;

        info!("Checkpoint loaded successfully");

        Ok(())
    }

    /// Advance to the next epoch and update the learning rate
    pub fn next_epoch(&mut self) {
        self.state.epoch += 1;
        self.state.iteration = 0;

        let lr = self.schedule.lr_at(self.state.epoch);
        if (lr - self.state.current_lr).abs() > 1e-12 {
            debug!(
                "Learning rate updated: {:.6} -> {:.6}",
                self.state.current_lr, lr
            );
        }
        self.state.current_lr = lr;
    }

    /// Current learning rate
    pub fn current_lr(&self) -> f64 {
        self.state.current_lr
    }

    /// Reference to the model
    pub fn model(&self) -> &GrainClassifier<B> {
        &self.model
    }

    /// The training device
    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

/// Compute accuracy from logits and targets
pub fn accuracy<B: burn::tensor::backend::Backend>(
    output: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
) -> f64 {
    let predictions = output.argmax(1).squeeze::<1>(1);
    let correct_tensor = predictions.equal(targets.clone()).int().sum();
    let correct: i64 = correct_tensor.into_scalar().elem();
    let total = targets.dims()[0];

    if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::prelude::*;

    use crate::model::config::{ModelConfig, ModelKind};

    type TestBackend = Autodiff<NdArray>;

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            epochs: 3,
            batch_size: 4,
            learning_rate: 0.01,
            ..Default::default()
        }
    }

    fn small_model(device: &<TestBackend as Backend>::Device) -> GrainClassifier<TestBackend> {
        let config = ModelConfig {
            kind: ModelKind::ConvNet,
            height: 16,
            width: 8,
            n_features: 4,
            num_blocks: 2,
            ..Default::default()
        };
        GrainClassifier::new(&config, device)
    }

    fn tiny_batch(device: &<TestBackend as Backend>::Device) -> GrainBatch<TestBackend> {
        let images = Tensor::zeros([4, 3, 16, 8], device);
        let targets = Tensor::from_ints([0, 1, 2, 3], device);
        let scales = Tensor::ones([4], device);
        GrainBatch {
            images,
            targets,
            scales,
        }
    }

    #[test]
    fn test_training_state_records() {
        let mut state = TrainingState::new(0.1);

        state.record_train_loss(0.5);
        assert_eq!(state.train_losses, vec![0.5]);

        state.record_test_accuracy(0.6);
        state.record_test_accuracy(0.8);
        assert_eq!(state.best_test_accuracy, 0.8);
    }

    #[test]
    fn test_train_epoch_produces_finite_loss() {
        let device = Default::default();
        let model = small_model(&device);
        let mut trainer = Trainer::new(
            model,
            small_config(),
            LossFunction::CrossEntropy,
            ClassWeights::grain_default(),
            device,
        );

        let batch = tiny_batch(trainer.device());
        let (loss, acc) = trainer.train_epoch(&[batch]);

        assert!(loss.is_finite());
        assert!((0.0..=1.0).contains(&acc));
        assert_eq!(trainer.state.iteration, 1);
        assert_eq!(trainer.state.samples_seen, 4);
    }

    #[test]
    fn test_next_epoch_follows_schedule() {
        let device = Default::default();
        let model = small_model(&device);
        let config = TrainingConfig {
            epochs: 30,
            learning_rate: 0.1,
            lr_schedule: crate::model::config::LrScheduleKind::StepDecay,
            ..Default::default()
        };
        let mut trainer = Trainer::new(
            model,
            config,
            LossFunction::Focal,
            ClassWeights::grain_default(),
            device,
        );

        assert!((trainer.current_lr() - 0.1).abs() < 1e-12);
        for _ in 0..10 {
            trainer.next_epoch();
        }
        assert!((trainer.current_lr() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_reports_per_class_counts() {
        let device = Default::default();
        let model = small_model(&device);
        let trainer = Trainer::new(
            model,
            small_config(),
            LossFunction::CrossEntropy,
            ClassWeights::grain_default(),
            device,
        );

        let inner_device = Default::default();
        let batch = GrainBatch::<NdArray> {
            images: Tensor::zeros([4, 3, 16, 8], &inner_device),
            targets: Tensor::from_ints([0, 0, 1, 2], &inner_device),
            scales: Tensor::ones([4], &inner_device),
        };

        let metrics = trainer.evaluate(&[batch]);
        assert_eq!(metrics.total_samples, 4);
        assert_eq!(metrics.per_class.len(), 5);

        let totals: usize = metrics.per_class.iter().map(|c| c.total).sum();
        assert_eq!(totals, 4);
    }

    #[test]
    fn test_evaluate_loss_averages_over_samples_not_batches() {
        let device = Default::default();
        let model = small_model(&device);
        let trainer = Trainer::new(
            model,
            small_config(),
            LossFunction::CrossEntropy,
            ClassWeights::grain_default(),
            device,
        );

        let inner_device: <NdArray as Backend>::Device = Default::default();
        let sample_images = |v: f32| Tensor::<NdArray, 4>::ones([1, 3, 16, 8], &inner_device).mul_scalar(v);
        let single = |v: f32, label: i32| GrainBatch::<NdArray> {
            images: sample_images(v),
            targets: Tensor::from_ints([label], &inner_device),
            scales: Tensor::ones([1], &inner_device),
        };

        // Same four samples, once as size-1 batches and once as a size-3
        // batch plus a trailing size-1 batch. A per-sample average must not
        // care how the batches are cut.
        let singles = vec![
            single(0.0, 0),
            single(0.3, 1),
            single(0.6, 2),
            single(0.9, 3),
        ];
        let uneven = vec![
            GrainBatch::<NdArray> {
                images: Tensor::cat(
                    vec![sample_images(0.0), sample_images(0.3), sample_images(0.6)],
                    0,
                ),
                targets: Tensor::from_ints([0, 1, 2], &inner_device),
                scales: Tensor::ones([3], &inner_device),
            },
            single(0.9, 3),
        ];

        let loss_singles = trainer.evaluate(&singles).loss.unwrap();
        let loss_uneven = trainer.evaluate(&uneven).loss.unwrap();
        assert!(
            (loss_singles - loss_uneven).abs() < 1e-5,
            "{} vs {}",
            loss_singles,
            loss_uneven
        );
    }
}
