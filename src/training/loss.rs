//! Loss Functions
//!
//! Cross-entropy and a class-weighted focal loss for the imbalanced grain
//! dataset. The focal loss down-weights easy, high-confidence examples via a
//! `(1 - p_t)^gamma` factor and reweights classes by a table derived from
//! class frequencies, so the rare "Broken" class is not drowned out by
//! Barley.

use std::str::FromStr;

use burn::prelude::*;
use burn::tensor::activation::log_softmax;
use serde::{Deserialize, Serialize};

use crate::dataset::CLASS_FREQUENCIES;
use crate::utils::error::{GrainError, Result};

/// Loss function selector, parsed from its configured name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossFunction {
    /// Plain cross-entropy, mean over the batch
    CrossEntropy,
    /// Class-weighted focal loss
    Focal,
}

impl LossFunction {
    /// Name used in logs and run directories
    pub fn name(&self) -> &'static str {
        match self {
            LossFunction::CrossEntropy => "crossentropy",
            LossFunction::Focal => "focal",
        }
    }
}

impl FromStr for LossFunction {
    type Err = GrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "crossentropy" | "cross-entropy" | "ce" => Ok(LossFunction::CrossEntropy),
            "focal" => Ok(LossFunction::Focal),
            other => Err(GrainError::UnknownLossFunction(other.to_string())),
        }
    }
}

/// Per-class weight table for the focal loss
///
/// Externalized configuration: by default each weight is `1 - frequency` for
/// the observed grain class frequencies, so frequent classes contribute less
/// per sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassWeights(Vec<f32>);

impl ClassWeights {
    /// Build weights from class frequencies as `w_c = 1 - f_c`
    pub fn from_frequencies(frequencies: &[f32]) -> Self {
        Self(frequencies.iter().map(|f| 1.0 - f).collect())
    }

    /// Uniform weights (every class counts equally)
    pub fn uniform(num_classes: usize) -> Self {
        Self(vec![1.0; num_classes])
    }

    /// The default grain weight table
    pub fn grain_default() -> Self {
        Self::from_frequencies(&CLASS_FREQUENCIES)
    }

    /// Weight for one class
    pub fn get(&self, class_idx: usize) -> Option<f32> {
        self.0.get(class_idx).copied()
    }

    /// Number of classes covered
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Weight table as a tensor on the given device
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1> {
        Tensor::from_floats(TensorData::new(self.0.clone(), [self.0.len()]), device)
    }
}

/// Class-weighted focal loss
///
/// For each sample with true class `y`:
/// `loss = alpha[y] * (1 - p_y)^gamma * ce` where `ce = -log p_y`, averaged
/// over the batch. With `gamma = 0` this reduces to the alpha-weighted
/// cross-entropy.
#[derive(Debug, Clone)]
pub struct FocalLoss {
    /// Focusing parameter
    pub gamma: f64,
    /// Per-class weight table
    pub alpha: ClassWeights,
}

impl FocalLoss {
    /// Create a focal loss with the given gamma and weight table
    pub fn new(gamma: f64, alpha: ClassWeights) -> Self {
        Self { gamma, alpha }
    }

    /// Compute the scalar focal loss from raw logits and integer targets
    pub fn forward<B: Backend>(
        &self,
        logits: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        let device = logits.device();

        let ce = per_sample_cross_entropy(logits, targets.clone());

        // p_t = exp(-ce)
        let pt = ce.clone().neg().exp();

        let alpha = self
            .alpha
            .to_tensor::<B>(&device)
            .gather(0, targets);

        let focal_term = (pt.ones_like() - pt).powf_scalar(self.gamma as f32);

        (alpha * focal_term * ce).mean()
    }
}

/// Per-sample cross-entropy (no reduction) from raw logits
///
/// Computed as the negative log-softmax gathered at the target class, the
/// same formulation the framework's own loss uses.
pub fn per_sample_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    let [batch_size, _num_classes] = logits.dims();

    let log_probs = log_softmax(logits, 1);
    let gathered = log_probs.gather(1, targets.reshape([batch_size, 1]));

    gathered.squeeze::<1>(1).neg()
}

/// Mean cross-entropy over a batch
pub fn cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    per_sample_cross_entropy(logits, targets).mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn logits_and_targets(
        device: &<TestBackend as Backend>::Device,
    ) -> (Tensor<TestBackend, 2>, Tensor<TestBackend, 1, Int>) {
        // Three samples over five classes, mixed confidence.
        let logits = Tensor::from_floats(
            [
                [4.0, 0.0, 0.0, 0.0, 0.0],
                [0.0, 0.5, 1.5, 0.0, 0.0],
                [0.0, 0.0, 0.0, 2.0, 1.0],
            ],
            device,
        );
        let targets = Tensor::from_ints([0, 2, 3], device);
        (logits, targets)
    }

    #[test]
    fn test_loss_function_parsing() {
        assert_eq!(
            "crossentropy".parse::<LossFunction>().unwrap(),
            LossFunction::CrossEntropy
        );
        assert_eq!("focal".parse::<LossFunction>().unwrap(), LossFunction::Focal);
        assert_eq!("FOCAL".parse::<LossFunction>().unwrap(), LossFunction::Focal);

        let err = "hinge".parse::<LossFunction>().unwrap_err();
        assert!(matches!(err, GrainError::UnknownLossFunction(ref name) if name == "hinge"));
    }

    #[test]
    fn test_weights_from_frequencies() {
        let weights = ClassWeights::from_frequencies(&[0.455, 0.015, 0.227, 0.136, 0.166]);
        assert_eq!(weights.len(), 5);
        assert!((weights.get(0).unwrap() - 0.545).abs() < 1e-6);
        assert!((weights.get(1).unwrap() - 0.985).abs() < 1e-6);
        assert!((weights.get(4).unwrap() - 0.834).abs() < 1e-6);
    }

    #[test]
    fn test_grain_default_matches_frequency_table() {
        let weights = ClassWeights::grain_default();
        for (idx, freq) in CLASS_FREQUENCIES.iter().enumerate() {
            assert!((weights.get(idx).unwrap() - (1.0 - freq)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_cross_entropy_near_zero_for_confident_correct() {
        let device = Default::default();

        // Logit margin of 20 on the true class: p ~ 1, ce ~ 0.
        let logits = Tensor::<TestBackend, 2>::from_floats(
            [[20.0, 0.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 0.0, 20.0]],
            &device,
        );
        let targets = Tensor::<TestBackend, 1, Int>::from_ints([0, 4], &device);

        let loss: f32 = cross_entropy(logits, targets).into_scalar();
        assert!(loss.abs() < 1e-3, "loss = {}", loss);
    }

    #[test]
    fn test_focal_gamma_zero_is_weighted_cross_entropy() {
        let device = Default::default();
        let (logits, targets) = logits_and_targets(&device);

        let alpha = ClassWeights::grain_default();
        let focal = FocalLoss::new(0.0, alpha.clone());
        let focal_value: f32 = focal.forward(logits.clone(), targets.clone()).into_scalar();

        // Expected: mean(alpha[y] * ce) computed directly.
        let ce: Vec<f32> = per_sample_cross_entropy(logits, targets.clone())
            .into_data()
            .to_vec()
            .unwrap();
        let labels: Vec<i64> = targets.into_data().to_vec().unwrap();
        let expected: f32 = ce
            .iter()
            .zip(labels.iter())
            .map(|(c, &l)| alpha.get(l as usize).unwrap() * c)
            .sum::<f32>()
            / ce.len() as f32;

        assert!((focal_value - expected).abs() < 1e-5);
    }

    #[test]
    fn test_focal_downweights_easy_examples() {
        let device = Default::default();

        // One very confident correct prediction.
        let logits =
            Tensor::<TestBackend, 2>::from_floats([[8.0, 0.0, 0.0, 0.0, 0.0]], &device);
        let targets = Tensor::<TestBackend, 1, Int>::from_ints([0], &device);

        let uniform = ClassWeights::uniform(5);
        let plain: f32 = FocalLoss::new(0.0, uniform.clone())
            .forward(logits.clone(), targets.clone())
            .into_scalar();
        let focused: f32 = FocalLoss::new(2.0, uniform).forward(logits, targets).into_scalar();

        // (1 - p)^2 with p near 1 shrinks the loss by orders of magnitude.
        assert!(focused < plain * 0.01, "focused = {}, plain = {}", focused, plain);
    }

    #[test]
    fn test_focal_loss_is_finite_and_positive() {
        let device = Default::default();
        let (logits, targets) = logits_and_targets(&device);

        let loss: f32 = FocalLoss::new(2.0, ClassWeights::grain_default())
            .forward(logits, targets)
            .into_scalar();

        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }
}
