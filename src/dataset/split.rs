//! Train/Test Splitting
//!
//! Seeded, stratified splitting of the indexed dataset into the two sample
//! lists the trainer consumes. Stratification keeps per-class proportions
//! stable between the splits, which matters here because the grain classes
//! are heavily imbalanced.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::loader::GrainSample;

/// Configuration for the train/test split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of samples held out for the test set (0.0-1.0)
    pub test_fraction: f64,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Whether to stratify by class
    pub stratified: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            stratified: true,
        }
    }
}

/// Split samples into (train, test) lists
pub fn train_test_split(
    samples: &[GrainSample],
    config: &SplitConfig,
) -> (Vec<GrainSample>, Vec<GrainSample>) {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    if !config.stratified {
        let mut shuffled: Vec<GrainSample> = samples.to_vec();
        shuffled.shuffle(&mut rng);
        let test_len = (shuffled.len() as f64 * config.test_fraction).round() as usize;
        let train = shuffled.split_off(test_len);
        return (train, shuffled);
    }

    // Group by class, then split each class at the same fraction.
    let mut by_class: HashMap<usize, Vec<GrainSample>> = HashMap::new();
    for sample in samples {
        by_class.entry(sample.label).or_default().push(sample.clone());
    }

    let mut train = Vec::new();
    let mut test = Vec::new();

    let mut labels: Vec<usize> = by_class.keys().copied().collect();
    labels.sort_unstable();

    for label in labels {
        let mut class_samples = by_class.remove(&label).unwrap_or_default();
        class_samples.shuffle(&mut rng);

        let test_len = (class_samples.len() as f64 * config.test_fraction).round() as usize;
        let class_train = class_samples.split_off(test_len);

        debug!(
            "Class {}: {} train / {} test",
            label,
            class_train.len(),
            class_samples.len()
        );

        train.extend(class_train);
        test.extend(class_samples);
    }

    // Mix classes back together so batches aren't label-sorted.
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    (train, test)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn make_samples(counts: &[usize]) -> Vec<GrainSample> {
        let mut samples = Vec::new();
        for (label, &count) in counts.iter().enumerate() {
            for i in 0..count {
                samples.push(GrainSample {
                    path: PathBuf::from(format!("/data/{}/{}.png", label, i)),
                    label,
                    class_name: format!("class{}", label),
                    scale: 1.0,
                });
            }
        }
        samples
    }

    #[test]
    fn test_split_preserves_all_samples() {
        let samples = make_samples(&[50, 10, 30]);
        let (train, test) = train_test_split(&samples, &SplitConfig::default());
        assert_eq!(train.len() + test.len(), samples.len());
    }

    #[test]
    fn test_stratified_split_keeps_proportions() {
        let samples = make_samples(&[100, 20, 60]);
        let config = SplitConfig {
            test_fraction: 0.25,
            seed: 7,
            stratified: true,
        };
        let (_, test) = train_test_split(&samples, &config);

        let mut test_counts = [0usize; 3];
        for s in &test {
            test_counts[s.label] += 1;
        }
        assert_eq!(test_counts, [25, 5, 15]);
    }

    #[test]
    fn test_split_deterministic_per_seed() {
        let samples = make_samples(&[40, 40]);
        let config = SplitConfig::default();

        let (train_a, _) = train_test_split(&samples, &config);
        let (train_b, _) = train_test_split(&samples, &config);

        let paths_a: Vec<_> = train_a.iter().map(|s| s.path.clone()).collect();
        let paths_b: Vec<_> = train_b.iter().map(|s| s.path.clone()).collect();
        assert_eq!(paths_a, paths_b);
    }
}
