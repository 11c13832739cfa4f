//! Metrics Module for Model Evaluation
//!
//! Accuracy-centric metrics for grain classification:
//! - Overall accuracy
//! - Per-class accuracy (correct / total per class)
//! - Confusion matrix

use serde::{Deserialize, Serialize};

/// Evaluation metrics for one pass over a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    /// Total number of samples evaluated
    pub total_samples: usize,

    /// Number of correct predictions
    pub correct_predictions: usize,

    /// Overall accuracy (correct / total), in [0, 1]
    pub accuracy: f64,

    /// Average loss over the evaluated batches (set by the trainer)
    pub loss: Option<f64>,

    /// Per-class accuracy, indexed by class id
    pub per_class: Vec<ClassAccuracy>,

    /// Confusion matrix (rows = actual, columns = predicted)
    pub confusion_matrix: ConfusionMatrix,
}

impl Metrics {
    /// Build metrics from parallel prediction / ground-truth slices
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        assert_eq!(
            predictions.len(),
            ground_truth.len(),
            "Predictions and ground truth must have same length"
        );

        let confusion_matrix =
            ConfusionMatrix::from_predictions(predictions, ground_truth, num_classes);

        let total_samples = predictions.len();
        let correct_predictions = confusion_matrix.correct();
        let accuracy = confusion_matrix.accuracy();

        let per_class = (0..num_classes)
            .map(|class_idx| ClassAccuracy {
                class_idx,
                class_name: None,
                correct: confusion_matrix.get(class_idx, class_idx),
                total: confusion_matrix.row_sum(class_idx),
            })
            .collect();

        Self {
            total_samples,
            correct_predictions,
            accuracy,
            loss: None,
            per_class,
            confusion_matrix,
        }
    }

    /// Attach class names to the per-class entries
    pub fn with_class_names(mut self, names: &[&str]) -> Self {
        for entry in &mut self.per_class {
            if let Some(name) = names.get(entry.class_idx) {
                entry.class_name = Some((*name).to_string());
            }
        }
        self
    }

    /// Per-class accuracies as a plain vector, indexed by class id
    pub fn class_accuracies(&self) -> Vec<f64> {
        self.per_class.iter().map(|c| c.accuracy()).collect()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            total_samples: 0,
            correct_predictions: 0,
            accuracy: 0.0,
            loss: None,
            per_class: Vec::new(),
            confusion_matrix: ConfusionMatrix::default(),
        }
    }
}

/// Accuracy counters for a single class
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassAccuracy {
    /// Class index
    pub class_idx: usize,

    /// Class name (if available)
    pub class_name: Option<String>,

    /// Correct predictions for this class
    pub correct: usize,

    /// Total samples of this class seen
    pub total: usize,
}

impl ClassAccuracy {
    /// Accuracy for this class; 0.0 when the class has no samples
    pub fn accuracy(&self) -> f64 {
        if self.total > 0 {
            self.correct as f64 / self.total as f64
        } else {
            0.0
        }
    }
}

/// Confusion Matrix for multi-class classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Number of classes
    pub num_classes: usize,

    /// Matrix data (row = actual, column = predicted), row-major
    pub matrix: Vec<usize>,
}

impl Default for ConfusionMatrix {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ConfusionMatrix {
    /// Create a new empty confusion matrix
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    /// Create confusion matrix from predictions and ground truth
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let mut cm = Self::new(num_classes);
        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }
        cm
    }

    /// Add a single prediction to the matrix
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted] += 1;
        }
    }

    /// Get the count at (actual, predicted)
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    /// Total number of samples recorded
    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Number of correct predictions (diagonal sum)
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    /// Overall accuracy
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total > 0 {
            self.correct() as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Number of samples whose actual class is `class_idx`
    pub fn row_sum(&self, class_idx: usize) -> usize {
        (0..self.num_classes)
            .map(|col| self.get(class_idx, col))
            .sum()
    }

    /// Pretty print the matrix with optional class names
    pub fn display(&self, class_names: Option<&[&str]>) -> String {
        let mut output = String::new();
        output.push_str("\nConfusion Matrix (rows=actual, cols=predicted):\n\n");

        output.push_str("          ");
        for col in 0..self.num_classes {
            match class_names.and_then(|n| n.get(col)) {
                Some(name) => output.push_str(&format!("{:>8}", truncate_label(name))),
                None => output.push_str(&format!("{:>8}", col)),
            }
        }
        output.push('\n');

        for row in 0..self.num_classes {
            match class_names.and_then(|n| n.get(row)) {
                Some(name) => output.push_str(&format!("{:>8} ", truncate_label(name))),
                None => output.push_str(&format!("{:>8} ", row)),
            }
            for col in 0..self.num_classes {
                let count = self.get(row, col);
                if row == col {
                    output.push_str(&format!(" [{:>4}] ", count));
                } else if count > 0 {
                    output.push_str(&format!("  {:>4}  ", count));
                } else {
                    output.push_str("     .  ");
                }
            }
            output.push('\n');
        }

        output.push_str(&format!("\nAccuracy: {:.2}%\n", self.accuracy() * 100.0));
        output
    }

    /// Save the matrix to CSV
    pub fn save_csv(&self, path: &std::path::Path) -> std::io::Result<()> {
        let mut content = String::new();

        content.push_str("actual\\predicted");
        for col in 0..self.num_classes {
            content.push_str(&format!(",{}", col));
        }
        content.push('\n');

        for row in 0..self.num_classes {
            content.push_str(&format!("{}", row));
            for col in 0..self.num_classes {
                content.push_str(&format!(",{}", self.get(row, col)));
            }
            content.push('\n');
        }

        std::fs::write(path, content)
    }
}

/// First eight characters of a class name, never splitting inside a
/// multi-byte character
fn truncate_label(name: &str) -> String {
    name.chars().take(8).collect()
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display(None))
    }
}

/// Running correct/total tracker for training-time accuracy
#[derive(Debug, Clone, Default)]
pub struct AccuracyTracker {
    correct: usize,
    total: usize,
}

impl AccuracyTracker {
    /// Create a new accuracy tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a batch of predictions
    pub fn add_batch(&mut self, predictions: &[usize], ground_truth: &[usize]) {
        for (pred, gt) in predictions.iter().zip(ground_truth.iter()) {
            self.total += 1;
            if pred == gt {
                self.correct += 1;
            }
        }
    }

    /// Add an already-counted batch result
    pub fn add_counts(&mut self, correct: usize, total: usize) {
        debug_assert!(correct <= total);
        self.correct += correct;
        self.total += total;
    }

    /// Current accuracy in [0, 1]
    pub fn accuracy(&self) -> f64 {
        if self.total > 0 {
            self.correct as f64 / self.total as f64
        } else {
            0.0
        }
    }

    /// Number of samples seen
    pub fn count(&self) -> usize {
        self.total
    }

    /// Reset the tracker
    pub fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix() {
        let predictions = vec![0, 1, 2, 0, 1, 2, 0, 0, 2, 2];
        let ground_truth = vec![0, 1, 2, 0, 2, 2, 1, 0, 1, 2];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 3);

        assert_eq!(cm.get(0, 0), 3);
        assert_eq!(cm.get(1, 1), 1);
        assert_eq!(cm.get(2, 2), 3);

        assert_eq!(cm.total(), 10);
        assert_eq!(cm.correct(), 7);
        assert!((cm.accuracy() - 0.7).abs() < 0.001);
    }

    #[test]
    fn test_display_truncates_multibyte_class_names() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1], &[0, 1], 2);

        // A multi-byte character sitting across the 8-byte mark must not
        // split the name mid-character.
        let rendered = cm.display(Some(&["Sommergüter", "Früchte"]));
        assert!(rendered.contains("Sommergü"));
        assert!(rendered.contains("Früchte"));
    }

    #[test]
    fn test_per_class_never_exceeds_total() {
        let predictions = vec![0, 0, 0, 1, 1, 4, 3, 2];
        let ground_truth = vec![0, 0, 1, 1, 0, 4, 3, 3];

        let metrics = Metrics::from_predictions(&predictions, &ground_truth, 5);

        for class in &metrics.per_class {
            assert!(class.correct <= class.total);
            let acc = class.accuracy();
            assert!((0.0..=1.0).contains(&acc));
        }
        assert!((0.0..=1.0).contains(&metrics.accuracy));
    }

    #[test]
    fn test_empty_class_accuracy_is_zero() {
        // Class 2 never appears in the ground truth.
        let predictions = vec![0, 1, 0, 1];
        let ground_truth = vec![0, 1, 1, 1];

        let metrics = Metrics::from_predictions(&predictions, &ground_truth, 3);
        assert_eq!(metrics.per_class[2].total, 0);
        assert_eq!(metrics.per_class[2].accuracy(), 0.0);
    }

    #[test]
    fn test_metrics_from_predictions() {
        let predictions = vec![0, 1, 2, 0, 1, 2, 0, 0, 2, 2];
        let ground_truth = vec![0, 1, 2, 0, 2, 2, 1, 0, 1, 2];

        let metrics = Metrics::from_predictions(&predictions, &ground_truth, 3);

        assert_eq!(metrics.total_samples, 10);
        assert_eq!(metrics.correct_predictions, 7);
        assert!((metrics.accuracy - 0.7).abs() < 0.001);

        // Class 0: all 3 actual samples predicted correctly
        assert_eq!(metrics.per_class[0].correct, 3);
        assert_eq!(metrics.per_class[0].total, 3);
        assert!((metrics.per_class[0].accuracy() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_class_names_attached() {
        let metrics = Metrics::from_predictions(&[0, 1], &[0, 1], 2)
            .with_class_names(&["Barley", "Broken"]);
        assert_eq!(metrics.per_class[0].class_name.as_deref(), Some("Barley"));
        assert_eq!(metrics.per_class[1].class_name.as_deref(), Some("Broken"));
    }

    #[test]
    fn test_accuracy_tracker() {
        let mut tracker = AccuracyTracker::new();

        tracker.add_batch(&[0, 1, 2], &[0, 1, 0]); // 2 correct out of 3
        assert_eq!(tracker.count(), 3);
        assert!((tracker.accuracy() - 2.0 / 3.0).abs() < 0.001);

        tracker.add_counts(5, 5);
        assert_eq!(tracker.count(), 8);

        tracker.reset();
        assert_eq!(tracker.count(), 0);
        assert_eq!(tracker.accuracy(), 0.0);
    }
}
