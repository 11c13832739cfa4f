//! Training Run Driver
//!
//! Wires the pieces together for a full run: dataset loading and splitting,
//! model construction, the epoch loop with optional per-epoch evaluation,
//! experiment logging, and a single checkpoint written when training ends.

use std::path::PathBuf;

use burn::tensor::backend::AutodiffBackend;
use chrono::Local;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::info;

use crate::dataset::{
    batch_range, train_test_split, Augmenter, GrainBatch, GrainBatcher, GrainBurnDataset,
    GrainDataset, Preprocess, SplitConfig,
};
use crate::model::config::{ModelConfig, TrainingConfig};
use crate::model::GrainClassifier;
use crate::training::loss::{ClassWeights, LossFunction};
use crate::training::trainer::Trainer;
use crate::utils::experiment::{EpochScalars, ExperimentLog};
use crate::utils::logging::TrainingLogger;
use crate::utils::metrics::Metrics;

/// How the run handles per-epoch evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrainingMode {
    /// Evaluate on the test split after every epoch
    Monitored,
    /// Skip evaluation entirely; train on the configured epochs and checkpoint
    Final,
}

impl TrainingMode {
    /// Mode for the given "final run" switch
    pub fn from_final_flag(is_final: bool) -> Self {
        if is_final {
            TrainingMode::Final
        } else {
            TrainingMode::Monitored
        }
    }
}

/// Filesystem locations for a run
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// Root directory of the image dataset (one subdirectory per class)
    pub data_dir: PathBuf,
    /// Directory experiment runs are logged under
    pub log_dir: PathBuf,
    /// Directory checkpoints are written into
    pub checkpoint_dir: PathBuf,
}

/// Summary of a finished run
#[derive(Debug)]
pub struct TrainingReport {
    /// Metrics from the last evaluation, absent for final-mode runs
    pub final_metrics: Option<Metrics>,
    /// Path the checkpoint was written to (without the recorder extension)
    pub checkpoint_path: PathBuf,
    /// Directory the experiment was logged into
    pub run_dir: PathBuf,
    /// Number of epochs trained
    pub epochs_run: usize,
}

/// Hyperparameter summary written at the end of a run
#[derive(Debug, Serialize)]
struct RunHparams<'a> {
    model: &'a ModelConfig,
    training: &'a TrainingConfig,
    mode: TrainingMode,
    final_test_accuracy: Option<f64>,
    final_class_accuracies: Vec<f64>,
}

/// Checkpoint file stem encoding the run timestamp (to the second) and
/// the architecture.
pub fn checkpoint_name(
    model: &str,
    features: usize,
    blocks: usize,
    height: usize,
    width: usize,
) -> String {
    format!(
        "{}_{}_Features={}_Blocks={}_Height={}_Width={}",
        Local::now().format("%Y-%m-%d_%H%M%S"),
        model,
        features,
        blocks,
        height,
        width
    )
}

/// Run a full training job
///
/// Loads and splits the dataset, trains for the configured number of epochs,
/// logs scalars per epoch, and writes exactly one checkpoint after the last
/// epoch. In [`TrainingMode::Final`] the test split is never evaluated.
pub fn run_training<B: AutodiffBackend>(
    model_config: &ModelConfig,
    training: &TrainingConfig,
    mode: TrainingMode,
    class_weights: ClassWeights,
    paths: &RunPaths,
    device: B::Device,
) -> anyhow::Result<TrainingReport> {
    // Fail on a bad loss name before any data is touched.
    let loss_function: LossFunction = training.loss_function.parse()?;

    model_config.validate()?;
    training.validate()?;

    let mut dataset = GrainDataset::new(&paths.data_dir)?;
    dataset.stats().print();
    dataset.shuffle(training.seed);

    let split_config = SplitConfig {
        test_fraction: training.test_fraction,
        seed: training.seed,
        stratified: true,
    };
    let (train_samples, test_samples) = train_test_split(&dataset.samples, &split_config);
    info!(
        "Split: {} train / {} test samples",
        train_samples.len(),
        test_samples.len()
    );

    let class_names: Vec<&str> = dataset.classes.iter().map(|s| s.as_str()).collect();

    let augmenter = if training.augment_intensity > 0.0 {
        Some(Augmenter::new(training.augment_intensity))
    } else {
        None
    };
    let train_preprocess = Preprocess {
        height: model_config.height,
        width: model_config.width,
        augmenter,
    };
    let test_preprocess = Preprocess {
        height: model_config.height,
        width: model_config.width,
        augmenter: None,
    };

    let mut train_dataset = GrainBurnDataset::new(train_samples, train_preprocess, training.seed);
    let test_dataset = GrainBurnDataset::new(test_samples, test_preprocess, training.seed);

    let train_batcher = GrainBatcher::<B>::with_image_size(
        device.clone(),
        model_config.height,
        model_config.width,
    );
    let test_batcher = GrainBatcher::<B::InnerBackend>::with_image_size(
        device.clone(),
        model_config.height,
        model_config.width,
    );

    // The test split does not change between epochs, batch it once.
    let test_batches: Vec<GrainBatch<B::InnerBackend>> = if mode == TrainingMode::Monitored {
        index_chunks(burn::data::dataset::Dataset::len(&test_dataset), training.batch_size)
            .iter()
            .filter_map(|chunk| batch_range(&test_dataset, &test_batcher, chunk))
            .collect()
    } else {
        Vec::new()
    };

    let model = GrainClassifier::<B>::new(model_config, &device);
    let mut trainer = Trainer::new(
        model,
        training.clone(),
        loss_function,
        class_weights,
        device,
    );

    let run_name = ExperimentLog::run_name(
        model_config.kind.name(),
        loss_function.name(),
        model_config.num_blocks,
        model_config.n_features,
        model_config.height,
        model_config.width,
    );
    let mut experiment = ExperimentLog::create(&paths.log_dir, &run_name)?;
    let mut logger = TrainingLogger::new(training.epochs);

    let train_len = burn::data::dataset::Dataset::len(&train_dataset);
    let mut last_metrics: Option<Metrics> = None;

    for epoch in 0..training.epochs {
        logger.start_epoch(epoch);

        // Fresh batch order and augmentation draws every epoch.
        let epoch_seed = training.seed.wrapping_add(epoch as u64);
        train_dataset.reseed(epoch_seed);

        let mut order: Vec<usize> = (0..train_len).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(epoch_seed);
        order.shuffle(&mut rng);

        let train_batches: Vec<GrainBatch<B>> = order
            .chunks(training.batch_size)
            .filter_map(|chunk| batch_range(&train_dataset, &train_batcher, chunk))
            .collect();

        let (train_loss, train_acc) = trainer.train_epoch(&train_batches);

        let scalars = match mode {
            TrainingMode::Monitored => {
                let metrics = trainer.evaluate(&test_batches);
                let class_accuracies = metrics.class_accuracies();

                trainer.state.record_test_accuracy(metrics.accuracy);
                logger.end_epoch(train_acc, metrics.accuracy, train_loss, trainer.current_lr());
                logger.log_class_accuracies(&class_names, &class_accuracies);

                let scalars = EpochScalars {
                    epoch,
                    train_accuracy: train_acc,
                    test_accuracy: Some(metrics.accuracy),
                    train_loss,
                    learning_rate: trainer.current_lr(),
                    class_accuracies,
                };
                last_metrics = Some(metrics);
                scalars
            }
            TrainingMode::Final => EpochScalars {
                epoch,
                train_accuracy: train_acc,
                test_accuracy: None,
                train_loss,
                learning_rate: trainer.current_lr(),
                class_accuracies: Vec::new(),
            },
        };
        experiment.log_epoch(&scalars, &class_names)?;

        if epoch + 1 < training.epochs {
            trainer.next_epoch();
        }
    }

    let hparams = RunHparams {
        model: model_config,
        training,
        mode,
        final_test_accuracy: last_metrics.as_ref().map(|m| m.accuracy),
        final_class_accuracies: last_metrics
            .as_ref()
            .map(|m| m.class_accuracies())
            .unwrap_or_default(),
    };
    experiment.log_hparams(&hparams)?;

    if let Some(ref metrics) = last_metrics {
        logger.log_complete(metrics.accuracy);
    } else {
        info!("Final-mode run complete after {} epochs", training.epochs);
    }

    let checkpoint_path = paths.checkpoint_dir.join(checkpoint_name(
        model_config.kind.name(),
        model_config.n_features,
        model_config.num_blocks,
        model_config.height,
        model_config.width,
    ));
    trainer.save_checkpoint(&checkpoint_path)?;

    Ok(TrainingReport {
        final_metrics: last_metrics,
        checkpoint_path,
        run_dir: experiment.run_dir().to_path_buf(),
        epochs_run: training.epochs,
    })
}

/// Split `0..len` into consecutive chunks of at most `batch_size`
fn index_chunks(len: usize, batch_size: usize) -> Vec<Vec<usize>> {
    let indices: Vec<usize> = (0..len).collect();
    indices
        .chunks(batch_size.max(1))
        .map(|c| c.to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use burn::backend::{Autodiff, NdArray};

    use crate::model::config::ModelKind;

    type TestBackend = Autodiff<NdArray>;

    /// Tiny class-per-directory image tree: 4 images for each grain class
    fn write_class_tree(data_dir: &Path) {
        for (label, class) in ["Barley", "Broken", "Oat", "Rye", "Wheat"]
            .iter()
            .enumerate()
        {
            let class_dir = data_dir.join(class);
            fs::create_dir_all(&class_dir).unwrap();
            for i in 0..4u8 {
                let mut img = image::RgbImage::new(8, 16);
                for pixel in img.pixels_mut() {
                    pixel.0 = [label as u8 * 40 + i * 5, 100, 50];
                }
                img.save(class_dir.join(format!("{}.png", i))).unwrap();
            }
        }
    }

    fn tiny_run(root: &Path, data_dir: &Path, mode: TrainingMode) -> TrainingReport {
        let model_config = ModelConfig {
            kind: ModelKind::ConvNet,
            height: 16,
            width: 8,
            n_features: 4,
            num_blocks: 2,
            ..Default::default()
        };
        let training = TrainingConfig {
            epochs: 2,
            batch_size: 4,
            learning_rate: 0.01,
            test_fraction: 0.25,
            seed: 7,
            ..Default::default()
        };
        let tag = match mode {
            TrainingMode::Monitored => "monitored",
            TrainingMode::Final => "final",
        };
        let paths = RunPaths {
            data_dir: data_dir.to_path_buf(),
            log_dir: root.join(format!("logs_{}", tag)),
            checkpoint_dir: root.join(format!("checkpoints_{}", tag)),
        };

        run_training::<TestBackend>(
            &model_config,
            &training,
            mode,
            ClassWeights::grain_default(),
            &paths,
            Default::default(),
        )
        .unwrap()
    }

    fn scalar_rows(run_dir: &Path) -> Vec<Vec<String>> {
        let content = fs::read_to_string(run_dir.join("scalars.csv")).unwrap();
        content
            .lines()
            .skip(1)
            .map(|line| line.split(',').map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_run_training_checkpoints_once_per_mode() {
        let root = std::env::temp_dir().join(format!(
            "grainclass_test_run_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        let data_dir = root.join("data");
        write_class_tree(&data_dir);

        let monitored = tiny_run(&root, &data_dir, TrainingMode::Monitored);
        let final_run = tiny_run(&root, &data_dir, TrainingMode::Final);

        // Exactly one checkpoint file per run, written after the last epoch.
        for (report, tag) in [(&monitored, "monitored"), (&final_run, "final")] {
            let files: Vec<_> = fs::read_dir(root.join(format!("checkpoints_{}", tag)))
                .unwrap()
                .filter_map(|e| e.ok())
                .collect();
            assert_eq!(files.len(), 1, "{} run wrote {} files", tag, files.len());
            assert_eq!(
                files[0].path().extension().unwrap().to_str(),
                Some("mpk")
            );
            assert_eq!(report.epochs_run, 2);
        }

        assert!(monitored.final_metrics.is_some());
        assert!(final_run.final_metrics.is_none());

        // Both modes log one scalar row per epoch; only the monitored run
        // fills the test-accuracy column, and the learning rate trajectory
        // is identical because it depends on the epoch alone.
        let monitored_rows = scalar_rows(&monitored.run_dir);
        let final_rows = scalar_rows(&final_run.run_dir);
        assert_eq!(monitored_rows.len(), 2);
        assert_eq!(final_rows.len(), 2);

        for (m_row, f_row) in monitored_rows.iter().zip(final_rows.iter()) {
            assert!(!m_row[2].is_empty());
            assert!(f_row[2].is_empty());
            assert_eq!(m_row[4], f_row[4]);
        }

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_mode_from_final_flag() {
        assert_eq!(TrainingMode::from_final_flag(false), TrainingMode::Monitored);
        assert_eq!(TrainingMode::from_final_flag(true), TrainingMode::Final);
    }

    #[test]
    fn test_checkpoint_name_encodes_architecture() {
        let name = checkpoint_name("convnet-scale", 16, 3, 256, 128);
        assert!(name.contains("convnet-scale"));
        assert!(name.contains("Features=16"));
        assert!(name.contains("Blocks=3"));
        assert!(name.contains("Height=256"));
        assert!(name.contains("Width=128"));

        let date = Local::now().format("%Y-%m-%d").to_string();
        assert!(name.starts_with(&date));

        // Time-of-day component so same-day runs get distinct names.
        let parts: Vec<&str> = name.split('_').collect();
        assert_eq!(parts[2], "convnet-scale");
        assert_eq!(parts[1].len(), 6);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_index_chunks_cover_all_indices() {
        let chunks = index_chunks(10, 4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 4);
        assert_eq!(chunks[2], vec![8, 9]);

        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_index_chunks_empty() {
        assert!(index_chunks(0, 4).is_empty());
    }
}
