//! Grain Classification CLI
//!
//! Entry point for training and evaluating the grain-type classifier with
//! the Burn framework.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use grainclass::backend::{backend_name, TrainingBackend};
use grainclass::dataset::NUM_CLASSES;
use grainclass::model::config::{LrScheduleKind, ModelConfig, ModelKind, TrainingConfig};
use grainclass::training::{run_training, ClassWeights, RunPaths, TrainingMode};
use grainclass::utils::logging::{init_logging, LogConfig};

/// Grain Type Classification
///
/// Trains a convolutional classifier over five grain types (Barley, Broken,
/// Oat, Rye, Wheat) using the Burn framework.
#[derive(Parser, Debug)]
#[command(name = "grainclass")]
#[command(version)]
#[command(about = "Grain type classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the classifier
    Train {
        /// Path to the dataset directory (one subdirectory per class)
        #[arg(short, long, default_value = "data/grains")]
        data_dir: String,

        /// Number of training epochs
        #[arg(short, long, default_value = "30")]
        epochs: usize,

        /// Batch size for training
        #[arg(short, long, default_value = "128")]
        batch_size: usize,

        /// Initial learning rate
        #[arg(short, long, default_value = "0.1")]
        learning_rate: f64,

        /// Learning rate schedule (constant, step, exponential, cosine)
        #[arg(long, default_value = "step")]
        lr_schedule: String,

        /// Loss function (crossentropy or focal)
        #[arg(long, default_value = "crossentropy")]
        loss: String,

        /// Focusing parameter for the focal loss
        #[arg(long, default_value = "2.0")]
        gamma: f64,

        /// Use uniform class weights instead of the frequency-derived table
        #[arg(long, default_value = "false")]
        uniform_weights: bool,

        /// Model variant (convnet or convnet-scale)
        #[arg(short, long, default_value = "convnet")]
        model: String,

        /// Base number of convolutional filters
        #[arg(long, default_value = "16")]
        features: usize,

        /// Number of convolutional blocks
        #[arg(long, default_value = "3")]
        blocks: usize,

        /// Input image height
        #[arg(long, default_value = "256")]
        height: usize,

        /// Input image width
        #[arg(long, default_value = "128")]
        width: usize,

        /// Dropout rate for the classifier head
        #[arg(long, default_value = "0.5")]
        droprate: f64,

        /// Fraction of samples held out for the test set
        #[arg(long, default_value = "0.2")]
        test_fraction: f64,

        /// Augmentation intensity; 0.0 disables augmentation
        #[arg(long, default_value = "0.0")]
        augment_intensity: f32,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Final run: train on the configured epochs without per-epoch evaluation
        #[arg(long = "final", default_value = "false")]
        final_run: bool,

        /// Directory experiment runs are logged under
        #[arg(long, default_value = "logs")]
        log_dir: String,

        /// Output directory for model checkpoints
        #[arg(short, long, default_value = "output/checkpoints")]
        output_dir: String,
    },

    /// Evaluate a trained checkpoint on the held-out test split
    Evaluate {
        /// Path to the dataset directory
        #[arg(short, long, default_value = "data/grains")]
        data_dir: String,

        /// Path to the checkpoint (without the recorder extension)
        #[arg(short, long)]
        checkpoint: String,

        /// Model variant the checkpoint was trained with
        #[arg(short, long, default_value = "convnet")]
        model: String,

        /// Base number of convolutional filters
        #[arg(long, default_value = "16")]
        features: usize,

        /// Number of convolutional blocks
        #[arg(long, default_value = "3")]
        blocks: usize,

        /// Input image height
        #[arg(long, default_value = "256")]
        height: usize,

        /// Input image width
        #[arg(long, default_value = "128")]
        width: usize,

        /// Batch size for evaluation
        #[arg(short, long, default_value = "128")]
        batch_size: usize,

        /// Fraction of samples held out for the test set
        #[arg(long, default_value = "0.2")]
        test_fraction: f64,

        /// Random seed; must match the training run for the same split
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Show dataset statistics
    Stats {
        /// Path to the dataset directory
        #[arg(short, long, default_value = "data/grains")]
        data_dir: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    print_banner();

    match cli.command {
        Commands::Train {
            data_dir,
            epochs,
            batch_size,
            learning_rate,
            lr_schedule,
            loss,
            gamma,
            uniform_weights,
            model,
            features,
            blocks,
            height,
            width,
            droprate,
            test_fraction,
            augment_intensity,
            seed,
            final_run,
            log_dir,
            output_dir,
        } => {
            let kind: ModelKind = model.parse()?;
            let lr_schedule: LrScheduleKind = lr_schedule.parse()?;

            let model_config = ModelConfig {
                kind,
                num_classes: NUM_CLASSES,
                height,
                width,
                n_features: features,
                num_blocks: blocks,
                droprate,
                in_channels: 3,
            };

            let training = TrainingConfig {
                epochs,
                batch_size,
                learning_rate,
                lr_schedule,
                loss_function: loss,
                gamma,
                weighted: !uniform_weights,
                test_fraction,
                seed,
                augment_intensity,
                ..Default::default()
            };

            let class_weights = if training.weighted {
                ClassWeights::grain_default()
            } else {
                ClassWeights::uniform(NUM_CLASSES)
            };

            let mode = TrainingMode::from_final_flag(final_run);
            let paths = RunPaths {
                data_dir: PathBuf::from(data_dir),
                log_dir: PathBuf::from(log_dir),
                checkpoint_dir: PathBuf::from(output_dir),
            };

            println!("{}", "Training Configuration:".cyan().bold());
            println!("  Model:    {} ({} blocks, {} features)", kind.name(), blocks, features);
            println!("  Input:    {}x{}", height, width);
            println!("  Loss:     {} (gamma = {})", training.loss_function, gamma);
            println!("  Epochs:   {} (batch size {})", epochs, batch_size);
            println!("  Mode:     {:?}", mode);
            println!("  Backend:  {}", backend_name());
            println!();

            let device = grainclass::backend::default_device();
            let report = run_training::<TrainingBackend>(
                &model_config,
                &training,
                mode,
                class_weights,
                &paths,
                device,
            )?;

            println!();
            println!("{}", "Training complete!".green().bold());
            if let Some(ref metrics) = report.final_metrics {
                println!("  Final test accuracy: {:.2}%", metrics.accuracy * 100.0);
            }
            println!("  Checkpoint: {:?}", report.checkpoint_path);
            println!("  Run logs:   {:?}", report.run_dir);
        }

        Commands::Evaluate {
            data_dir,
            checkpoint,
            model,
            features,
            blocks,
            height,
            width,
            batch_size,
            test_fraction,
            seed,
        } => {
            cmd_evaluate(
                &data_dir,
                &checkpoint,
                &model,
                features,
                blocks,
                height,
                width,
                batch_size,
                test_fraction,
                seed,
            )?;
        }

        Commands::Stats { data_dir } => {
            cmd_stats(&data_dir)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ----------------------------------------------
   Grain Type Classification
   Barley / Broken / Oat / Rye / Wheat
 ----------------------------------------------
"#
        .green()
    );
}

#[allow(clippy::too_many_arguments)]
fn cmd_evaluate(
    data_dir: &str,
    checkpoint: &str,
    model: &str,
    features: usize,
    blocks: usize,
    height: usize,
    width: usize,
    batch_size: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<()> {
    use grainclass::dataset::{
        batch_range, train_test_split, GrainBatcher, GrainBurnDataset, GrainDataset, Preprocess,
        SplitConfig,
    };
    use grainclass::model::GrainClassifier;
    use grainclass::training::{ClassWeights, LossFunction, Trainer};

    info!("Evaluating checkpoint {}", checkpoint);

    let kind: ModelKind = model.parse()?;
    let model_config = ModelConfig {
        kind,
        num_classes: NUM_CLASSES,
        height,
        width,
        n_features: features,
        num_blocks: blocks,
        ..Default::default()
    };
    model_config.validate()?;

    let mut dataset = GrainDataset::new(data_dir)?;
    dataset.shuffle(seed);
    let (_, test_samples) = train_test_split(
        &dataset.samples,
        &SplitConfig {
            test_fraction,
            seed,
            stratified: true,
        },
    );
    info!("Evaluating on {} held-out samples", test_samples.len());

    let preprocess = Preprocess {
        height,
        width,
        augmenter: None,
    };
    let test_dataset = GrainBurnDataset::new(test_samples, preprocess, seed);

    let device = grainclass::backend::default_device();
    let model_instance = GrainClassifier::<TrainingBackend>::new(&model_config, &device);
    let mut trainer = Trainer::new(
        model_instance,
        TrainingConfig {
            batch_size,
            ..Default::default()
        },
        LossFunction::CrossEntropy,
        ClassWeights::grain_default(),
        device.clone(),
    );
    trainer.load_checkpoint(Path::new(checkpoint))?;

    let batcher = GrainBatcher::with_image_size(device, height, width);
    let test_len = burn::data::dataset::Dataset::len(&test_dataset);
    let indices: Vec<usize> = (0..test_len).collect();
    let batches: Vec<_> = indices
        .chunks(batch_size)
        .filter_map(|chunk| batch_range(&test_dataset, &batcher, chunk))
        .collect();

    let class_names: Vec<&str> = dataset.classes.iter().map(|s| s.as_str()).collect();
    let metrics = trainer.evaluate(&batches).with_class_names(&class_names);

    println!("{}", "Evaluation Results:".cyan().bold());
    println!("  Accuracy: {:.2}%", metrics.accuracy * 100.0);
    if let Some(loss) = metrics.loss {
        println!("  Loss:     {:.4}", loss);
    }
    println!();
    println!("{}", "Per-class accuracy:".cyan().bold());
    for class in &metrics.per_class {
        let name = class.class_name.as_deref().unwrap_or("?");
        println!(
            "  {:10} {:>4}/{:<4} ({:.2}%)",
            name,
            class.correct,
            class.total,
            class.accuracy() * 100.0
        );
    }
    println!();
    println!("{}", metrics.confusion_matrix.display(Some(&class_names)));

    Ok(())
}

fn cmd_stats(data_dir: &str) -> Result<()> {
    use grainclass::dataset::GrainDataset;

    if !Path::new(data_dir).exists() {
        println!(
            "{} Dataset directory not found: {}",
            "Error:".red(),
            data_dir
        );
        return Ok(());
    }

    let dataset = GrainDataset::new(data_dir)?;
    dataset.stats().print();

    println!();
    println!("{}", "Class frequencies:".cyan().bold());
    for (name, freq) in dataset
        .classes
        .iter()
        .zip(dataset.class_frequencies().iter())
    {
        println!("  {:10} {:.1}%", name, freq * 100.0);
    }

    Ok(())
}
