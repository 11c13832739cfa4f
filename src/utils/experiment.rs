//! Experiment Logging Module
//!
//! Records training runs to disk: one directory per run (named with a
//! timestamp and the run's key hyperparameters), holding per-epoch scalar
//! metrics as CSV and the final hyperparameter summary as JSON.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use tracing::info;

/// Scalar metrics recorded once per monitored epoch
#[derive(Debug, Clone, Serialize)]
pub struct EpochScalars {
    /// Epoch index (0-based)
    pub epoch: usize,
    /// Training accuracy over the epoch, in [0, 1]
    pub train_accuracy: f64,
    /// Test accuracy for the epoch, in [0, 1]; absent when evaluation is skipped
    pub test_accuracy: Option<f64>,
    /// Average training loss over the epoch
    pub train_loss: f64,
    /// Learning rate used for the epoch
    pub learning_rate: f64,
    /// Per-class test accuracies, indexed by class id; empty when evaluation is skipped
    pub class_accuracies: Vec<f64>,
}

/// File-based experiment tracker
///
/// Layout:
/// ```text
/// <logs_root>/<run name>/
/// ├── scalars.csv   one row per monitored epoch
/// └── hparams.json  written once when the run finishes
/// ```
#[derive(Debug)]
pub struct ExperimentLog {
    run_dir: PathBuf,
    scalars_path: PathBuf,
    header_written: bool,
}

impl ExperimentLog {
    /// Create the run directory under `logs_root` and open the log
    pub fn create<P: AsRef<Path>>(logs_root: P, run_name: &str) -> Result<Self> {
        let run_dir = logs_root.as_ref().join(run_name);
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("Failed to create log directory {:?}", run_dir))?;

        info!("Logging experiment to {:?}", run_dir);

        let scalars_path = run_dir.join("scalars.csv");
        Ok(Self {
            run_dir,
            scalars_path,
            header_written: false,
        })
    }

    /// Compose a run name from a timestamp and the run's hyperparameters
    pub fn run_name(model: &str, loss: &str, blocks: usize, features: usize, height: usize, width: usize) -> String {
        format!(
            "{} {} {} blocks={} features={} height={} width={}",
            Local::now().format("%Y%m%d_%H%M%S"),
            model,
            loss,
            blocks,
            features,
            height,
            width
        )
    }

    /// Append one epoch's scalars to `scalars.csv`
    pub fn log_epoch(&mut self, scalars: &EpochScalars, class_names: &[&str]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.scalars_path)
            .with_context(|| format!("Failed to open {:?}", self.scalars_path))?;

        if !self.header_written {
            let mut header = String::from("epoch,train_accuracy,test_accuracy,train_loss,learning_rate");
            for name in class_names {
                header.push_str(&format!(",acc_{}", name.to_lowercase()));
            }
            writeln!(file, "{}", header)?;
            self.header_written = true;
        }

        let test_acc = scalars
            .test_accuracy
            .map(|a| format!("{:.6}", a))
            .unwrap_or_default();
        let mut row = format!(
            "{},{:.6},{},{:.6},{:.8}",
            scalars.epoch, scalars.train_accuracy, test_acc, scalars.train_loss, scalars.learning_rate
        );
        for name_idx in 0..class_names.len() {
            match scalars.class_accuracies.get(name_idx) {
                Some(acc) => row.push_str(&format!(",{:.6}", acc)),
                None => row.push(','),
            }
        }
        writeln!(file, "{}", row)?;

        Ok(())
    }

    /// Write the final hyperparameter summary to `hparams.json`
    pub fn log_hparams<T: Serialize>(&self, hparams: &T) -> Result<()> {
        let path = self.run_dir.join("hparams.json");
        let json = serde_json::to_string_pretty(hparams)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;

        info!("Hyperparameters saved to {:?}", path);
        Ok(())
    }

    /// Directory this run logs into
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }
}
