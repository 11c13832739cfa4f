//! Grain Dataset Loader
//!
//! Loads the grain kernel dataset from disk. The on-disk layout is one
//! directory per class:
//!
//! ```text
//! root_dir/
//! ├── Barley/
//! │   ├── 0001.png
//! │   └── 0002.png
//! ├── Broken/
//! │   └── ...
//! ├── Oat/
//! ├── Rye/
//! └── Wheat/
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{IMAGE_HEIGHT, IMAGE_WIDTH};

/// A single image sample with its label and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrainSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index (0-4)
    pub label: usize,
    /// Class name (e.g., "Barley")
    pub class_name: String,
    /// Scalar scale feature: original pixel area relative to the target
    /// resolution, capturing the physical size lost by resizing
    pub scale: f32,
}

/// Grain dataset indexed from a class-per-directory tree
#[derive(Debug)]
pub struct GrainDataset {
    /// Root directory of the dataset
    pub root_dir: PathBuf,
    /// All samples in the dataset
    pub samples: Vec<GrainSample>,
    /// Mapping from class name to label index
    pub class_to_idx: HashMap<String, usize>,
    /// Class names ordered by label index
    pub classes: Vec<String>,
    /// Target image size (height, width)
    pub image_size: (usize, usize),
}

impl GrainDataset {
    /// Index a dataset from a directory tree
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading grain dataset from: {:?}", root_dir);

        if !root_dir.exists() {
            anyhow::bail!("Dataset directory does not exist: {:?}", root_dir);
        }

        let mut classes: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    classes.push(name.to_string());
                }
            }
        }
        classes.sort();

        info!("Found {} classes", classes.len());

        let class_to_idx: HashMap<String, usize> = classes
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();

        let target_area = (IMAGE_HEIGHT * IMAGE_WIDTH) as f32;
        let mut samples = Vec::new();

        for class_name in &classes {
            let class_dir = root_dir.join(class_name);
            let label = class_to_idx[class_name];
            let before = samples.len();

            for entry in WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path().to_path_buf();

                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy().to_lowercase();
                    if ["jpg", "jpeg", "png", "bmp"].contains(&ext.as_str()) {
                        let scale = image::image_dimensions(&path)
                            .map(|(w, h)| (w * h) as f32 / target_area)
                            .unwrap_or(1.0);

                        samples.push(GrainSample {
                            path,
                            label,
                            class_name: class_name.clone(),
                            scale,
                        });
                    }
                }
            }

            debug!(
                "Class '{}' (label {}): {} samples",
                class_name,
                label,
                samples.len() - before
            );
        }

        info!("Loaded {} total samples", samples.len());

        Ok(Self {
            root_dir,
            samples,
            class_to_idx,
            classes,
            image_size: (IMAGE_HEIGHT, IMAGE_WIDTH),
        })
    }

    /// Number of samples in the dataset
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of classes
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Class names ordered by label index
    pub fn image_classes(&self) -> &[String] {
        &self.classes
    }

    /// Shuffle the samples in place with a given seed
    pub fn shuffle(&mut self, seed: u64) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.samples.shuffle(&mut rng);
    }

    /// Per-class sample counts, indexed by label
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            counts[sample.label] += 1;
        }
        counts
    }

    /// Per-class frequencies (count / total), indexed by label
    pub fn class_frequencies(&self) -> Vec<f32> {
        let total = self.len().max(1) as f32;
        self.class_counts()
            .into_iter()
            .map(|c| c as f32 / total)
            .collect()
    }

    /// Statistics about the dataset
    pub fn stats(&self) -> DatasetStats {
        DatasetStats {
            total_samples: self.len(),
            num_classes: self.num_classes(),
            class_counts: self.class_counts(),
            class_names: self.classes.clone(),
        }
    }
}

/// Statistics about the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: Vec<String>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("\nDataset statistics:");
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.num_classes);
        println!("\n  Samples per class:");

        for (idx, name) in self.class_names.iter().enumerate() {
            let count = self.class_counts[idx];
            let bar_len = (count as f32 / self.total_samples.max(1) as f32 * 40.0) as usize;
            let bar: String = "█".repeat(bar_len);
            println!("    {:3}. {:10} {:5} {}", idx, name, count, bar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grain_sample_creation() {
        let sample = GrainSample {
            path: PathBuf::from("/data/grain/Rye/042.png"),
            label: 3,
            class_name: "Rye".to_string(),
            scale: 1.0,
        };

        assert_eq!(sample.label, 3);
        assert_eq!(sample.class_name, "Rye");
    }

    #[test]
    fn test_missing_dir_fails() {
        let result = GrainDataset::new("/nonexistent/grain/dataset");
        assert!(result.is_err());
    }
}
