//! Burn Dataset Integration for the Grain Dataset
//!
//! Implements Burn's `Dataset` trait and a `Batcher` producing the
//! (images, labels, scales) batches the trainer consumes.

use std::path::Path;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::imageops::FilterType;
use image::ImageReader;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::augmentation::Augmenter;
use super::loader::GrainSample;
use super::{IMAGE_HEIGHT, IMAGE_WIDTH};

/// Image preprocessing settings applied when samples are loaded
#[derive(Debug, Clone)]
pub struct Preprocess {
    /// Target image height
    pub height: usize,
    /// Target image width
    pub width: usize,
    /// Augmentation, if enabled for this split
    pub augmenter: Option<Augmenter>,
}

impl Default for Preprocess {
    fn default() -> Self {
        Self {
            height: IMAGE_HEIGHT,
            width: IMAGE_WIDTH,
            augmenter: None,
        }
    }
}

/// A single grain sample ready for batching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GrainItem {
    /// Image data as flattened CHW float array [3 * H * W], values in [0, 1]
    pub image: Vec<f32>,
    /// Class label (0-4)
    pub label: usize,
    /// Scalar scale feature for this sample
    pub scale: f32,
    /// Image path (for debugging/logging)
    pub path: String,
}

impl GrainItem {
    /// Load and preprocess one sample
    pub fn from_sample(
        sample: &GrainSample,
        preprocess: &Preprocess,
        rng: &mut ChaCha8Rng,
    ) -> anyhow::Result<Self> {
        let img = ImageReader::open(&sample.path)?.decode()?;

        let img = match &preprocess.augmenter {
            Some(augmenter) => augmenter.apply(img, rng),
            None => img,
        };

        let img = img
            .resize_exact(
                preprocess.width as u32,
                preprocess.height as u32,
                FilterType::Triangle,
            )
            .to_rgb8();

        let (height, width) = (preprocess.height, preprocess.width);
        let mut image = vec![0.0f32; 3 * height * width];

        // Convert to CHW format and normalize to [0, 1]
        for y in 0..height {
            for x in 0..width {
                let pixel = img.get_pixel(x as u32, y as u32);
                image[y * width + x] = pixel[0] as f32 / 255.0;
                image[height * width + y * width + x] = pixel[1] as f32 / 255.0;
                image[2 * height * width + y * width + x] = pixel[2] as f32 / 255.0;
            }
        }

        Ok(Self {
            image,
            label: sample.label,
            scale: sample.scale,
            path: sample.path.to_string_lossy().to_string(),
        })
    }

    /// Create from pre-loaded image data
    pub fn from_data(image: Vec<f32>, label: usize, scale: f32, path: String) -> Self {
        Self {
            image,
            label,
            scale,
            path,
        }
    }
}

/// Grain dataset implementing Burn's `Dataset` trait
#[derive(Debug, Clone)]
pub struct GrainBurnDataset {
    /// Samples backing this dataset
    samples: Vec<GrainSample>,
    /// Preprocessing applied on load
    preprocess: Preprocess,
    /// Seed for augmentation randomness
    seed: u64,
    /// Cached items when pre-loaded into memory
    cached_items: Option<Vec<GrainItem>>,
}

impl GrainBurnDataset {
    /// Create a new lazily-loading dataset
    pub fn new(samples: Vec<GrainSample>, preprocess: Preprocess, seed: u64) -> Self {
        Self {
            samples,
            preprocess,
            seed,
            cached_items: None,
        }
    }

    /// Create a dataset with all images pre-loaded into memory
    pub fn new_cached(
        samples: Vec<GrainSample>,
        preprocess: Preprocess,
        seed: u64,
    ) -> anyhow::Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let cached_items: anyhow::Result<Vec<_>> = samples
            .iter()
            .map(|s| GrainItem::from_sample(s, &preprocess, &mut rng))
            .collect();

        Ok(Self {
            samples,
            preprocess,
            seed,
            cached_items: Some(cached_items?),
        })
    }

    /// Replace the augmentation seed
    ///
    /// Call between epochs so lazily loaded samples draw fresh augmentation
    /// instead of repeating the same flip and jitter every epoch. Cached
    /// datasets keep their pre-loaded items.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Number of classes present in the samples
    pub fn num_classes(&self) -> usize {
        self.samples
            .iter()
            .map(|s| s.label)
            .max()
            .map(|m| m + 1)
            .unwrap_or(0)
    }

    /// Samples per class, indexed by label
    pub fn class_distribution(&self) -> Vec<usize> {
        let num_classes = self.num_classes();
        let mut counts = vec![0usize; num_classes];
        for sample in &self.samples {
            counts[sample.label] += 1;
        }
        counts
    }
}

impl Dataset<GrainItem> for GrainBurnDataset {
    fn get(&self, index: usize) -> Option<GrainItem> {
        if index >= self.samples.len() {
            return None;
        }

        if let Some(ref cached) = self.cached_items {
            return cached.get(index).cloned();
        }

        // Per-index rng keeps lazy loading deterministic.
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(index as u64));
        GrainItem::from_sample(&self.samples[index], &self.preprocess, &mut rng).ok()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of grain images for training or evaluation
#[derive(Clone, Debug)]
pub struct GrainBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
    /// Per-sample scale features with shape [batch_size]
    pub scales: Tensor<B, 1>,
}

/// Batcher turning `GrainItem`s into tensors on a device
#[derive(Clone, Debug)]
pub struct GrainBatcher<B: Backend> {
    device: B::Device,
    height: usize,
    width: usize,
}

impl<B: Backend> GrainBatcher<B> {
    /// Create a batcher for the given device with default image size
    pub fn new(device: B::Device) -> Self {
        Self {
            device,
            height: IMAGE_HEIGHT,
            width: IMAGE_WIDTH,
        }
    }

    /// Create a batcher with a custom image size
    pub fn with_image_size(device: B::Device, height: usize, width: usize) -> Self {
        Self {
            device,
            height,
            width,
        }
    }
}

impl<B: Backend> Batcher<GrainItem, GrainBatch<B>> for GrainBatcher<B> {
    fn batch(&self, items: Vec<GrainItem>) -> GrainBatch<B> {
        let batch_size = items.len();
        let channels = 3;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, channels, self.height, self.width]),
            &self.device,
        );

        // Center to zero mean, unit-ish variance: (x - 0.5) / 0.5
        let mean = Tensor::<B, 4>::from_floats(
            TensorData::new(vec![0.5f32, 0.5, 0.5], [1, 3, 1, 1]),
            &self.device,
        );
        let std = Tensor::<B, 4>::from_floats(
            TensorData::new(vec![0.5f32, 0.5, 0.5], [1, 3, 1, 1]),
            &self.device,
        );
        let images = (images - mean) / std;

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(targets_data, [batch_size]),
            &self.device,
        );

        let scales_data: Vec<f32> = items.iter().map(|item| item.scale).collect();
        let scales = Tensor::<B, 1>::from_floats(
            TensorData::new(scales_data, [batch_size]),
            &self.device,
        );

        GrainBatch {
            images,
            targets,
            scales,
        }
    }
}

/// Convenience: batch a slice of a dataset by index range
pub fn batch_range<B: Backend>(
    dataset: &GrainBurnDataset,
    batcher: &GrainBatcher<B>,
    indices: &[usize],
) -> Option<GrainBatch<B>> {
    let items: Vec<_> = indices.iter().filter_map(|&i| dataset.get(i)).collect();
    if items.is_empty() {
        None
    } else {
        Some(batcher.batch(items))
    }
}

/// Check that a path looks like an image file
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            ["jpg", "jpeg", "png", "bmp"].contains(&ext.as_str())
        })
        .unwrap_or(false)
}
