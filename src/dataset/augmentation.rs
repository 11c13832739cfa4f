//! Data Augmentation Module
//!
//! Training-time augmentation for grain kernel crops: random horizontal flip
//! and brightness jitter scaled by an intensity knob. Kernel crops have no
//! canonical left/right orientation, so flipping is always safe.

use image::DynamicImage;
use rand::Rng;

/// Randomized image augmenter
#[derive(Debug, Clone)]
pub struct Augmenter {
    /// Jitter strength; 1.0 gives brightness factors in [0.8, 1.2]
    intensity: f32,
}

impl Augmenter {
    pub fn new(intensity: f32) -> Self {
        Self {
            intensity: intensity.max(0.0),
        }
    }

    /// Apply random flip and brightness jitter
    pub fn apply<R: Rng>(&self, img: DynamicImage, rng: &mut R) -> DynamicImage {
        let img = if rng.gen_bool(0.5) { img.fliph() } else { img };
        self.jitter_brightness(img, rng)
    }

    fn jitter_brightness<R: Rng>(&self, img: DynamicImage, rng: &mut R) -> DynamicImage {
        if self.intensity == 0.0 {
            return img;
        }

        let range = 0.2 * self.intensity;
        let factor: f32 = rng.gen_range(1.0 - range..=1.0 + range);

        let mut rgb = img.to_rgb8();
        for pixel in rgb.pixels_mut() {
            for channel in pixel.0.iter_mut() {
                *channel = (*channel as f32 * factor).clamp(0.0, 255.0) as u8;
            }
        }
        DynamicImage::ImageRgb8(rgb)
    }
}
