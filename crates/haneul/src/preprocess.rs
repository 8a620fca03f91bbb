//! # Image Preprocessing
//!
//! The inference transform: RGB, shorter-side resize to
//! ``round(resize_ratio * image_size)``, center crop to
//! ``image_size x image_size``, scale to ``[0, 1]``, and per-channel
//! normalization. The result is a ``[1, 3, image_size, image_size]`` tensor.
//!
//! Images more elongated than ``max_aspect_ratio`` are rejected before the
//! resize, which would otherwise allocate proportionally to the long side.

use crate::errors::{self, HaneulError};
use burn::config::Config;
use burn::prelude::{Backend, Tensor};
use burn::tensor::TensorData;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};

/// `ImageNet` channel means.
pub const IMAGENET_MEAN: [f64; 3] = [0.485, 0.456, 0.406];

/// `ImageNet` channel standard deviations.
pub const IMAGENET_STD: [f64; 3] = [0.229, 0.224, 0.225];

/// [`Preprocessor`] configuration.
#[derive(Config, Debug)]
pub struct PreprocessConfig {
    /// Output height and width.
    #[config(default = 224)]
    pub image_size: usize,

    /// Shorter-side resize target, relative to ``image_size``.
    #[config(default = 1.15)]
    pub resize_ratio: f64,

    /// Largest accepted long-side / short-side ratio.
    #[config(default = 10.0)]
    pub max_aspect_ratio: f64,

    /// Per-channel mean.
    #[config(default = "IMAGENET_MEAN")]
    pub mean: [f64; 3],

    /// Per-channel standard deviation.
    #[config(default = "IMAGENET_STD")]
    pub std: [f64; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PreprocessConfig {
    /// Build a [`Preprocessor`].
    ///
    /// # Errors
    ///
    /// [`HaneulError::Configuration`] for a zero size, a ratio below 1, or a
    /// non-positive standard deviation.
    pub fn init(&self) -> errors::Result<Preprocessor> {
        if self.image_size == 0 {
            return Err(HaneulError::Configuration(
                "image size must be positive".to_string(),
            ));
        }
        if self.resize_ratio.is_nan() || self.resize_ratio < 1.0 {
            return Err(HaneulError::Configuration(format!(
                "resize ratio must be at least 1, got {}",
                self.resize_ratio
            )));
        }
        if self.max_aspect_ratio.is_nan() || self.max_aspect_ratio < 1.0 {
            return Err(HaneulError::Configuration(format!(
                "max aspect ratio must be at least 1, got {}",
                self.max_aspect_ratio
            )));
        }
        if self.std.iter().any(|&s| s.is_nan() || s <= 0.0) {
            return Err(HaneulError::Configuration(format!(
                "normalization std must be positive, got {:?}",
                self.std
            )));
        }
        Ok(Preprocessor {
            config: self.clone(),
        })
    }
}

/// Decode encoded image bytes (JPEG, PNG, ...).
pub fn decode_image(bytes: &[u8]) -> errors::Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

/// Deterministic image to tensor transform.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// The active configuration.
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Output height and width.
    pub fn image_size(&self) -> usize {
        self.config.image_size
    }

    /// The shorter-side length after resizing.
    pub fn resize_size(&self) -> u32 {
        (self.config.resize_ratio * self.config.image_size as f64).round() as u32
    }

    /// Target dimensions for [`Self::resize`].
    ///
    /// The shorter side becomes [`Self::resize_size`]; the longer side is
    /// scaled proportionally and truncated.
    ///
    /// # Errors
    ///
    /// [`HaneulError::UnsupportedImage`] for empty images, or when the aspect
    /// ratio exceeds ``max_aspect_ratio``.
    pub fn resize_dimensions(
        &self,
        width: u32,
        height: u32,
    ) -> errors::Result<(u32, u32)> {
        let (short_in, long_in) = (width.min(height), width.max(height));
        if short_in == 0 {
            return Err(HaneulError::UnsupportedImage(format!(
                "empty image {width}x{height}"
            )));
        }
        let ratio = long_in as f64 / short_in as f64;
        if ratio > self.config.max_aspect_ratio {
            return Err(HaneulError::UnsupportedImage(format!(
                "aspect ratio {ratio:.1} of {width}x{height} exceeds {}",
                self.config.max_aspect_ratio
            )));
        }

        let short = self.resize_size();
        let long = (short as u64 * long_in as u64 / short_in as u64) as u32;
        Ok(if width <= height {
            (short, long)
        } else {
            (long, short)
        })
    }

    /// Resize to [`Self::resize_dimensions`].
    pub fn resize(
        &self,
        image: &RgbImage,
    ) -> errors::Result<RgbImage> {
        let (width, height) = image.dimensions();
        let (new_width, new_height) = self.resize_dimensions(width, height)?;
        Ok(imageops::resize(
            image,
            new_width,
            new_height,
            FilterType::Triangle,
        ))
    }

    /// Crop the centered ``image_size x image_size`` window.
    pub fn center_crop(
        &self,
        image: &RgbImage,
    ) -> RgbImage {
        let size = self.config.image_size as u32;
        let (width, height) = image.dimensions();
        let left = ((width.saturating_sub(size)) as f64 / 2.0).round() as u32;
        let top = ((height.saturating_sub(size)) as f64 / 2.0).round() as u32;
        imageops::crop_imm(image, left, top, size, size).to_image()
    }

    /// Channel-major normalized pixel values, ``[3 * size * size]``.
    pub fn normalize(
        &self,
        image: &RgbImage,
    ) -> Vec<f32> {
        let (width, height) = image.dimensions();
        let plane = (width * height) as usize;
        let mut data = vec![0.0f32; 3 * plane];
        for (idx, pixel) in image.pixels().enumerate() {
            for channel in 0..3 {
                let value = pixel.0[channel] as f64 / 255.0;
                data[channel * plane + idx] =
                    ((value - self.config.mean[channel]) / self.config.std[channel]) as f32;
            }
        }
        data
    }

    /// Transform a decoded image to a ``[1, 3, size, size]`` tensor.
    ///
    /// # Errors
    ///
    /// See [`Self::resize_dimensions`].
    pub fn apply<B: Backend>(
        &self,
        image: &DynamicImage,
        device: &B::Device,
    ) -> errors::Result<Tensor<B, 4>> {
        let size = self.config.image_size;
        let rgb = image.to_rgb8();
        let cropped = self.center_crop(&self.resize(&rgb)?);
        let data = TensorData::new(self.normalize(&cropped), [1, 3, size, size]);
        Ok(Tensor::from_data(data, device))
    }

    /// Decode and transform encoded image bytes.
    pub fn apply_bytes<B: Backend>(
        &self,
        bytes: &[u8],
        device: &B::Device,
    ) -> errors::Result<Tensor<B, 4>> {
        self.apply(&decode_image(bytes)?, device)
    }
}
