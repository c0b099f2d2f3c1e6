// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// src/transforms/mod.rs
//
// Augmentation steps and their composition. A sample starts as a decoded
// image, `ToTensor` turns it into a CHW float tensor, and the remaining
// steps work on that tensor.
use anyhow::Result;
use image::DynamicImage;
use ndarray::Array3;
use rand_chacha::ChaCha8Rng;
use std::fmt;

pub mod autoaugment;
pub mod geometry;
pub mod pipeline;
pub mod tensor;

pub use autoaugment::Cifar10Policy;
pub use geometry::{RandomAffine, RandomCrop, RandomHorizontalFlip, Resize};
pub use pipeline::{for_spec, NORMALIZE_CIFAR, NORMALIZE_MNIST};
pub use tensor::{Cutout, Normalize, ToTensor};

/// Random source handed to every step. One is derived per sample.
pub type SampleRng = ChaCha8Rng;

/// Representation a step consumes or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Image,
    Tensor,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Image => f.write_str("image"),
            Stage::Tensor => f.write_str("tensor"),
        }
    }
}

/// A sample in flight through a pipeline.
#[derive(Debug, Clone)]
pub enum Pixels {
    Image(DynamicImage),
    /// Channels × height × width.
    Tensor(Array3<f32>),
}

impl Pixels {
    pub fn stage(&self) -> Stage {
        match self {
            Pixels::Image(_) => Stage::Image,
            Pixels::Tensor(_) => Stage::Tensor,
        }
    }

    pub fn into_image(self, step: &str) -> Result<DynamicImage> {
        match self {
            Pixels::Image(img) => Ok(img),
            Pixels::Tensor(_) => anyhow::bail!("{} expects an image but received a tensor", step),
        }
    }

    pub fn into_tensor(self, step: &str) -> Result<Array3<f32>> {
        match self {
            Pixels::Tensor(t) => Ok(t),
            Pixels::Image(_) => anyhow::bail!("{} expects a tensor but received an image", step),
        }
    }
}

/// One augmentation step.
pub trait Transform: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Stage this step consumes.
    fn input_stage(&self) -> Stage;

    /// Stage this step produces; only `ToTensor` changes it.
    fn output_stage(&self) -> Stage {
        self.input_stage()
    }

    fn apply(&self, input: Pixels, rng: &mut SampleRng) -> Result<Pixels>;
}

/// Ordered list of steps applied one after another.
#[derive(Debug, Default)]
pub struct Compose {
    steps: Vec<Box<dyn Transform>>,
}

impl Compose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Transform + 'static>(&mut self, step: T) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn with<T: Transform + 'static>(mut self, step: T) -> Self {
        self.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Check that consecutive steps agree on the stage and that the
    /// pipeline turns an image into a tensor.
    pub fn check(&self) -> Result<()> {
        let mut stage = Stage::Image;
        for step in &self.steps {
            if step.input_stage() != stage {
                anyhow::bail!(
                    "{} expects {} input but the pipeline provides {} at that point",
                    step.name(),
                    step.input_stage(),
                    stage
                );
            }
            stage = step.output_stage();
        }
        if stage != Stage::Tensor {
            anyhow::bail!("pipeline [{}] never converts to a tensor", self.names().join(", "));
        }
        Ok(())
    }

    pub fn apply(&self, input: Pixels, rng: &mut SampleRng) -> Result<Pixels> {
        self.steps.iter().try_fold(input, |pixels, step| step.apply(pixels, rng))
    }

    /// Run an image through the pipeline and return the final tensor.
    pub fn apply_image(&self, image: DynamicImage, rng: &mut SampleRng) -> Result<Array3<f32>> {
        self.apply(Pixels::Image(image), rng)?.into_tensor("Compose")
    }
}

impl fmt::Display for Compose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names().join(" → "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn check_rejects_tensor_step_on_image() {
        let compose = Compose::new().with(Cutout::new(1, 4)).with(ToTensor);
        let err = compose.check().unwrap_err();
        assert!(err.to_string().contains("Cutout expects tensor input"));
    }

    #[test]
    fn check_requires_tensor_output() {
        let compose = Compose::new().with(RandomHorizontalFlip::new(0.5));
        assert!(compose.check().is_err());
        assert!(Compose::new().with(ToTensor).check().is_ok());
    }

    #[test]
    fn apply_runs_steps_in_order() {
        let compose = Compose::new()
            .with(Resize::new(4, 2))
            .with(ToTensor)
            .with(Normalize::new(vec![0.5], vec![0.5]).unwrap());
        compose.check().unwrap();

        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(8, 8, image::Luma([255])));
        let mut rng = SampleRng::seed_from_u64(0);
        let out = compose.apply_image(img, &mut rng).unwrap();

        assert_eq!(out.shape(), &[1, 2, 4]);
        assert!(out.iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert_eq!(compose.to_string(), "[Resize → ToTensor → Normalize]");
    }
}
