// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// src/transforms/tensor.rs
use anyhow::Result;
use image::{ColorType, DynamicImage, GenericImageView};
use ndarray::{s, Array3, Axis};
use rand::Rng;

use super::{Pixels, SampleRng, Stage, Transform};

/// HWC 8-bit image → CHW `f32` tensor scaled to `[0, 1]`.
/// Gray images (with or without alpha) give one channel, everything else three.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToTensor;

pub fn image_to_tensor(img: &DynamicImage) -> Result<Array3<f32>> {
    let (w, h) = img.dimensions();
    let (w, h) = (w as usize, h as usize);
    match img.color() {
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => {
            let gray = img.to_luma8();
            let values = gray.into_raw().into_iter().map(|v| v as f32 / 255.0).collect();
            Ok(Array3::from_shape_vec((1, h, w), values)?)
        }
        _ => {
            let rgb = img.to_rgb8();
            let values = rgb.into_raw().into_iter().map(|v| v as f32 / 255.0).collect();
            let hwc = Array3::from_shape_vec((h, w, 3), values)?;
            Ok(hwc.permuted_axes([2, 0, 1]).as_standard_layout().to_owned())
        }
    }
}

impl Transform for ToTensor {
    fn name(&self) -> &'static str {
        "ToTensor"
    }

    fn input_stage(&self) -> Stage {
        Stage::Image
    }

    fn output_stage(&self) -> Stage {
        Stage::Tensor
    }

    fn apply(&self, input: Pixels, _rng: &mut SampleRng) -> Result<Pixels> {
        let img = input.into_image(self.name())?;
        Ok(Pixels::Tensor(image_to_tensor(&img)?))
    }
}

/// Per-channel `(x - mean) / std`. A single mean/std pair applies to every channel.
#[derive(Debug, Clone)]
pub struct Normalize {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Normalize {
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> Result<Self> {
        if mean.is_empty() || mean.len() != std.len() {
            anyhow::bail!("Normalize needs matching non-empty mean/std, got {} and {}", mean.len(), std.len());
        }
        if std.iter().any(|&s| s == 0.0) {
            anyhow::bail!("Normalize std must be non-zero: {:?}", std);
        }
        Ok(Self { mean, std })
    }
}

impl Transform for Normalize {
    fn name(&self) -> &'static str {
        "Normalize"
    }

    fn input_stage(&self) -> Stage {
        Stage::Tensor
    }

    fn apply(&self, input: Pixels, _rng: &mut SampleRng) -> Result<Pixels> {
        let mut tensor = input.into_tensor(self.name())?;
        let channels = tensor.shape()[0];
        if self.mean.len() != 1 && self.mean.len() != channels {
            anyhow::bail!(
                "Normalize configured for {} channels but the tensor has {}",
                self.mean.len(),
                channels
            );
        }
        for (c, mut plane) in tensor.axis_iter_mut(Axis(0)).enumerate() {
            let i = if self.mean.len() == 1 { 0 } else { c };
            let (mean, std) = (self.mean[i], self.std[i]);
            plane.mapv_inplace(|v| (v - mean) / std);
        }
        Ok(Pixels::Tensor(tensor))
    }
}

/// Zero out `n_holes` squares of side `length`, each centred on a uniformly
/// drawn pixel and clipped to the tensor borders.
/// <https://arxiv.org/abs/1708.04552>
#[derive(Debug, Clone)]
pub struct Cutout {
    pub n_holes: usize,
    pub length: usize,
}

impl Cutout {
    pub fn new(n_holes: usize, length: usize) -> Self {
        Self { n_holes, length }
    }
}

impl Transform for Cutout {
    fn name(&self) -> &'static str {
        "Cutout"
    }

    fn input_stage(&self) -> Stage {
        Stage::Tensor
    }

    fn apply(&self, input: Pixels, rng: &mut SampleRng) -> Result<Pixels> {
        let mut tensor = input.into_tensor(self.name())?;
        let (h, w) = (tensor.shape()[1], tensor.shape()[2]);
        if h == 0 || w == 0 {
            return Ok(Pixels::Tensor(tensor));
        }
        let half = self.length / 2;
        for _ in 0..self.n_holes {
            let y = rng.random_range(0..h);
            let x = rng.random_range(0..w);
            let (y1, y2) = (y.saturating_sub(half), (y + half).min(h));
            let (x1, x2) = (x.saturating_sub(half), (x + half).min(w));
            tensor.slice_mut(s![.., y1..y2, x1..x2]).fill(0.0);
        }
        Ok(Pixels::Tensor(tensor))
    }
}
