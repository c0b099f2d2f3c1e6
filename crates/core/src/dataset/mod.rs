// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// src/dataset/mod.rs
//
// Indexable datasets yielding decoded images, plus the views and wrappers
// the splits are assembled from.
use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, RgbImage};
use ndarray::Array3;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::sync::Arc;

use crate::transforms::{Compose, SampleRng};

pub mod image_folder;
pub mod sources;

pub use image_folder::ImageFolder;
pub use sources::load_split;

/// Which half of a dataset to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    /// Validation or test, whichever the dataset ships.
    Eval,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => f.write_str("train"),
            Split::Eval => f.write_str("eval"),
        }
    }
}

/// A decoded, not yet augmented, sample.
#[derive(Debug, Clone)]
pub struct RawSample {
    pub image: DynamicImage,
    pub label: usize,
}

/// An augmented sample ready for batching.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Channels × height × width.
    pub image: Array3<f32>,
    pub label: usize,
}

/// Random-access dataset
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Result<RawSample>;

    /// Number of classes when the dataset itself knows it.
    fn num_classes(&self) -> Option<usize> {
        None
    }
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        anyhow::bail!("index {} out of range for dataset of {} samples", index, len);
    }
    Ok(())
}

/// 8-bit images held in memory as one contiguous HWC buffer.
pub struct InMemoryImages {
    width: u32,
    height: u32,
    channels: usize,
    pixels: Vec<u8>,
    labels: Vec<usize>,
}

impl InMemoryImages {
    pub fn new(width: u32, height: u32, channels: usize, pixels: Vec<u8>, labels: Vec<usize>) -> Result<Self> {
        if channels != 1 && channels != 3 {
            anyhow::bail!("in-memory images must have 1 or 3 channels, got {}", channels);
        }
        let expected = labels.len() * width as usize * height as usize * channels;
        if pixels.len() != expected {
            anyhow::bail!(
                "pixel buffer holds {} bytes, expected {} for {} images of {}x{}x{}",
                pixels.len(),
                expected,
                labels.len(),
                width,
                height,
                channels
            );
        }
        Ok(Self { width, height, channels, pixels, labels })
    }

    fn image_bytes(&self) -> usize {
        self.width as usize * self.height as usize * self.channels
    }
}

impl Dataset for InMemoryImages {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn get(&self, index: usize) -> Result<RawSample> {
        check_index(index, self.len())?;
        let size = self.image_bytes();
        let bytes = self.pixels[index * size..(index + 1) * size].to_vec();
        let image = match self.channels {
            1 => GrayImage::from_raw(self.width, self.height, bytes).map(DynamicImage::ImageLuma8),
            _ => RgbImage::from_raw(self.width, self.height, bytes).map(DynamicImage::ImageRgb8),
        }
        .ok_or_else(|| anyhow::anyhow!("image {} does not fit {}x{}", index, self.width, self.height))?;
        Ok(RawSample { image, label: self.labels[index] })
    }
}

/// Index view into another dataset.
pub struct Subset {
    inner: Arc<dyn Dataset>,
    indices: Vec<usize>,
}

impl Subset {
    pub fn new(inner: Arc<dyn Dataset>, indices: Vec<usize>) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= inner.len()) {
            anyhow::bail!("subset index {} out of range for dataset of {} samples", bad, inner.len());
        }
        Ok(Self { inner, indices })
    }

    /// `size` distinct indices drawn uniformly, reproducible from `seed`.
    pub fn random(inner: Arc<dyn Dataset>, size: usize, seed: u64) -> Result<Self> {
        if size > inner.len() {
            anyhow::bail!("cannot take {} samples from a split of {}", size, inner.len());
        }
        let mut indices: Vec<usize> = (0..inner.len()).collect();
        indices.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
        indices.truncate(size);
        Self::new(inner, indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl Dataset for Subset {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn get(&self, index: usize) -> Result<RawSample> {
        check_index(index, self.len())?;
        self.inner.get(self.indices[index])
    }

    fn num_classes(&self) -> Option<usize> {
        self.inner.num_classes()
    }
}

/// Datasets laid end to end.
pub struct Concat {
    parts: Vec<Arc<dyn Dataset>>,
    /// Exclusive end offset of every part.
    ends: Vec<usize>,
}

impl Concat {
    pub fn new(parts: Vec<Arc<dyn Dataset>>) -> Self {
        let ends = parts
            .iter()
            .scan(0, |total, part| {
                *total += part.len();
                Some(*total)
            })
            .collect();
        Self { parts, ends }
    }
}

impl Dataset for Concat {
    fn len(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    fn get(&self, index: usize) -> Result<RawSample> {
        check_index(index, self.len())?;
        let part = self.ends.partition_point(|&end| end <= index);
        let start = if part == 0 { 0 } else { self.ends[part - 1] };
        self.parts[part].get(index - start)
    }

    fn num_classes(&self) -> Option<usize> {
        self.parts.iter().filter_map(|p| p.num_classes()).max()
    }
}

/// A dataset paired with the pipeline that turns its images into tensors.
#[derive(Clone)]
pub struct TransformedDataset {
    inner: Arc<dyn Dataset>,
    pipeline: Arc<Compose>,
}

impl TransformedDataset {
    pub fn new(inner: Arc<dyn Dataset>, pipeline: Arc<Compose>) -> Result<Self> {
        pipeline.check()?;
        Ok(Self { inner, pipeline })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn pipeline(&self) -> &Compose {
        &self.pipeline
    }

    pub fn get(&self, index: usize, rng: &mut SampleRng) -> Result<Sample> {
        let raw = self.inner.get(index)?;
        let image = self
            .pipeline
            .apply_image(raw.image, rng)
            .with_context(|| format!("Failed to transform sample {}", index))?;
        Ok(Sample { image, label: raw.label })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transforms::{Normalize, ToTensor};

    /// `n` 2×2 gray images whose pixels all equal their index.
    pub(crate) fn counting(n: usize) -> Arc<dyn Dataset> {
        let pixels = (0..n).flat_map(|i| [i as u8; 4]).collect();
        let labels = (0..n).map(|i| i % 3).collect();
        Arc::new(InMemoryImages::new(2, 2, 1, pixels, labels).unwrap())
    }

    fn first_pixel(ds: &dyn Dataset, index: usize) -> u8 {
        ds.get(index).unwrap().image.to_luma8().get_pixel(0, 0)[0]
    }

    #[test]
    fn in_memory_rejects_bad_buffer() {
        assert!(InMemoryImages::new(2, 2, 1, vec![0; 7], vec![0, 1]).is_err());
        assert!(InMemoryImages::new(2, 2, 4, vec![0; 32], vec![0, 1]).is_err());
    }

    #[test]
    fn in_memory_get_and_bounds() {
        let ds = counting(5);
        assert_eq!(first_pixel(ds.as_ref(), 4), 4);
        assert_eq!(ds.get(4).unwrap().label, 1);
        assert!(ds.get(5).is_err());
    }

    #[test]
    fn subset_random_is_seeded_and_distinct() {
        let a = Subset::random(counting(50), 10, 9).unwrap();
        let b = Subset::random(counting(50), 10, 9).unwrap();
        assert_eq!(a.indices(), b.indices());

        let mut sorted = a.indices().to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 10);

        assert!(Subset::random(counting(5), 6, 0).is_err());
    }

    #[test]
    fn subset_maps_indices() {
        let subset = Subset::new(counting(5), vec![3, 1]).unwrap();
        assert_eq!(first_pixel(&subset, 0), 3);
        assert_eq!(first_pixel(&subset, 1), 1);
        assert!(Subset::new(counting(5), vec![5]).is_err());
    }

    #[test]
    fn concat_spans_parts() {
        let concat = Concat::new(vec![counting(3), counting(0), counting(2)]);
        assert_eq!(concat.len(), 5);
        assert_eq!(first_pixel(&concat, 2), 2);
        assert_eq!(first_pixel(&concat, 3), 0);
        assert_eq!(first_pixel(&concat, 4), 1);
        assert!(concat.get(5).is_err());
    }

    #[test]
    fn transformed_dataset_produces_tensors() {
        let pipeline = Compose::new().with(ToTensor).with(Normalize::new(vec![0.0], vec![1.0]).unwrap());
        let ds = TransformedDataset::new(counting(3), Arc::new(pipeline)).unwrap();
        let sample = ds.get(2, &mut SampleRng::seed_from_u64(0)).unwrap();
        assert_eq!(sample.image.shape(), &[1, 2, 2]);
        assert_eq!(sample.label, 2);
        assert!((sample.image[[0, 0, 0]] - 2.0 / 255.0).abs() < 1e-6);

        assert!(TransformedDataset::new(counting(1), Arc::new(Compose::new())).is_err());
    }
}
