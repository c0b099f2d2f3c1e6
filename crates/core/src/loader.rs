// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// src/loader.rs
//
// Batching over a transformed dataset. Shuffle order and per-sample
// augmentation randomness derive from (seed, epoch, index) only, so a batch
// is identical whatever the worker count.
use anyhow::{Context, Result};
use ndarray::{stack, Array4, ArrayView3, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::{debug, info};

use crate::dataset::{Sample, TransformedDataset};
use crate::transforms::SampleRng;

const SHUFFLE_STREAM: u64 = 0;
const SAMPLE_STREAM: u64 = 1;

fn derive_seed(seed: u64, epoch: u64, index: u64, stream: u64) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    for (chunk, word) in bytes.chunks_exact_mut(8).zip([seed, epoch, index, stream]) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    bytes
}

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub batch_size: usize,
    pub shuffle: bool,
    pub drop_last: bool,
    /// Threads fetching samples of a batch (0 = calling thread).
    pub num_workers: usize,
    /// Drawn once at construction when absent.
    pub seed: Option<u64>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self { batch_size: 32, shuffle: false, drop_last: false, num_workers: 0, seed: None }
    }
}

/// One batch: images stacked NCHW, labels and dataset indices in batch order.
#[derive(Debug, Clone)]
pub struct Batch {
    pub images: Array4<f32>,
    pub labels: Vec<usize>,
    pub indices: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub struct DataLoader {
    dataset: TransformedDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: u64,
    pool: Option<Arc<ThreadPool>>,
}

impl DataLoader {
    pub fn new(dataset: TransformedDataset, options: LoaderOptions) -> Result<Self> {
        if options.batch_size == 0 {
            anyhow::bail!("batch_size must be > 0");
        }
        let seed = options.seed.unwrap_or_else(rand::random);
        let pool = if options.num_workers > 0 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(options.num_workers)
                .thread_name(|i| format!("classload-worker-{}", i))
                .build()
                .context("Failed to build loader worker pool")?;
            Some(Arc::new(pool))
        } else {
            None
        };
        debug!(
            samples = dataset.len(),
            batch_size = options.batch_size,
            shuffle = options.shuffle,
            workers = options.num_workers,
            seed,
            "created data loader"
        );
        Ok(Self {
            dataset,
            batch_size: options.batch_size,
            shuffle: options.shuffle,
            drop_last: options.drop_last,
            seed,
            pool,
        })
    }

    /// Number of batches per epoch.
    pub fn len(&self) -> usize {
        if self.drop_last {
            self.dataset.len() / self.batch_size
        } else {
            self.dataset.len().div_ceil(self.batch_size)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_samples(&self) -> usize {
        self.dataset.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn dataset(&self) -> &TransformedDataset {
        &self.dataset
    }

    /// Visiting order of the dataset for `epoch`.
    pub fn order(&self, epoch: u64) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            let mut rng = ChaCha8Rng::from_seed(derive_seed(self.seed, epoch, 0, SHUFFLE_STREAM));
            order.shuffle(&mut rng);
        }
        order
    }

    fn fetch(&self, epoch: u64, index: usize) -> Result<Sample> {
        let mut rng = SampleRng::from_seed(derive_seed(self.seed, epoch, index as u64, SAMPLE_STREAM));
        self.dataset.get(index, &mut rng)
    }

    /// Fetch, augment and stack the samples at `indices`.
    pub fn load_batch(&self, epoch: u64, indices: &[usize]) -> Result<Batch> {
        let samples: Vec<Sample> = match &self.pool {
            Some(pool) => pool.install(|| {
                indices
                    .par_iter()
                    .map(|&i| self.fetch(epoch, i))
                    .collect::<Result<Vec<_>>>()
            })?,
            None => indices.iter().map(|&i| self.fetch(epoch, i)).collect::<Result<Vec<_>>>()?,
        };

        if let Some(first) = samples.first() {
            if let Some((pos, odd)) = samples.iter().enumerate().find(|(_, s)| s.image.shape() != first.image.shape()) {
                anyhow::bail!(
                    "sample {} has shape {:?} but sample {} has {:?}; batches need a uniform shape",
                    indices[pos],
                    odd.image.shape(),
                    indices[0],
                    first.image.shape()
                );
            }
        }

        let views: Vec<ArrayView3<f32>> = samples.iter().map(|s| s.image.view()).collect();
        let images = stack(Axis(0), &views).context("Failed to stack batch")?;
        Ok(Batch { images, labels: samples.iter().map(|s| s.label).collect(), indices: indices.to_vec() })
    }

    pub fn iter(&self, epoch: u64) -> BatchIter<'_> {
        info!(epoch, batches = self.len(), "starting epoch");
        BatchIter { loader: self, epoch, order: self.order(epoch), batch: 0 }
    }
}

pub struct BatchIter<'a> {
    loader: &'a DataLoader,
    epoch: u64,
    order: Vec<usize>,
    batch: usize,
}

impl Iterator for BatchIter<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.batch >= self.loader.len() {
            return None;
        }
        let start = self.batch * self.loader.batch_size;
        let end = (start + self.loader.batch_size).min(self.order.len());
        self.batch += 1;
        Some(self.loader.load_batch(self.epoch, &self.order[start..end]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.loader.len() - self.batch;
        (left, Some(left))
    }
}

impl ExactSizeIterator for BatchIter<'_> {}
