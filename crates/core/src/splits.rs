// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// src/splits.rs
//
// The three loaders a training run consumes.
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::dataset::{load_split, Dataset, Split, Subset, TransformedDataset};
use crate::loader::{DataLoader, LoaderOptions};
use crate::registry::{DataSource, DatasetSpec};
use crate::transforms;

pub struct DatasetSplits {
    pub spec: DatasetSpec,
    /// Registry class count, replaced by the manifest's when it knows better.
    pub num_classes: usize,
    /// Training split, training pipeline, shuffled per config.
    pub train: DataLoader,
    /// Training split, evaluation pipeline, never shuffled.
    pub train_val: DataLoader,
    /// Evaluation split, evaluation pipeline, never shuffled.
    pub val: DataLoader,
    pub num_steps_per_epoch: usize,
}

impl DatasetSplits {
    pub fn build(config: &RunConfig) -> Result<Self> {
        config.validate()?;
        let spec = config.kind()?.spec();
        let (train_pipeline, eval_pipeline) = transforms::for_spec(&spec, &config.augmentation)?;
        let (train_pipeline, eval_pipeline) = (Arc::new(train_pipeline), Arc::new(eval_pipeline));

        let train_split = load_split(&spec, &config.dataset, Split::Train)
            .with_context(|| format!("Failed to open the {} training split", spec.kind))?;
        let eval_split = load_split(&spec, &config.dataset, Split::Eval)
            .with_context(|| format!("Failed to open the {} evaluation split", spec.kind))?;

        let mut num_classes = spec.num_classes;
        if spec.source == DataSource::INatManifest {
            if let Some(found) = train_split.num_classes() {
                if found != num_classes {
                    warn!(registry = num_classes, manifest = found, "using the manifest's class count");
                }
                num_classes = found;
            }
        }

        // shared by all three loaders
        let seed = config.reader.seed.unwrap_or_else(rand::random);

        let train_data: Arc<dyn Dataset> = match config.train_size() {
            Some(size) => {
                info!(size, of = train_split.len(), "sub-sampling the training split");
                Arc::new(Subset::random(train_split.clone(), size, seed)?)
            }
            None => train_split.clone(),
        };

        let eval_options = |shuffle_seed| LoaderOptions {
            batch_size: config.val_batch_size(),
            shuffle: false,
            drop_last: false,
            num_workers: config.reader.num_workers,
            seed: Some(shuffle_seed),
        };

        let train = DataLoader::new(
            TransformedDataset::new(train_data, train_pipeline)?,
            LoaderOptions {
                batch_size: config.reader.batch_size,
                shuffle: config.reader.shuffle,
                drop_last: config.reader.drop_last,
                num_workers: config.reader.num_workers,
                seed: Some(seed),
            },
        )?;
        let train_val = DataLoader::new(TransformedDataset::new(train_split, eval_pipeline.clone())?, eval_options(seed))?;
        let val = DataLoader::new(TransformedDataset::new(eval_split, eval_pipeline)?, eval_options(seed))?;

        let num_steps_per_epoch = train.len();
        info!(
            dataset = %spec.kind,
            num_classes,
            train = train.num_samples(),
            train_val = train_val.num_samples(),
            val = val.num_samples(),
            num_steps_per_epoch,
            "dataset splits ready"
        );

        Ok(Self { spec, num_classes, train, train_val, val, num_steps_per_epoch })
    }
}
