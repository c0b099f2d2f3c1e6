// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// src/dataset/sources.rs
//
// Open one split of a registered dataset from the data root.
use anyhow::{Context, Result};
use classload_formats::cifar::{self, CifarRecords, CifarVariant};
use classload_formats::idx;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::{Concat, Dataset, ImageFolder, InMemoryImages, Split};
use crate::config::DatasetConfig;
use crate::inat::INatDataset;
use crate::registry::{DataSource, DatasetSpec};

/// `(images, labels)` IDX file names for a split. A `.gz` sibling is accepted.
pub fn idx_files(split: Split) -> (&'static str, &'static str) {
    match split {
        Split::Train => ("train-images-idx3-ubyte", "train-labels-idx1-ubyte"),
        Split::Eval => ("t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte"),
    }
}

/// Binary batch files making up a CIFAR split.
pub fn cifar_files(variant: CifarVariant, split: Split) -> Vec<String> {
    match (variant, split) {
        (CifarVariant::Cifar10, Split::Train) => (1..=5).map(|i| format!("data_batch_{}.bin", i)).collect(),
        (CifarVariant::Cifar10, Split::Eval) => vec!["test_batch.bin".to_string()],
        (CifarVariant::Cifar100, Split::Train) => vec!["train.bin".to_string()],
        (CifarVariant::Cifar100, Split::Eval) => vec!["test.bin".to_string()],
    }
}

fn load_idx(dir: &Path, split: Split) -> Result<InMemoryImages> {
    let (images_file, labels_file) = idx_files(split);
    let images = idx::read_images(&dir.join(images_file))?;
    let labels = idx::read_labels(&dir.join(labels_file))?;
    if images.count != labels.len() {
        anyhow::bail!(
            "{:?} holds {} images but {} labels",
            dir.join(images_file),
            images.count,
            labels.len()
        );
    }
    InMemoryImages::new(
        images.cols as u32,
        images.rows as u32,
        1,
        images.pixels,
        labels.into_iter().map(usize::from).collect(),
    )
}

fn load_cifar(dir: &Path, variant: CifarVariant, split: Split) -> Result<InMemoryImages> {
    let mut records = CifarRecords::default();
    for file in cifar_files(variant, split) {
        records.extend(cifar::read_records(&dir.join(&file), variant)?);
    }
    let side = cifar::SIDE as u32;
    InMemoryImages::new(
        side,
        side,
        cifar::CHANNELS,
        records.pixels,
        records.labels.into_iter().map(usize::from).collect(),
    )
}

fn load_folders(dir: &Path, train: &[&str], eval: &str, split: Split) -> Result<Arc<dyn Dataset>> {
    let first = train
        .first()
        .with_context(|| format!("no training folders configured under {:?}", dir))?;
    // every split shares the class list of the first training folder
    let classes = ImageFolder::discover_classes(&dir.join(first))?;
    let folders: &[&str] = match split {
        Split::Train => train,
        Split::Eval => std::slice::from_ref(&eval),
    };
    let mut parts: Vec<Arc<dyn Dataset>> = Vec::with_capacity(folders.len());
    for folder in folders {
        parts.push(Arc::new(ImageFolder::with_classes(dir.join(folder), &classes)?));
    }
    if parts.len() == 1 {
        return Ok(parts.remove(0));
    }
    Ok(Arc::new(Concat::new(parts)))
}

/// Open `split` of the dataset described by `spec`, reading from
/// `config.root`.
pub fn load_split(spec: &DatasetSpec, config: &DatasetConfig, split: Split) -> Result<Arc<dyn Dataset>> {
    let dir = spec.locate(&config.root);
    let dataset: Arc<dyn Dataset> = match &spec.source {
        DataSource::Idx { .. } => Arc::new(load_idx(&dir, split)?),
        DataSource::Cifar10Binary { .. } => Arc::new(load_cifar(&dir, CifarVariant::Cifar10, split)?),
        DataSource::Cifar100Binary { .. } => Arc::new(load_cifar(&dir, CifarVariant::Cifar100, split)?),
        DataSource::ImageFolders { train, eval, .. } => load_folders(&dir, train, eval, split)?,
        DataSource::INatManifest => Arc::new(INatDataset::new(&dir, split, config.year, config.category)?),
    };
    info!(dataset = %spec.kind, split = %split, samples = dataset.len(), path = ?dir, "opened split");
    Ok(dataset)
}
