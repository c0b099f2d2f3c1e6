// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// src/transforms/pipeline.rs
//
// Fixed train / eval pipelines per dataset.
use anyhow::Result;
use tracing::debug;

use super::{
    Cifar10Policy, Compose, Cutout, Normalize, RandomAffine, RandomCrop, RandomHorizontalFlip, Resize, ToTensor,
};
use crate::config::AugmentationConfig;
use crate::registry::{DatasetKind, DatasetSpec};

/// MNIST mean / std, also used for Fashion-MNIST.
pub const NORMALIZE_MNIST: ([f32; 1], [f32; 1]) = ([0.1307], [0.3081]);

/// CIFAR-10 per-channel mean / std on the 0..255 scale.
pub const NORMALIZE_CIFAR: ([f32; 3], [f32; 3]) = ([125.3, 123.0, 113.9], [63.0, 62.1, 66.7]);

const CIFAR_SIDE: u32 = 32;
const CIFAR_PADDING: u32 = 4;

fn mnist_normalize() -> Result<Normalize> {
    Normalize::new(NORMALIZE_MNIST.0.to_vec(), NORMALIZE_MNIST.1.to_vec())
}

fn cifar_normalize() -> Result<Normalize> {
    let (mean, std) = NORMALIZE_CIFAR;
    Normalize::new(mean.iter().map(|m| m / 255.0).collect(), std.iter().map(|s| s / 255.0).collect())
}

/// Shared CIFAR-style base used by every 32×32 RGB dataset.
fn cifar_base() -> Result<(Compose, Compose)> {
    let train = Compose::new()
        .with(RandomCrop::new(CIFAR_SIDE, CIFAR_PADDING))
        .with(RandomHorizontalFlip::default())
        .with(Cifar10Policy)
        .with(ToTensor)
        .with(cifar_normalize()?);
    let eval = Compose::new()
        .with(Resize::new(CIFAR_SIDE, CIFAR_SIDE))
        .with(ToTensor)
        .with(cifar_normalize()?);
    Ok((train, eval))
}

/// Build the `(train, eval)` pipelines for a dataset.
pub fn for_spec(spec: &DatasetSpec, augmentation: &AugmentationConfig) -> Result<(Compose, Compose)> {
    let optional_cutout = |default_length: usize| {
        augmentation
            .cutout
            .then(|| Cutout::new(augmentation.n_holes, augmentation.length.unwrap_or(default_length)))
    };

    let (train, eval) = match spec.kind {
        DatasetKind::Mnist => (
            Compose::new().with(ToTensor).with(mnist_normalize()?),
            Compose::new().with(ToTensor).with(mnist_normalize()?),
        ),
        DatasetKind::FashionMnist => (
            Compose::new()
                .with(RandomAffine::new((-15.0, 15.0), (0.8, 1.2))?)
                .with(ToTensor)
                .with(mnist_normalize()?),
            Compose::new().with(ToTensor).with(mnist_normalize()?),
        ),
        DatasetKind::Cifar10 => {
            let (train, eval) = cifar_base()?;
            (train.with(Cutout::new(1, 16)), eval)
        }
        DatasetKind::Cifar100 => {
            let (train, eval) = cifar_base()?;
            (train.with(Cutout::new(1, 8)), eval)
        }
        DatasetKind::Svhn | DatasetKind::INat2019 => {
            let (mut train, eval) = cifar_base()?;
            let default_length = if spec.kind == DatasetKind::Svhn { 20 } else { 8 };
            if let Some(cutout) = optional_cutout(default_length) {
                train.push(cutout);
            }
            (train, eval)
        }
        DatasetKind::Cars | DatasetKind::Flowers => cifar_base()?,
    };

    train.check()?;
    eval.check()?;
    debug!(dataset = %spec.kind, train = %train, eval = %eval, "assembled pipelines");
    Ok((train, eval))
}
