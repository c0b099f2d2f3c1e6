// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Core library for classload ─ dataset registry, augmentation pipelines and
//! the train / train_val / val loaders of an image-classification run.

pub mod config;
pub mod dataset;
pub mod generation;
pub mod inat;
pub mod loader;
pub mod metrics;
pub mod registry;
pub mod splits;
pub mod transforms;

pub use config::RunConfig;
pub use dataset::{Dataset, Split, TransformedDataset};
pub use generation::DatasetGenerator;
pub use inat::{INatDataset, TaxonomyLevel};
pub use loader::{Batch, DataLoader, LoaderOptions};
pub use metrics::Metrics;
pub use registry::{DatasetKind, DatasetSpec};
pub use splits::DatasetSplits;
