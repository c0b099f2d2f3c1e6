// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// src/generation.rs
//
// Small synthetic datasets written in the same on-disk layout the loaders
// read, for smoke tests and benchmarking without the real downloads.
use anyhow::{Context, Result};
use classload_formats::{cifar::CifarVariant, FormatFactory};
use image::{Rgb, RgbImage};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::dataset::sources::{cifar_files, idx_files};
use crate::dataset::Split;
use crate::inat::INatDataset;
use crate::metrics::Metrics;
use crate::registry::{DataSource, DatasetKind, DatasetSpec};

/// Top-level directory of generated iNat images.
const INAT_IMAGE_DIR: &str = "train_val2019";

pub struct DatasetGenerator {
    spec: DatasetSpec,
    root: PathBuf,
    train_count: usize,
    eval_count: usize,
    num_classes: usize,
    year: u32,
}

impl DatasetGenerator {
    pub fn new(kind: DatasetKind, root: impl Into<PathBuf>) -> Self {
        let spec = kind.spec();
        Self {
            num_classes: spec.num_classes,
            spec,
            root: root.into(),
            train_count: 64,
            eval_count: 16,
            year: 2019,
        }
    }

    /// Generator for the dataset, root and manifest year of a run config.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        Ok(Self::new(config.kind()?, config.data_root()).with_year(config.dataset.year))
    }

    /// Samples per split. Folder datasets write this many per folder.
    pub fn with_counts(mut self, train: usize, eval: usize) -> Self {
        self.train_count = train;
        self.eval_count = eval;
        self
    }

    /// Number of distinct classes to emit, capped by the registry.
    pub fn with_classes(mut self, classes: usize) -> Self {
        self.num_classes = classes.clamp(1, self.spec.num_classes);
        self
    }

    pub fn with_year(mut self, year: u32) -> Self {
        self.year = year;
        self
    }

    /// Directory the dataset is written to.
    pub fn target_dir(&self) -> PathBuf {
        self.spec.locate(&self.root)
    }

    /// Whether the dataset already appears to be present.
    pub fn exists(&self) -> bool {
        match self.spec.source {
            DataSource::INatManifest => self.root.join("categories.json").is_file(),
            _ => self.target_dir().is_dir(),
        }
    }

    pub fn generate(&self, metrics: &mut Metrics) -> Result<()> {
        info!(
            dataset = %self.spec.kind,
            root = ?self.root,
            train = self.train_count,
            eval = self.eval_count,
            classes = self.num_classes,
            "generating synthetic dataset"
        );
        let start = Instant::now();
        let dir = self.target_dir();
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create data directory: {:?}", dir))?;

        let mut written = Vec::new();
        match &self.spec.source {
            DataSource::Idx { .. } => {
                for (split, count) in [(Split::Train, self.train_count), (Split::Eval, self.eval_count)] {
                    let (images, labels) = idx_files(split);
                    written.push(self.write_format("idx-images", count, &dir.join(images))?);
                    written.push(self.write_format("idx-labels", count, &dir.join(labels))?);
                }
            }
            DataSource::Cifar10Binary { .. } => self.write_cifar(&dir, CifarVariant::Cifar10, &mut written)?,
            DataSource::Cifar100Binary { .. } => self.write_cifar(&dir, CifarVariant::Cifar100, &mut written)?,
            DataSource::ImageFolders { train, eval, .. } => {
                for folder in train.iter() {
                    self.write_folder(&dir.join(folder), self.train_count, &mut written)?;
                }
                self.write_folder(&dir.join(eval), self.eval_count, &mut written)?;
            }
            DataSource::INatManifest => self.write_inat(&dir, &mut written)?,
        }

        for path in &written {
            let bytes = fs::metadata(path)
                .with_context(|| format!("Failed to get metadata for {:?}", path))?
                .len();
            metrics.record_file_generated(bytes);
        }
        metrics.record_total_time(start.elapsed());
        info!(files = written.len(), "dataset generation completed");
        Ok(())
    }

    fn write_format(&self, format: &str, count: usize, path: &Path) -> Result<PathBuf> {
        FormatFactory::create_format(format, count, self.num_classes)?
            .generate(path)
            .with_context(|| format!("Failed to generate {:?}", path))?;
        debug!(format, count, path = ?path, "wrote records");
        Ok(path.to_path_buf())
    }

    fn write_cifar(&self, dir: &Path, variant: CifarVariant, written: &mut Vec<PathBuf>) -> Result<()> {
        let format = match variant {
            CifarVariant::Cifar10 => "cifar10",
            CifarVariant::Cifar100 => "cifar100",
        };
        for (split, total) in [(Split::Train, self.train_count), (Split::Eval, self.eval_count)] {
            let files = cifar_files(variant, split);
            let n = files.len();
            for (i, file) in files.iter().enumerate() {
                // spread the split evenly, earlier batches take the remainder
                let count = total / n + usize::from(i < total % n);
                written.push(self.write_format(format, count, &dir.join(file))?);
            }
        }
        Ok(())
    }

    fn class_name(label: usize) -> String {
        format!("{:04}", label)
    }

    fn write_folder(&self, dir: &Path, count: usize, written: &mut Vec<PathBuf>) -> Result<()> {
        for label in 0..self.num_classes {
            let class_dir = dir.join(Self::class_name(label));
            fs::create_dir_all(&class_dir).with_context(|| format!("Failed to create {:?}", class_dir))?;
        }
        for i in 0..count {
            let label = i % self.num_classes;
            let path = dir.join(Self::class_name(label)).join(format!("{:06}.png", i));
            self.write_png(&path, label, i)?;
            written.push(path);
        }
        Ok(())
    }

    fn write_png(&self, path: &Path, label: usize, index: usize) -> Result<()> {
        let side = self.spec.img_size;
        let img = RgbImage::from_fn(side, side, |x, y| {
            let base = x as usize * 7 + y as usize * 3 + label * 25 + index;
            Rgb([base as u8, (base + 85) as u8, (base + 170) as u8])
        });
        img.save(path).with_context(|| format!("Failed to write image {:?}", path))
    }

    fn write_inat(&self, root: &Path, written: &mut Vec<PathBuf>) -> Result<()> {
        let categories: Vec<_> = (0..self.num_classes)
            .map(|id| {
                json!({
                    "id": id,
                    "kingdom": "Plantae",
                    "phylum": "Tracheophyta",
                    "class": format!("class_{}", id % 3),
                    "order": format!("order_{}", id % 5),
                    "supercategory": "Plants",
                    "family": format!("family_{}", id / 4),
                    "genus": format!("genus_{}", id / 2),
                    "name": format!("species_{}", id),
                })
            })
            .collect();
        written.push(write_json(&root.join("categories.json"), &json!(categories))?);

        for (split, count) in [(Split::Train, self.train_count), (Split::Eval, self.eval_count)] {
            let mut images = Vec::with_capacity(count);
            let mut annotations = Vec::with_capacity(count);
            for i in 0..count {
                let id = i % self.num_classes;
                let file = format!("{}_{:06}.png", split, i);
                let path = root.join(INAT_IMAGE_DIR).join(id.to_string()).join(&file);
                fs::create_dir_all(path.parent().unwrap_or(root))?;
                self.write_png(&path, id, i)?;
                written.push(path);
                images.push(json!({ "id": i, "file_name": format!("{}/Plants/{}/{}", INAT_IMAGE_DIR, id, file) }));
                annotations.push(json!({ "id": i, "image_id": i, "category_id": id }));
            }
            let manifest = json!({ "images": images, "annotations": annotations });
            written.push(write_json(&INatDataset::manifest_path(root, split, self.year), &manifest)?);
        }
        Ok(())
    }
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<PathBuf> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn idx_layout_and_metrics() {
        let temp = TempDir::new().unwrap();
        let mut metrics = Metrics::new();
        DatasetGenerator::new(DatasetKind::Mnist, temp.path())
            .with_counts(6, 2)
            .generate(&mut metrics)
            .unwrap();

        let dir = temp.path().join("MNIST/raw");
        assert!(dir.join("train-images-idx3-ubyte").is_file());
        assert!(dir.join("t10k-labels-idx1-ubyte").is_file());
        assert_eq!(metrics.files_generated, 4);
        assert!(metrics.bytes_written > 6 * 28 * 28);
    }

    #[test]
    fn cifar10_spreads_records_over_batches() {
        let temp = TempDir::new().unwrap();
        DatasetGenerator::new(DatasetKind::Cifar10, temp.path())
            .with_counts(7, 1)
            .generate(&mut Metrics::new())
            .unwrap();

        let dir = temp.path().join("cifar-10-batches-bin");
        let record = CifarVariant::Cifar10.record_len() as u64;
        let sizes: Vec<u64> = (1..=5)
            .map(|i| fs::metadata(dir.join(format!("data_batch_{}.bin", i))).unwrap().len() / record)
            .collect();
        assert_eq!(sizes, vec![2, 2, 1, 1, 1]);
    }

    #[test]
    fn folders_share_class_directories() {
        let temp = TempDir::new().unwrap();
        DatasetGenerator::new(DatasetKind::Cars, temp.path())
            .with_counts(3, 1)
            .with_classes(4)
            .generate(&mut Metrics::new())
            .unwrap();

        let train = temp.path().join("stanford_cars/train");
        let classes = fs::read_dir(&train).unwrap().count();
        assert_eq!(classes, 4);
        assert!(train.join("0002/000002.png").is_file());
        assert!(temp.path().join("stanford_cars/test/0000/000000.png").is_file());
    }

    #[test]
    fn inat_manifests_use_year() {
        let temp = TempDir::new().unwrap();
        DatasetGenerator::new(DatasetKind::INat2019, temp.path())
            .with_counts(4, 2)
            .with_classes(3)
            .with_year(2021)
            .generate(&mut Metrics::new())
            .unwrap();

        assert!(temp.path().join("categories.json").is_file());
        assert!(temp.path().join("train2021.json").is_file());
        assert!(temp.path().join("val2021.json").is_file());
        assert!(temp.path().join("train_val2019/1/eval_000001.png").is_file());
    }
}
