// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::Result;
use classload_core::{DatasetGenerator, DatasetKind, DatasetSplits, Metrics, RunConfig};
use std::path::Path;
use tempfile::TempDir;

fn config(name: &str, root: &Path, extra_reader: &str, extra_dataset: &str) -> RunConfig {
    let yaml = format!(
        r#"
dataset:
  name: {name}
  root: {root:?}
{extra_dataset}
reader:
  batch_size: 4
  val_batch_size: 8
  num_workers: 2
  seed: 7
{extra_reader}
"#
    );
    RunConfig::from_yaml(&yaml).expect("test config should parse")
}

fn generate(kind: DatasetKind, root: &Path, train: usize, eval: usize, classes: usize) -> Result<()> {
    DatasetGenerator::new(kind, root)
        .with_counts(train, eval)
        .with_classes(classes)
        .generate(&mut Metrics::new())
}

#[test]
fn mnist_splits_end_to_end() -> Result<()> {
    let temp = TempDir::new()?;
    generate(DatasetKind::Mnist, temp.path(), 10, 6, 10)?;

    let splits = DatasetSplits::build(&config("mnist", temp.path(), "", ""))?;
    assert_eq!(splits.num_classes, 10);
    assert_eq!(splits.num_steps_per_epoch, 3);
    assert_eq!(splits.train.num_samples(), 10);
    assert_eq!(splits.train_val.num_samples(), 10);
    assert_eq!(splits.val.num_samples(), 6);
    assert!(splits.train.shuffle());
    assert!(!splits.train_val.shuffle());
    assert!(!splits.val.shuffle());

    let batch = splits.val.iter(0).next().expect("one val batch")?;
    assert_eq!(batch.images.shape(), &[6, 1, 28, 28]);
    assert_eq!(batch.labels, vec![0, 1, 2, 3, 4, 5]);
    Ok(())
}

#[test]
fn cifar10_train_subset_and_drop_last() -> Result<()> {
    let temp = TempDir::new()?;
    generate(DatasetKind::Cifar10, temp.path(), 20, 5, 10)?;

    let cfg = config("cifar10", temp.path(), "  drop_last: true", "  train_size: 9");
    let splits = DatasetSplits::build(&cfg)?;
    assert_eq!(splits.train.num_samples(), 9);
    assert_eq!(splits.num_steps_per_epoch, 2);
    // train_val keeps the whole training split
    assert_eq!(splits.train_val.num_samples(), 20);

    for batch in splits.train.iter(0) {
        let batch = batch?;
        assert_eq!(batch.images.shape(), &[4, 3, 32, 32]);
    }
    let names = splits.train.dataset().pipeline().names();
    assert_eq!(names.last(), Some(&"Cutout"));
    Ok(())
}

#[test]
fn oversized_train_subset_is_rejected() -> Result<()> {
    let temp = TempDir::new()?;
    generate(DatasetKind::Cifar100, temp.path(), 5, 5, 100)?;
    let cfg = config("cifar100", temp.path(), "", "  train_size: 6");
    assert!(DatasetSplits::build(&cfg).is_err());
    Ok(())
}

#[test]
fn seeded_train_epochs_repeat() -> Result<()> {
    let temp = TempDir::new()?;
    generate(DatasetKind::FashionMnist, temp.path(), 12, 4, 10)?;
    let cfg = config("fashion_mnist", temp.path(), "", "");

    let first = DatasetSplits::build(&cfg)?;
    let second = DatasetSplits::build(&cfg)?;
    let a = first.train.iter(3).next().expect("batch")?;
    let b = second.train.iter(3).next().expect("batch")?;
    assert_eq!(a.indices, b.indices);
    assert_eq!(a.images, b.images);
    Ok(())
}

#[test]
fn svhn_train_includes_extra() -> Result<()> {
    let temp = TempDir::new()?;
    generate(DatasetKind::Svhn, temp.path(), 6, 3, 4)?;
    let splits = DatasetSplits::build(&config("svhn", temp.path(), "", ""))?;
    assert_eq!(splits.train.num_samples(), 12);
    assert_eq!(splits.val.num_samples(), 3);
    assert_eq!(splits.num_classes, 10);
    Ok(())
}

#[test]
fn inat_class_count_comes_from_manifest() -> Result<()> {
    let temp = TempDir::new()?;
    generate(DatasetKind::INat2019, temp.path(), 8, 4, 6)?;

    let splits = DatasetSplits::build(&config("inat2019", temp.path(), "", ""))?;
    assert_eq!(splits.num_classes, 6);
    assert_eq!(splits.val.num_samples(), 4);
    let batch = splits.val.iter(0).next().expect("batch")?;
    assert_eq!(batch.images.shape(), &[4, 3, 32, 32]);

    let genus = config("inat2019", temp.path(), "", "  category: genus");
    assert_eq!(DatasetSplits::build(&genus)?.num_classes, 3);
    Ok(())
}

#[test]
fn missing_data_names_the_split() {
    let temp = TempDir::new().unwrap();
    let err = DatasetSplits::build(&config("cars", temp.path(), "", "")).err().expect("no data");
    assert!(format!("{:#}", err).contains("cars training split"), "{:#}", err);
}
