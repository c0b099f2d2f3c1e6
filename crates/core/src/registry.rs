// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// src/registry.rs
//
// Table of supported datasets: class count, image geometry and where the
// files live under the data root.
use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    Mnist,
    FashionMnist,
    Cifar10,
    Cifar100,
    Svhn,
    Cars,
    Flowers,
    INat2019,
}

/// How a dataset is stored under the data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// MNIST-style IDX files in `dir`.
    Idx { dir: &'static str },
    /// CIFAR-10 binary batches in `dir`.
    Cifar10Binary { dir: &'static str },
    /// CIFAR-100 binary `train.bin` / `test.bin` in `dir`.
    Cifar100Binary { dir: &'static str },
    /// One class-per-subfolder tree per split: `dir/<split>/<class>/...`.
    ImageFolders {
        dir: &'static str,
        train: &'static [&'static str],
        eval: &'static str,
    },
    /// iNaturalist JSON manifests at the root.
    INatManifest,
}

/// Static description of one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    pub kind: DatasetKind,
    pub num_classes: usize,
    pub img_size: u32,
    pub num_channels: usize,
    pub source: DataSource,
}

impl DatasetKind {
    pub fn all() -> &'static [DatasetKind] {
        &[
            DatasetKind::Mnist,
            DatasetKind::FashionMnist,
            DatasetKind::Cifar10,
            DatasetKind::Cifar100,
            DatasetKind::Svhn,
            DatasetKind::Cars,
            DatasetKind::Flowers,
            DatasetKind::INat2019,
        ]
    }

    /// Canonical config name
    pub fn name(&self) -> &'static str {
        match self {
            DatasetKind::Mnist => "mnist",
            DatasetKind::FashionMnist => "fashion_mnist",
            DatasetKind::Cifar10 => "cifar10",
            DatasetKind::Cifar100 => "cifar100",
            DatasetKind::Svhn => "svhn",
            DatasetKind::Cars => "cars",
            DatasetKind::Flowers => "flowers",
            DatasetKind::INat2019 => "inat2019",
        }
    }

    pub fn spec(&self) -> DatasetSpec {
        DatasetSpec::for_kind(*self)
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DatasetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();
        match normalized.as_str() {
            "mnist" => Ok(DatasetKind::Mnist),
            "fashionmnist" | "fmnist" => Ok(DatasetKind::FashionMnist),
            "cifar10" => Ok(DatasetKind::Cifar10),
            "cifar100" => Ok(DatasetKind::Cifar100),
            "svhn" => Ok(DatasetKind::Svhn),
            "cars" | "stanfordcars" => Ok(DatasetKind::Cars),
            "flowers" | "flowers102" => Ok(DatasetKind::Flowers),
            "inat2019" | "inat" => Ok(DatasetKind::INat2019),
            _ => Err(anyhow::anyhow!(
                "Unsupported dataset: {}. Known datasets: {}",
                s,
                DatasetKind::all().iter().map(|k| k.name()).collect::<Vec<_>>().join(", ")
            )),
        }
    }
}

impl DatasetSpec {
    pub fn for_kind(kind: DatasetKind) -> Self {
        let (num_classes, img_size, num_channels, source) = match kind {
            DatasetKind::Mnist => (10, 28, 1, DataSource::Idx { dir: "MNIST/raw" }),
            DatasetKind::FashionMnist => (10, 28, 1, DataSource::Idx { dir: "FashionMNIST/raw" }),
            DatasetKind::Cifar10 => (10, 32, 3, DataSource::Cifar10Binary { dir: "cifar-10-batches-bin" }),
            DatasetKind::Cifar100 => (100, 32, 3, DataSource::Cifar100Binary { dir: "cifar-100-binary" }),
            DatasetKind::Svhn => (
                10,
                32,
                3,
                DataSource::ImageFolders { dir: "svhn", train: &["train", "extra"], eval: "test" },
            ),
            DatasetKind::Cars => (
                196,
                32,
                3,
                DataSource::ImageFolders { dir: "stanford_cars", train: &["train"], eval: "test" },
            ),
            DatasetKind::Flowers => (
                102,
                32,
                3,
                DataSource::ImageFolders { dir: "flowers-102", train: &["train"], eval: "val" },
            ),
            DatasetKind::INat2019 => (102, 32, 3, DataSource::INatManifest),
        };
        Self { kind, num_classes, img_size, num_channels, source }
    }

    /// Directory (or manifest root) the source is read from.
    pub fn locate(&self, root: &Path) -> PathBuf {
        match &self.source {
            DataSource::Idx { dir }
            | DataSource::Cifar10Binary { dir }
            | DataSource::Cifar100Binary { dir }
            | DataSource::ImageFolders { dir, .. } => root.join(dir),
            DataSource::INatManifest => root.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in DatasetKind::all() {
            assert_eq!(kind.name().parse::<DatasetKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_aliases() {
        let cases = [
            ("FashionMNIST", DatasetKind::FashionMnist),
            ("CIFAR-10", DatasetKind::Cifar10),
            ("cifar_100", DatasetKind::Cifar100),
            ("StanfordCars", DatasetKind::Cars),
            ("flowers102", DatasetKind::Flowers),
            ("iNat", DatasetKind::INat2019),
        ];
        for (name, expected) in cases {
            assert_eq!(name.parse::<DatasetKind>().unwrap(), expected, "alias {}", name);
        }
        assert!("imagenet".parse::<DatasetKind>().is_err());
    }

    #[test]
    fn test_table_values() {
        let mnist = DatasetKind::Mnist.spec();
        assert_eq!((mnist.num_classes, mnist.img_size, mnist.num_channels), (10, 28, 1));

        let cifar100 = DatasetKind::Cifar100.spec();
        assert_eq!((cifar100.num_classes, cifar100.img_size, cifar100.num_channels), (100, 32, 3));

        assert_eq!(DatasetKind::Cars.spec().num_classes, 196);
        assert_eq!(DatasetKind::Flowers.spec().num_classes, 102);
        assert!(DatasetKind::all().iter().all(|k| k.spec().kind == *k));
    }

    #[test]
    fn test_locate() {
        let root = Path::new("/data");
        assert_eq!(DatasetKind::Svhn.spec().locate(root), Path::new("/data/svhn"));
        assert_eq!(DatasetKind::INat2019.spec().locate(root), Path::new("/data"));
    }
}
