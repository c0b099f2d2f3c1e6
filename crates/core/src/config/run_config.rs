// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// crates/core/src/config/run_config.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::inat::TaxonomyLevel;
use crate::registry::DatasetKind;

/// Environment variable that replaces `dataset.root` when set.
pub const DATA_ROOT_ENV: &str = "CLASSLOAD_DATA_ROOT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunConfig {
    pub dataset: DatasetConfig,            // name, root, train_size, iNat options
    pub reader: ReaderConfig,              // batch sizes, shuffle, workers, seed
    #[serde(default)]
    pub augmentation: AugmentationConfig,  // optional cutout knobs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,                      // "mnist" | "cifar10" | "inat2019" | ...
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Number of training samples to keep; -1 or absent keeps all of them.
    pub train_size: Option<i64>,
    #[serde(default)]
    pub category: TaxonomyLevel,
    #[serde(default = "default_year")]
    pub year: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    pub batch_size: usize,
    pub val_batch_size: Option<usize>,
    #[serde(default = "default_true", alias = "dataset_shuffle")]
    pub shuffle: bool,
    #[serde(default)]
    pub num_workers: usize,
    #[serde(default)]
    pub drop_last: bool,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentationConfig {
    #[serde(default)]
    pub cutout: bool,
    #[serde(default = "default_holes")]
    pub n_holes: usize,
    pub length: Option<usize>,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self { cutout: false, n_holes: default_holes(), length: None }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("data/")
}

fn default_year() -> u32 {
    2019
}

fn default_true() -> bool {
    true
}

fn default_holes() -> usize {
    1
}

impl RunConfig {
    /// Parse config from JSON string
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| anyhow::anyhow!("Failed to parse JSON config: {}", e))
    }

    /// Parse config from YAML string
    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        serde_yaml::from_str(yaml_str).map_err(|e| anyhow::anyhow!("Failed to parse YAML config: {}", e))
    }

    /// Load config from a YAML (or `.json`) file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", path, e))?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    /// Dataset kind named by `dataset.name`
    pub fn kind(&self) -> Result<DatasetKind> {
        self.dataset.name.parse()
    }

    pub fn data_root(&self) -> &Path {
        &self.dataset.root
    }

    /// Replace the data root, e.g. from [`DATA_ROOT_ENV`].
    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.dataset.root = root.into();
        self
    }

    /// Requested training subset size, `None` for the full split.
    pub fn train_size(&self) -> Option<usize> {
        match self.dataset.train_size {
            Some(n) if n >= 0 => Some(n as usize),
            _ => None,
        }
    }

    /// Batch size for the two evaluation loaders
    pub fn val_batch_size(&self) -> usize {
        self.reader.val_batch_size.unwrap_or(self.reader.batch_size)
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<()> {
        self.kind()?;

        if self.reader.batch_size == 0 {
            anyhow::bail!("reader.batch_size must be > 0");
        }
        if self.reader.val_batch_size == Some(0) {
            anyhow::bail!("reader.val_batch_size must be > 0 if specified");
        }
        match self.dataset.train_size {
            Some(n) if n == 0 || n < -1 => {
                anyhow::bail!("dataset.train_size must be -1 or a positive count, got {}", n)
            }
            _ => {}
        }
        if self.augmentation.n_holes == 0 {
            anyhow::bail!("augmentation.n_holes must be > 0");
        }
        if self.augmentation.length == Some(0) {
            anyhow::bail!("augmentation.length must be > 0 if specified");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
dataset:
  name: "cifar10"
  root: "/tmp/data"
reader:
  batch_size: 128
  num_workers: 2
"#;

    #[test]
    fn test_yaml_parsing_with_defaults() {
        let config = RunConfig::from_yaml(YAML).expect("Should parse YAML");
        assert_eq!(config.kind().unwrap(), DatasetKind::Cifar10);
        assert_eq!(config.data_root(), Path::new("/tmp/data"));
        assert_eq!(config.val_batch_size(), 128);
        assert!(config.reader.shuffle);
        assert_eq!(config.train_size(), None);
        assert_eq!(config.dataset.year, 2019);
        assert_eq!(config.dataset.category, TaxonomyLevel::Name);
        assert!(!config.augmentation.cutout);
        assert_eq!(config.augmentation.n_holes, 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_dataset_shuffle_alias() {
        let yaml = r#"
dataset: { name: mnist, train_size: -1 }
reader: { batch_size: 8, dataset_shuffle: false }
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert!(!config.reader.shuffle);
        assert_eq!(config.train_size(), None);
        assert_eq!(config.data_root(), Path::new("data/"));
    }

    #[test]
    fn test_validation_failures() {
        let base = RunConfig::from_yaml(YAML).unwrap();

        let mut bad = base.clone();
        bad.reader.batch_size = 0;
        assert!(bad.validate().is_err());

        let mut bad = base.clone();
        bad.dataset.train_size = Some(0);
        assert!(bad.validate().is_err());

        let mut bad = base.clone();
        bad.dataset.name = "imagenet".to_string();
        assert!(bad.validate().is_err());

        let mut bad = base.clone();
        bad.augmentation.length = Some(0);
        assert!(bad.validate().is_err());

        let mut ok = base;
        ok.dataset.train_size = Some(500);
        ok.validate().unwrap();
        assert_eq!(ok.train_size(), Some(500));
    }

    #[test]
    fn test_json_config() {
        let json = r#"{
            "dataset": { "name": "inat2019", "category": "genus", "year": 2019 },
            "reader": { "batch_size": 4, "val_batch_size": 16, "seed": 7 },
            "augmentation": { "cutout": true, "n_holes": 2 }
        }"#;
        let config = RunConfig::from_json(json).unwrap();
        assert_eq!(config.dataset.category, TaxonomyLevel::Genus);
        assert_eq!(config.val_batch_size(), 16);
        assert_eq!(config.reader.seed, Some(7));
        assert_eq!(config.augmentation.length, None);
    }
}
