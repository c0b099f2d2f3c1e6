// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// src/inat.rs
//
// iNaturalist annotation manifests. Labels are dense indices assigned in
// first-seen order over the training manifest's annotations, at a chosen
// taxonomy level.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::dataset::image_folder::load_rgb;
use crate::dataset::{Dataset, RawSample, Split};

/// Taxonomy level that defines the classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyLevel {
    Kingdom,
    Phylum,
    Class,
    Order,
    Supercategory,
    Family,
    Genus,
    #[default]
    Name,
}

impl TaxonomyLevel {
    /// Key of this level in a `categories.json` record.
    pub fn field(&self) -> &'static str {
        match self {
            TaxonomyLevel::Kingdom => "kingdom",
            TaxonomyLevel::Phylum => "phylum",
            TaxonomyLevel::Class => "class",
            TaxonomyLevel::Order => "order",
            TaxonomyLevel::Supercategory => "supercategory",
            TaxonomyLevel::Family => "family",
            TaxonomyLevel::Genus => "genus",
            TaxonomyLevel::Name => "name",
        }
    }
}

impl fmt::Display for TaxonomyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Category id as written in the manifest: an integer, an integral float
/// such as `3.0`, or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CategoryId {
    Number(u64),
    Float(f64),
    Text(String),
}

impl CategoryId {
    pub fn index(&self) -> Result<usize> {
        match self {
            CategoryId::Number(n) => Ok(*n as usize),
            CategoryId::Float(f) => {
                if f.fract() != 0.0 || *f < 0.0 || *f > usize::MAX as f64 {
                    anyhow::bail!("category_id {} is not a non-negative integer", f);
                }
                Ok(*f as usize)
            }
            CategoryId::Text(s) => s
                .trim()
                .parse()
                .with_context(|| format!("category_id {:?} is not an integer", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestImage {
    pub file_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestAnnotation {
    pub category_id: CategoryId,
}

/// One `{train,val}{year}.json` file. Unused keys are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub images: Vec<ManifestImage>,
    #[serde(default)]
    pub annotations: Vec<ManifestAnnotation>,
}

/// A taxonomy label. Strings and other JSON values never collide, so a
/// numeric `1` and the string `"1"` are distinct classes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LabelKey {
    Text(String),
    Json(String),
}

impl fmt::Display for LabelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelKey::Text(s) => write!(f, "{:?}", s),
            LabelKey::Json(s) => f.write_str(s),
        }
    }
}

/// `categories.json`, indexed by category id.
#[derive(Debug, Clone)]
pub struct Categories(Vec<serde_json::Map<String, Value>>);

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open manifest {:?}", path))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("Failed to parse manifest {:?}", path))
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

impl Categories {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self(read_json(path)?))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The label of category `id` at `level`.
    pub fn label(&self, id: usize, level: TaxonomyLevel) -> Result<LabelKey> {
        let record = self
            .0
            .get(id)
            .with_context(|| format!("category id {} out of range ({} categories)", id, self.0.len()))?;
        match record.get(level.field()) {
            Some(Value::String(s)) => Ok(LabelKey::Text(s.clone())),
            Some(Value::Null) | None => anyhow::bail!("category {} has no {:?} entry", id, level.field()),
            Some(other) => Ok(LabelKey::Json(other.to_string())),
        }
    }
}

/// Dense label mapping built from the training manifest.
#[derive(Debug, Clone, Default)]
pub struct Targeter {
    index: HashMap<LabelKey, usize>,
}

impl Targeter {
    pub fn build(training: &Manifest, categories: &Categories, level: TaxonomyLevel) -> Result<Self> {
        let mut index = HashMap::new();
        for (n, annotation) in training.annotations.iter().enumerate() {
            let id = annotation.category_id.index().with_context(|| format!("annotation {}", n))?;
            let label = categories.label(id, level).with_context(|| format!("annotation {}", n))?;
            let next = index.len();
            index.entry(label).or_insert(next);
        }
        Ok(Self { index })
    }

    pub fn nb_classes(&self) -> usize {
        self.index.len()
    }

    pub fn get(&self, label: &LabelKey) -> Option<usize> {
        self.index.get(label).copied()
    }
}

/// `file_name` is `<c0>/<c1>/<class id>/<file>`; returns the image path
/// `root/<c0>/<class id>/<file>` and the class id.
pub fn locate_image(root: &Path, file_name: &str) -> Result<(PathBuf, usize)> {
    let parts: Vec<&str> = file_name.split('/').collect();
    if parts.len() < 4 {
        anyhow::bail!("file_name {:?} has {} path components, expected at least 4", file_name, parts.len());
    }
    let class_id = parts[2]
        .parse()
        .with_context(|| format!("file_name {:?} has a non-numeric class id {:?}", file_name, parts[2]))?;
    Ok((root.join(parts[0]).join(parts[2]).join(parts[3]), class_id))
}

/// Manifest-indexed image dataset for one split.
#[derive(Debug, Clone)]
pub struct INatDataset {
    samples: Vec<(PathBuf, usize)>,
    nb_classes: usize,
    level: TaxonomyLevel,
}

impl INatDataset {
    pub fn manifest_path(root: &Path, split: Split, year: u32) -> PathBuf {
        let prefix = match split {
            Split::Train => "train",
            Split::Eval => "val",
        };
        root.join(format!("{}{}.json", prefix, year))
    }

    pub fn new(root: impl AsRef<Path>, split: Split, year: u32, level: TaxonomyLevel) -> Result<Self> {
        let root = root.as_ref();
        let categories = Categories::load(&root.join("categories.json"))?;
        let training = Manifest::load(&Self::manifest_path(root, Split::Train, year))?;
        let targeter = Targeter::build(&training, &categories, level)?;

        let manifest = match split {
            Split::Train => training,
            Split::Eval => Manifest::load(&Self::manifest_path(root, split, year))?,
        };

        let samples = manifest
            .images
            .iter()
            .map(|image| {
                let (path, class_id) = locate_image(root, &image.file_name)?;
                let label = categories.label(class_id, level)?;
                let target = targeter.get(&label).with_context(|| {
                    format!("label {} of {:?} never appears in the training manifest", label, image.file_name)
                })?;
                Ok((path, target))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            split = %split,
            level = %level,
            samples = samples.len(),
            classes = targeter.nb_classes(),
            "indexed iNat manifest"
        );
        debug!(categories = categories.len(), annotations = manifest.annotations.len(), "manifest detail");

        Ok(Self { samples, nb_classes: targeter.nb_classes(), level })
    }

    pub fn nb_classes(&self) -> usize {
        self.nb_classes
    }

    pub fn level(&self) -> TaxonomyLevel {
        self.level
    }

    pub fn samples(&self) -> &[(PathBuf, usize)] {
        &self.samples
    }
}

impl Dataset for INatDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Result<RawSample> {
        let (path, label) = self
            .samples
            .get(index)
            .with_context(|| format!("index {} out of range for {} iNat samples", index, self.samples.len()))?;
        Ok(RawSample { image: load_rgb(path)?, label: *label })
    }

    fn num_classes(&self) -> Option<usize> {
        Some(self.nb_classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn category(name: &str, genus: &str) -> Value {
        json!({
            "kingdom": "Plantae", "phylum": "Tracheophyta", "class": "Magnoliopsida",
            "order": "Asterales", "supercategory": "Plants", "family": "Asteraceae",
            "genus": genus, "name": name
        })
    }

    fn write(dir: &Path, file: &str, value: &Value) {
        fs::write(dir.join(file), serde_json::to_string(value).unwrap()).unwrap();
    }

    /// Categories 0..3, two sharing a genus. Training annotations visit
    /// ids 2, 0, 2, 1 in that order.
    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "categories.json",
            &json!([category("alpha", "G1"), category("beta", "G1"), category("gamma", "G2")]),
        );
        write(
            temp.path(),
            "train2019.json",
            &json!({
                "images": [
                    {"file_name": "train_val2019/Plants/2/a.jpg"},
                    {"file_name": "train_val2019/Plants/0/b.jpg"},
                    {"file_name": "train_val2019/Plants/1/c.jpg"}
                ],
                "annotations": [
                    {"category_id": 2}, {"category_id": "0"}, {"category_id": 2}, {"category_id": 1}
                ]
            }),
        );
        write(
            temp.path(),
            "val2019.json",
            &json!({"images": [{"file_name": "train_val2019/Plants/1/d.jpg"}], "annotations": []}),
        );
        temp
    }

    #[test]
    fn level_parses_lowercase() {
        let level: TaxonomyLevel = serde_yaml::from_str("genus").unwrap();
        assert_eq!(level, TaxonomyLevel::Genus);
        assert_eq!(TaxonomyLevel::default(), TaxonomyLevel::Name);
        assert!(serde_yaml::from_str::<TaxonomyLevel>("species").is_err());
    }

    #[test]
    fn labels_are_dense_in_first_seen_order() {
        let temp = fixture();
        let train = INatDataset::new(temp.path(), Split::Train, 2019, TaxonomyLevel::Name).unwrap();
        assert_eq!(train.nb_classes(), 3);

        let labels: Vec<usize> = train.samples().iter().map(|(_, l)| *l).collect();
        assert_eq!(labels, vec![0, 1, 2]);
        assert_eq!(train.samples()[0].0, temp.path().join("train_val2019/2/a.jpg"));
    }

    #[test]
    fn coarser_level_merges_classes() {
        let temp = fixture();
        let val = INatDataset::new(temp.path(), Split::Eval, 2019, TaxonomyLevel::Genus).unwrap();
        assert_eq!(val.nb_classes(), 2);
        assert_eq!(val.len(), 1);
        // id 1 is genus G1, first seen through id 0 at index 1
        assert_eq!(val.samples()[0].1, 1);
    }

    #[test]
    fn short_file_name_is_rejected() {
        assert!(locate_image(Path::new("/r"), "a/b/3").is_err());
        assert!(locate_image(Path::new("/r"), "a/b/x/y.jpg").is_err());
        let (path, id) = locate_image(Path::new("/r"), "a/b/7/y.jpg").unwrap();
        assert_eq!((path, id), (PathBuf::from("/r/a/7/y.jpg"), 7));
    }

    #[test]
    fn unseen_label_is_an_error() {
        let temp = fixture();
        write(
            temp.path(),
            "train2019.json",
            &json!({"images": [], "annotations": [{"category_id": 0}]}),
        );
        let err = INatDataset::new(temp.path(), Split::Eval, 2019, TaxonomyLevel::Name).unwrap_err();
        assert!(format!("{:#}", err).contains("never appears"), "{:#}", err);
    }

    #[test]
    fn out_of_range_category_is_an_error() {
        let temp = fixture();
        write(temp.path(), "train2019.json", &json!({"images": [], "annotations": [{"category_id": 9}]}));
        assert!(INatDataset::new(temp.path(), Split::Train, 2019, TaxonomyLevel::Name).is_err());
    }

    #[test]
    fn missing_manifest_names_the_path() {
        let temp = fixture();
        let err = INatDataset::new(temp.path(), Split::Train, 2018, TaxonomyLevel::Name).unwrap_err();
        assert!(format!("{:#}", err).contains("train2018.json"));
    }

    #[test]
    fn integral_float_ids_are_accepted() {
        let ids: Vec<CategoryId> = serde_json::from_str("[3.0, 2.5, -1.0, \" 4 \"]").unwrap();
        assert_eq!(ids[0].index().unwrap(), 3);
        assert!(ids[1].index().is_err());
        assert!(ids[2].index().is_err());
        assert_eq!(ids[3].index().unwrap(), 4);

        let temp = fixture();
        write(
            temp.path(),
            "train2019.json",
            &json!({"images": [], "annotations": [{"category_id": 1.0}, {"category_id": 0}]}),
        );
        let train = INatDataset::new(temp.path(), Split::Train, 2019, TaxonomyLevel::Name).unwrap();
        assert_eq!(train.nb_classes(), 2);
    }

    #[test]
    fn numeric_and_string_labels_stay_distinct() {
        let categories = Categories(vec![
            json!({"name": 1}).as_object().unwrap().clone(),
            json!({"name": "1"}).as_object().unwrap().clone(),
        ]);
        assert_eq!(categories.label(0, TaxonomyLevel::Name).unwrap(), LabelKey::Json("1".into()));
        assert_eq!(categories.label(1, TaxonomyLevel::Name).unwrap(), LabelKey::Text("1".into()));

        let training = Manifest {
            images: vec![],
            annotations: vec![
                ManifestAnnotation { category_id: CategoryId::Number(0) },
                ManifestAnnotation { category_id: CategoryId::Number(1) },
            ],
        };
        let targeter = Targeter::build(&training, &categories, TaxonomyLevel::Name).unwrap();
        assert_eq!(targeter.nb_classes(), 2);
        assert_eq!(targeter.get(&LabelKey::Text("1".into())), Some(1));
    }

    #[test]
    fn missing_level_is_an_error() {
        let categories = Categories(vec![serde_json::Map::new()]);
        assert!(categories.label(0, TaxonomyLevel::Genus).is_err());
    }
}
