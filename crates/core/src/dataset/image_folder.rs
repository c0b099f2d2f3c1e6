// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// src/dataset/image_folder.rs
//
// `root/<class>/<image>` trees, decoded on demand.
use anyhow::{Context, Result};
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{check_index, Dataset, RawSample};

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Open an image file and convert it to 8-bit RGB.
pub fn load_rgb(path: &Path) -> Result<DynamicImage> {
    let img = image::open(path).with_context(|| format!("Failed to decode image {:?}", path))?;
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to list directory {:?}", dir))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to list directory {:?}", dir))?;
    entries.sort();
    Ok(entries)
}

#[derive(Debug, Clone)]
pub struct ImageFolder {
    root: PathBuf,
    classes: Vec<String>,
    samples: Vec<(PathBuf, usize)>,
}

impl ImageFolder {
    /// Class names are the sorted subdirectory names of `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let classes = Self::discover_classes(root)?;
        Self::with_classes(root, &classes)
    }

    pub fn discover_classes(root: &Path) -> Result<Vec<String>> {
        let classes: Vec<String> = sorted_entries(root)?
            .into_iter()
            .filter(|p| p.is_dir())
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        if classes.is_empty() {
            anyhow::bail!("No class directories found in {:?}", root);
        }
        Ok(classes)
    }

    /// Index `root` against a fixed class list so that several splits share
    /// one label mapping. Missing class directories contribute no samples;
    /// directories outside the list are an error.
    pub fn with_classes(root: impl AsRef<Path>, classes: &[String]) -> Result<Self> {
        let root = root.as_ref();
        for found in Self::discover_classes(root)? {
            if !classes.contains(&found) {
                anyhow::bail!("Class directory {:?} in {:?} is not a known class", found, root);
            }
        }

        let mut samples = Vec::new();
        for (label, class) in classes.iter().enumerate() {
            let dir = root.join(class);
            if !dir.is_dir() {
                continue;
            }
            samples.extend(
                sorted_entries(&dir)?
                    .into_iter()
                    .filter(|p| p.is_file() && is_image(p))
                    .map(|p| (p, label)),
            );
        }
        debug!(root = ?root, classes = classes.len(), samples = samples.len(), "indexed image folder");

        Ok(Self { root: root.to_path_buf(), classes: classes.to_vec(), samples })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn samples(&self) -> &[(PathBuf, usize)] {
        &self.samples
    }
}

impl Dataset for ImageFolder {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Result<RawSample> {
        check_index(index, self.len())?;
        let (path, label) = &self.samples[index];
        Ok(RawSample { image: load_rgb(path)?, label: *label })
    }

    fn num_classes(&self) -> Option<usize> {
        Some(self.classes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    fn write_gray(path: &Path, value: u8) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        GrayImage::from_pixel(4, 4, Luma([value])).save(path).unwrap();
    }

    #[test]
    fn classes_and_files_are_sorted() {
        let temp = TempDir::new().unwrap();
        write_gray(&temp.path().join("b/2.png"), 20);
        write_gray(&temp.path().join("b/1.png"), 10);
        write_gray(&temp.path().join("a/0.png"), 0);
        fs::write(temp.path().join("a/notes.txt"), "skip me").unwrap();

        let folder = ImageFolder::new(temp.path()).unwrap();
        assert_eq!(folder.classes(), &["a".to_string(), "b".to_string()]);
        assert_eq!(folder.len(), 3);
        assert_eq!(folder.num_classes(), Some(2));

        let sample = folder.get(1).unwrap();
        assert_eq!(sample.label, 1);
        assert!(matches!(sample.image, DynamicImage::ImageRgb8(_)));
        assert_eq!(sample.image.to_rgb8().get_pixel(0, 0).0, [10, 10, 10]);
    }

    #[test]
    fn shared_class_list_keeps_labels_stable() {
        let temp = TempDir::new().unwrap();
        write_gray(&temp.path().join("test/c/0.png"), 0);
        let classes = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let folder = ImageFolder::with_classes(temp.path().join("test"), &classes).unwrap();
        assert_eq!(folder.len(), 1);
        assert_eq!(folder.get(0).unwrap().label, 2);

        write_gray(&temp.path().join("test/zzz/0.png"), 0);
        assert!(ImageFolder::with_classes(temp.path().join("test"), &classes).is_err());
    }

    #[test]
    fn empty_or_missing_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        assert!(ImageFolder::new(temp.path()).is_err());
        let err = ImageFolder::new(temp.path().join("absent")).unwrap_err();
        assert!(format!("{:#}", err).contains("absent"));
    }
}
