// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// crates/formats/src/idx.rs
//
// MNIST / Fashion-MNIST IDX files. All header values are big-endian:
//   images: magic(2051) | count | rows | cols | u8 pixels...
//   labels: magic(2049) | count | u8 labels...
// A `.gz` sibling is used transparently when the plain file is absent.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::Format;

pub const IMAGES_MAGIC: u32 = 2051;
pub const LABELS_MAGIC: u32 = 2049;

/// Decoded IDX image file, row-major `count × rows × cols` bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct IdxImages {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
    pub pixels: Vec<u8>,
}

/// Locate `path` or its gzip-compressed sibling.
pub fn resolve(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let mut gz = path.as_os_str().to_os_string();
    gz.push(".gz");
    let gz = PathBuf::from(gz);
    gz.is_file().then_some(gz)
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

fn open(path: &Path) -> Result<Box<dyn Read>> {
    let resolved = resolve(path)
        .ok_or_else(|| anyhow::anyhow!("IDX file not found: {}", path.display()))?;
    let file = File::open(&resolved)
        .with_context(|| format!("Failed to open IDX file {:?}", resolved))?;
    let reader = BufReader::new(file);
    if is_gzip(&resolved) {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

fn create(path: &Path) -> Result<Box<dyn Write>> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create IDX file {:?}", path))?;
    let writer = BufWriter::new(file);
    if is_gzip(path) {
        Ok(Box::new(GzEncoder::new(writer, Compression::fast())))
    } else {
        Ok(Box::new(writer))
    }
}

fn read_u32<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let mut b = [0u8; 4];
    reader.read_exact(&mut b)?;
    Ok(u32::from_be_bytes(b))
}

fn check_magic<R: Read + ?Sized>(reader: &mut R, expected: u32) -> Result<()> {
    let magic = read_u32(reader)?;
    if magic != expected {
        anyhow::bail!("incorrect magic number {} != {}", magic, expected);
    }
    Ok(())
}

/// Read exactly `len` payload bytes. The buffer grows with the data
/// actually present, so a corrupt header cannot force a huge allocation.
fn read_payload<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    reader.take(len as u64).read_to_end(&mut payload)?;
    if payload.len() != len {
        anyhow::bail!("header declares {} payload bytes but the file holds {}", len, payload.len());
    }
    Ok(payload)
}

/// Read an IDX image file.
pub fn read_images(path: &Path) -> Result<IdxImages> {
    let mut reader = open(path)?;
    let parsed = (|| -> Result<IdxImages> {
        check_magic(&mut reader, IMAGES_MAGIC)?;
        let count = read_u32(&mut reader)? as usize;
        let rows = read_u32(&mut reader)? as usize;
        let cols = read_u32(&mut reader)? as usize;
        let len = count
            .checked_mul(rows)
            .and_then(|n| n.checked_mul(cols))
            .with_context(|| format!("header size {}x{}x{} overflows", count, rows, cols))?;
        let pixels = read_payload(&mut reader, len)?;
        Ok(IdxImages { count, rows, cols, pixels })
    })();
    parsed.with_context(|| format!("Failed to read IDX images {:?}", path))
}

/// Read an IDX label file.
pub fn read_labels(path: &Path) -> Result<Vec<u8>> {
    let mut reader = open(path)?;
    let parsed = (|| -> Result<Vec<u8>> {
        check_magic(&mut reader, LABELS_MAGIC)?;
        let count = read_u32(&mut reader)? as usize;
        read_payload(&mut reader, count)
    })();
    parsed.with_context(|| format!("Failed to read IDX labels {:?}", path))
}

pub fn write_images(path: &Path, images: &IdxImages) -> Result<()> {
    if images.pixels.len() != images.count * images.rows * images.cols {
        anyhow::bail!(
            "pixel buffer has {} bytes, expected {}x{}x{}",
            images.pixels.len(),
            images.count,
            images.rows,
            images.cols
        );
    }
    let mut writer = create(path)?;
    for v in [IMAGES_MAGIC, images.count as u32, images.rows as u32, images.cols as u32] {
        writer.write_all(&v.to_be_bytes())?;
    }
    writer.write_all(&images.pixels)?;
    writer.flush()?;
    Ok(())
}

pub fn write_labels(path: &Path, labels: &[u8]) -> Result<()> {
    let mut writer = create(path)?;
    writer.write_all(&LABELS_MAGIC.to_be_bytes())?;
    writer.write_all(&(labels.len() as u32).to_be_bytes())?;
    writer.write_all(labels)?;
    writer.flush()?;
    Ok(())
}

/// Synthetic IDX image generator + reader
pub struct IdxImagesFormat {
    count: usize,
    rows: usize,
    cols: usize,
}

impl IdxImagesFormat {
    pub fn new(count: usize, rows: usize, cols: usize) -> Self {
        Self { count, rows, cols }
    }

    /// Deterministic gradient pattern, shifted per image.
    pub fn synthetic(&self) -> IdxImages {
        let per_image = self.rows * self.cols;
        let pixels = (0..self.count * per_image)
            .map(|i| ((i % per_image) + 13 * (i / per_image)) as u8)
            .collect();
        IdxImages { count: self.count, rows: self.rows, cols: self.cols, pixels }
    }
}

impl Format for IdxImagesFormat {
    fn generate(&self, path: &Path) -> Result<()> {
        write_images(path, &self.synthetic())
    }

    fn read(&self, path: &Path) -> Result<usize> {
        let images = read_images(path)?;
        if images.rows != self.rows || images.cols != self.cols {
            anyhow::bail!(
                "expected {}x{} images, found {}x{}",
                self.rows,
                self.cols,
                images.rows,
                images.cols
            );
        }
        Ok(images.count)
    }
}

/// Synthetic IDX label generator + reader
pub struct IdxLabelsFormat {
    count: usize,
    num_classes: usize,
}

impl IdxLabelsFormat {
    pub fn new(count: usize, num_classes: usize) -> Self {
        Self { count, num_classes: num_classes.clamp(1, 256) }
    }

    pub fn synthetic(&self) -> Vec<u8> {
        (0..self.count).map(|i| (i % self.num_classes) as u8).collect()
    }
}

impl Format for IdxLabelsFormat {
    fn generate(&self, path: &Path) -> Result<()> {
        write_labels(path, &self.synthetic())
    }

    fn read(&self, path: &Path) -> Result<usize> {
        let labels = read_labels(path)?;
        if let Some(bad) = labels.iter().find(|&&l| l as usize >= self.num_classes) {
            anyhow::bail!("label {} outside of {} classes", bad, self.num_classes);
        }
        Ok(labels.len())
    }
}
