// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// crates/formats/src/npz.rs

use anyhow::{Context, Result};
use ndarray::{Array1, Array4};
use ndarray_npy::{NpzReader, NpzWriter};
use std::fs::File;
use std::path::Path;

/// Write one batch as a compressed NPZ archive holding `images` (NCHW f32)
/// and `labels` (i64), loadable with `numpy.load`.
pub fn write_batch(path: &Path, images: &Array4<f32>, labels: &[usize]) -> Result<()> {
    if images.shape()[0] != labels.len() {
        anyhow::bail!(
            "batch has {} images but {} labels",
            images.shape()[0],
            labels.len()
        );
    }
    let file = File::create(path).with_context(|| format!("Failed to create NPZ file at {:?}", path))?;
    let labels: Array1<i64> = labels.iter().map(|&l| l as i64).collect();

    let mut npz = NpzWriter::new_compressed(file);
    npz.add_array("images", images)
        .with_context(|| "Failed to serialize images array")?;
    npz.add_array("labels", &labels)
        .with_context(|| "Failed to serialize labels array")?;
    npz.finish().with_context(|| "Failed to finalize NPZ archive")?;
    Ok(())
}

/// Read back a batch written by [`write_batch`].
pub fn read_batch(path: &Path) -> Result<(Array4<f32>, Vec<i64>)> {
    let file = File::open(path).with_context(|| format!("Failed to open NPZ file at {:?}", path))?;
    let mut npz = NpzReader::new(file).with_context(|| "Failed to read NPZ as ZIP archive")?;
    let images: Array4<f32> = npz.by_name("images").with_context(|| "NPZ is missing images")?;
    let labels: Array1<i64> = npz.by_name("labels").with_context(|| "NPZ is missing labels")?;
    Ok((images, labels.to_vec()))
}
