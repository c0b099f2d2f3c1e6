// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// crates/formats/src/cifar.rs
//
// CIFAR binary batches. Every record is a label prefix followed by a
// 32x32x3 image stored plane by plane (all red, then green, then blue).

use anyhow::{Context, Result};
use std::path::Path;

use crate::Format;

pub const SIDE: usize = 32;
pub const CHANNELS: usize = 3;
pub const IMAGE_BYTES: usize = SIDE * SIDE * CHANNELS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CifarVariant {
    /// `<label> <3072 pixels>`
    Cifar10,
    /// `<coarse label> <fine label> <3072 pixels>`
    Cifar100,
}

impl CifarVariant {
    pub fn label_bytes(&self) -> usize {
        match self {
            CifarVariant::Cifar10 => 1,
            CifarVariant::Cifar100 => 2,
        }
    }

    pub fn record_len(&self) -> usize {
        self.label_bytes() + IMAGE_BYTES
    }
}

/// Decoded CIFAR records with pixels already interleaved (HWC).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CifarRecords {
    pub pixels: Vec<u8>,
    /// The CIFAR-10 label, or the fine CIFAR-100 label.
    pub labels: Vec<u8>,
    /// Empty for CIFAR-10.
    pub coarse_labels: Vec<u8>,
}

impl CifarRecords {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Append another batch file's records.
    pub fn extend(&mut self, other: CifarRecords) {
        self.pixels.extend(other.pixels);
        self.labels.extend(other.labels);
        self.coarse_labels.extend(other.coarse_labels);
    }
}

fn planar_to_interleaved(planar: &[u8], out: &mut Vec<u8>) {
    let plane = SIDE * SIDE;
    for p in 0..plane {
        for c in 0..CHANNELS {
            out.push(planar[c * plane + p]);
        }
    }
}

fn interleaved_to_planar(interleaved: &[u8], out: &mut Vec<u8>) {
    for c in 0..CHANNELS {
        out.extend(interleaved.iter().skip(c).step_by(CHANNELS));
    }
}

/// Decode an in-memory CIFAR batch.
pub fn parse_records(data: &[u8], variant: CifarVariant) -> Result<CifarRecords> {
    let record_len = variant.record_len();
    if data.len() % record_len != 0 {
        anyhow::bail!(
            "batch size {} is not a multiple of the {}-byte record length",
            data.len(),
            record_len
        );
    }
    let count = data.len() / record_len;
    let mut records = CifarRecords {
        pixels: Vec::with_capacity(count * IMAGE_BYTES),
        labels: Vec::with_capacity(count),
        coarse_labels: Vec::new(),
    };
    for record in data.chunks_exact(record_len) {
        match variant {
            CifarVariant::Cifar10 => records.labels.push(record[0]),
            CifarVariant::Cifar100 => {
                records.coarse_labels.push(record[0]);
                records.labels.push(record[1]);
            }
        }
        planar_to_interleaved(&record[variant.label_bytes()..], &mut records.pixels);
    }
    Ok(records)
}

pub fn read_records(path: &Path, variant: CifarVariant) -> Result<CifarRecords> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read CIFAR batch {:?}", path))?;
    parse_records(&data, variant).with_context(|| format!("Invalid CIFAR batch {:?}", path))
}

pub fn encode_records(records: &CifarRecords, variant: CifarVariant) -> Result<Vec<u8>> {
    if records.pixels.len() != records.len() * IMAGE_BYTES {
        anyhow::bail!("pixel buffer does not hold {} images", records.len());
    }
    if variant == CifarVariant::Cifar100 && records.coarse_labels.len() != records.len() {
        anyhow::bail!("CIFAR-100 records need one coarse label per image");
    }
    let mut out = Vec::with_capacity(records.len() * variant.record_len());
    for (i, image) in records.pixels.chunks_exact(IMAGE_BYTES).enumerate() {
        if variant == CifarVariant::Cifar100 {
            out.push(records.coarse_labels[i]);
        }
        out.push(records.labels[i]);
        interleaved_to_planar(image, &mut out);
    }
    Ok(out)
}

pub fn write_records(path: &Path, records: &CifarRecords, variant: CifarVariant) -> Result<()> {
    let bytes = encode_records(records, variant)?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write CIFAR batch {:?}", path))
}

/// Synthetic CIFAR batch generator + reader
pub struct CifarFormat {
    variant: CifarVariant,
    count: usize,
    num_classes: usize,
}

impl CifarFormat {
    pub fn new(variant: CifarVariant, count: usize, num_classes: usize) -> Self {
        Self { variant, count, num_classes: num_classes.clamp(1, 256) }
    }

    pub fn synthetic(&self) -> CifarRecords {
        let labels: Vec<u8> = (0..self.count).map(|i| (i % self.num_classes) as u8).collect();
        let coarse_labels = match self.variant {
            CifarVariant::Cifar10 => Vec::new(),
            CifarVariant::Cifar100 => labels.iter().map(|l| l / 5).collect(),
        };
        let pixels = (0..self.count * IMAGE_BYTES)
            .map(|i| {
                let (image, offset) = (i / IMAGE_BYTES, i % IMAGE_BYTES);
                (offset / CHANNELS + 31 * image + 85 * (offset % CHANNELS)) as u8
            })
            .collect();
        CifarRecords { pixels, labels, coarse_labels }
    }
}

impl Format for CifarFormat {
    fn generate(&self, path: &Path) -> Result<()> {
        write_records(path, &self.synthetic(), self.variant)
    }

    fn read(&self, path: &Path) -> Result<usize> {
        let records = read_records(path, self.variant)?;
        if let Some(bad) = records.labels.iter().find(|&&l| l as usize >= self.num_classes) {
            anyhow::bail!("label {} outside of {} classes", bad, self.num_classes);
        }
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planes_are_interleaved_on_read() {
        let mut record = vec![7u8];
        record.extend(std::iter::repeat(10u8).take(SIDE * SIDE));
        record.extend(std::iter::repeat(20u8).take(SIDE * SIDE));
        record.extend(std::iter::repeat(30u8).take(SIDE * SIDE));

        let records = parse_records(&record, CifarVariant::Cifar10).unwrap();
        assert_eq!(records.labels, vec![7]);
        assert_eq!(&records.pixels[..6], &[10, 20, 30, 10, 20, 30]);
    }

    #[test]
    fn cifar100_reads_fine_label() {
        let mut record = vec![3u8, 42u8];
        record.extend(std::iter::repeat(0u8).take(IMAGE_BYTES));

        let records = parse_records(&record, CifarVariant::Cifar100).unwrap();
        assert_eq!(records.labels, vec![42]);
        assert_eq!(records.coarse_labels, vec![3]);
    }

    #[test]
    fn partial_record_is_rejected() {
        let data = vec![0u8; CifarVariant::Cifar10.record_len() + 5];
        assert!(parse_records(&data, CifarVariant::Cifar10).is_err());
    }

    #[test]
    fn encode_restores_planar_layout() {
        let format = CifarFormat::new(CifarVariant::Cifar100, 4, 100);
        let records = format.synthetic();
        let bytes = encode_records(&records, CifarVariant::Cifar100).unwrap();
        assert_eq!(bytes.len(), 4 * CifarVariant::Cifar100.record_len());
        assert_eq!(parse_records(&bytes, CifarVariant::Cifar100).unwrap(), records);
    }
}
