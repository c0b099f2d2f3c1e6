// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// crates/formats/src/lib.rs
//
pub mod cifar;
pub mod idx;
pub mod npz;

pub use cifar::{CifarFormat, CifarRecords, CifarVariant};
pub use idx::{IdxImages, IdxImagesFormat, IdxLabelsFormat};
pub use npz::{read_batch, write_batch};

/// A simple data‐format interface.
pub trait Format {
    /// Generate synthetic records and write them to `path`.
    fn generate(&self, path: &std::path::Path) -> anyhow::Result<()>;
    /// Read & validate the data at `path`, returning the number of records.
    fn read(&self, path: &std::path::Path) -> anyhow::Result<usize>;
}

/// Format factory for creating format instances from config strings
pub struct FormatFactory;

impl FormatFactory {
    /// Create a format instance for `format_name`.
    ///
    /// `count` is the number of records to generate, `num_classes` bounds the
    /// synthetic labels.
    pub fn create_format(
        format_name: &str,
        count: usize,
        num_classes: usize,
    ) -> anyhow::Result<Box<dyn Format>> {
        match format_name.to_lowercase().as_str() {
            "idx-images" => Ok(Box::new(IdxImagesFormat::new(count, 28, 28))),
            "idx-labels" => Ok(Box::new(IdxLabelsFormat::new(count, num_classes))),
            "cifar10" => Ok(Box::new(CifarFormat::new(CifarVariant::Cifar10, count, num_classes))),
            "cifar100" => Ok(Box::new(CifarFormat::new(CifarVariant::Cifar100, count, num_classes))),
            _ => {
                anyhow::bail!("Unsupported format: {}", format_name)
            }
        }
    }

    /// Get all supported format names
    pub fn supported_formats() -> Vec<&'static str> {
        vec!["idx-images", "idx-labels", "cifar10", "cifar100"]
    }
}
