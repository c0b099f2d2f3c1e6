// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// src/transforms/autoaugment.rs
//
// AutoAugment policy learned on CIFAR-10 (Cubuk et al., 2018).
// Each call picks one of 25 sub-policies; a sub-policy applies up to two
// operations, each with its own probability and magnitude level (0..=9).
use anyhow::Result;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, warp, Interpolation, Projection};
use rand::Rng;

use super::{Pixels, SampleRng, Stage, Transform};

const FILL: Rgb<u8> = Rgb([128, 128, 128]);
const LEVELS: f32 = 9.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    ShearX,
    ShearY,
    TranslateX,
    TranslateY,
    Rotate,
    Color,
    Posterize,
    Solarize,
    Contrast,
    Sharpness,
    Brightness,
    AutoContrast,
    Equalize,
    Invert,
}

type SubPolicy = (f32, Op, usize, f32, Op, usize);

#[rustfmt::skip]
const CIFAR10_POLICY: [SubPolicy; 25] = [
    (0.1, Op::Invert, 7, 0.2, Op::Contrast, 6),
    (0.7, Op::Rotate, 2, 0.3, Op::TranslateX, 9),
    (0.8, Op::Sharpness, 1, 0.9, Op::Sharpness, 3),
    (0.5, Op::ShearY, 8, 0.7, Op::TranslateY, 9),
    (0.5, Op::AutoContrast, 8, 0.9, Op::Equalize, 2),
    (0.2, Op::ShearY, 7, 0.3, Op::Posterize, 7),
    (0.4, Op::Color, 3, 0.6, Op::Brightness, 7),
    (0.3, Op::Sharpness, 9, 0.7, Op::Brightness, 9),
    (0.6, Op::Equalize, 5, 0.5, Op::Equalize, 1),
    (0.6, Op::Contrast, 7, 0.6, Op::Sharpness, 5),
    (0.7, Op::Color, 7, 0.5, Op::TranslateX, 8),
    (0.3, Op::Equalize, 7, 0.4, Op::AutoContrast, 8),
    (0.4, Op::TranslateY, 3, 0.2, Op::Sharpness, 6),
    (0.9, Op::Brightness, 6, 0.2, Op::Color, 8),
    (0.5, Op::Solarize, 2, 0.0, Op::Invert, 3),
    (0.2, Op::Equalize, 0, 0.6, Op::AutoContrast, 0),
    (0.2, Op::Equalize, 8, 0.6, Op::Equalize, 4),
    (0.9, Op::Color, 9, 0.6, Op::Equalize, 6),
    (0.8, Op::AutoContrast, 4, 0.2, Op::Solarize, 8),
    (0.1, Op::Brightness, 3, 0.7, Op::Color, 0),
    (0.4, Op::Solarize, 5, 0.9, Op::AutoContrast, 3),
    (0.9, Op::TranslateY, 9, 0.7, Op::TranslateY, 9),
    (0.9, Op::AutoContrast, 2, 0.8, Op::Solarize, 3),
    (0.8, Op::Equalize, 8, 0.1, Op::Invert, 3),
    (0.7, Op::TranslateY, 9, 0.9, Op::AutoContrast, 1),
];

impl Op {
    /// Magnitude for `level` on this op's linear scale.
    pub fn magnitude(&self, level: usize) -> f32 {
        let t = level.min(LEVELS as usize) as f32 / LEVELS;
        match self {
            Op::ShearX | Op::ShearY => 0.3 * t,
            Op::TranslateX | Op::TranslateY => 150.0 / 331.0 * t,
            Op::Rotate => 30.0 * t,
            Op::Color | Op::Contrast | Op::Sharpness | Op::Brightness => 0.9 * t,
            // bits kept, 8 down to 4
            Op::Posterize => (8.0 - 4.0 * t).round(),
            // threshold, 256 down to 0
            Op::Solarize => 256.0 * (1.0 - t),
            Op::AutoContrast | Op::Equalize | Op::Invert => 0.0,
        }
    }

    pub fn apply(&self, img: RgbImage, level: usize, rng: &mut SampleRng) -> Result<RgbImage> {
        let m = self.magnitude(level);
        let sign = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
        let (w, h) = img.dimensions();
        let out = match self {
            Op::ShearX => affine(&img, [1.0, m * sign, 0.0, 0.0, 1.0, 0.0])?,
            Op::ShearY => affine(&img, [1.0, 0.0, 0.0, m * sign, 1.0, 0.0])?,
            Op::TranslateX => affine(&img, [1.0, 0.0, m * w as f32 * sign, 0.0, 1.0, 0.0])?,
            Op::TranslateY => affine(&img, [1.0, 0.0, 0.0, 0.0, 1.0, m * h as f32 * sign])?,
            Op::Rotate => rotate_about_center(&img, (m * sign).to_radians(), Interpolation::Bilinear, FILL),
            Op::Color => {
                let gray = grayscale(&img);
                blend(&gray, &img, 1.0 + m * sign)
            }
            Op::Contrast => {
                let gray = grayscale(&img);
                let mean = (gray.pixels().map(|p| p[0] as f32).sum::<f32>() / (w * h).max(1) as f32 + 0.5) as u8;
                blend(&RgbImage::from_pixel(w, h, Rgb([mean; 3])), &img, 1.0 + m * sign)
            }
            Op::Sharpness => blend(&smooth(&img), &img, 1.0 + m * sign),
            Op::Brightness => blend(&RgbImage::new(w, h), &img, 1.0 + m * sign),
            Op::Posterize => {
                let bits = m as u32;
                let mask = !((1u16 << (8 - bits)) - 1) as u8;
                map_values(img, |v| v & mask)
            }
            Op::Solarize => map_values(img, |v| if v as f32 >= m { 255 - v } else { v }),
            Op::AutoContrast => autocontrast(img),
            Op::Equalize => equalize(img),
            Op::Invert => map_values(img, |v| 255 - v),
        };
        Ok(out)
    }
}

/// 2×3 affine matrix (row-major, last row implied) applied about the origin.
fn affine(img: &RgbImage, m: [f32; 6]) -> Result<RgbImage> {
    let projection = Projection::from_matrix([m[0], m[1], m[2], m[3], m[4], m[5], 0.0, 0.0, 1.0])
        .ok_or_else(|| anyhow::anyhow!("affine matrix {:?} is not invertible", m))?;
    Ok(warp(img, &projection, Interpolation::Bilinear, FILL))
}

fn map_values(mut img: RgbImage, f: impl Fn(u8) -> u8) -> RgbImage {
    for v in img.iter_mut() {
        *v = f(*v);
    }
    img
}

/// ITU-R 601-2 luma replicated over the three channels.
fn grayscale(img: &RgbImage) -> RgbImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        let l = (p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114) / 1000;
        *p = Rgb([l as u8; 3]);
    }
    out
}

/// Interpolate (or extrapolate) from `degenerate` towards `img`.
fn blend(degenerate: &RgbImage, img: &RgbImage, factor: f32) -> RgbImage {
    let mut out = img.clone();
    for (o, (&d, &v)) in out.iter_mut().zip(degenerate.iter().zip(img.iter())) {
        *o = (d as f32 + factor * (v as f32 - d as f32)).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// 3×3 smoothing kernel (centre weight 5, total 13); border pixels are kept.
fn smooth(img: &RgbImage) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut out = img.clone();
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0u32; 3];
            for dy in 0..3 {
                for dx in 0..3 {
                    let weight = if dx == 1 && dy == 1 { 5 } else { 1 };
                    let p = img.get_pixel(x + dx - 1, y + dy - 1);
                    for c in 0..3 {
                        acc[c] += p[c] as u32 * weight;
                    }
                }
            }
            out.put_pixel(x, y, Rgb(acc.map(|a| ((a + 6) / 13) as u8)));
        }
    }
    out
}

/// Stretch each channel so its darkest value maps to 0 and brightest to 255.
fn autocontrast(mut img: RgbImage) -> RgbImage {
    for c in 0..3 {
        let values = img.pixels().map(|p| p[c]);
        let (lo, hi) = values.fold((u8::MAX, u8::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if hi <= lo {
            continue;
        }
        // truncating lookup, brightest value lands exactly on 255
        let span = (hi - lo) as u32;
        for p in img.pixels_mut() {
            p[c] = ((p[c] - lo) as u32 * 255 / span) as u8;
        }
    }
    img
}

/// Per-channel histogram equalization.
fn equalize(mut img: RgbImage) -> RgbImage {
    for c in 0..3 {
        let mut hist = [0usize; 256];
        for p in img.pixels() {
            hist[p[c] as usize] += 1;
        }
        let Some(last) = hist.iter().rposition(|&n| n > 0) else {
            continue;
        };
        let total: usize = hist.iter().sum();
        let step = (total - hist[last]) / 255;
        if step == 0 {
            continue;
        }
        let mut lut = [0u8; 256];
        let mut n = step / 2;
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = (n / step).min(255) as u8;
            n += hist[i];
        }
        for p in img.pixels_mut() {
            p[c] = lut[p[c] as usize];
        }
    }
    img
}

/// The CIFAR-10 AutoAugment policy as an image-stage step.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cifar10Policy;

impl Cifar10Policy {
    pub fn apply_to(&self, img: RgbImage, rng: &mut SampleRng) -> Result<RgbImage> {
        let (p1, op1, level1, p2, op2, level2) = CIFAR10_POLICY[rng.random_range(0..CIFAR10_POLICY.len())];
        let mut img = img;
        if rng.random::<f32>() < p1 {
            img = op1.apply(img, level1, rng)?;
        }
        if rng.random::<f32>() < p2 {
            img = op2.apply(img, level2, rng)?;
        }
        Ok(img)
    }
}

impl Transform for Cifar10Policy {
    fn name(&self) -> &'static str {
        "Cifar10Policy"
    }

    fn input_stage(&self) -> Stage {
        Stage::Image
    }

    fn apply(&self, input: Pixels, rng: &mut SampleRng) -> Result<Pixels> {
        let img = input.into_image(self.name())?;
        let gray = matches!(img, DynamicImage::ImageLuma8(_));
        let out = DynamicImage::ImageRgb8(self.apply_to(img.to_rgb8(), rng)?);
        if gray {
            Ok(Pixels::Image(DynamicImage::ImageLuma8(out.to_luma8())))
        } else {
            Ok(Pixels::Image(out))
        }
    }
}
