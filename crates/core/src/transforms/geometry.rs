// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// src/transforms/geometry.rs
//
// Image-stage steps: cropping, resizing, flipping, affine warps.
use anyhow::Result;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImage, GenericImageView, Luma, Rgb};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use rand::Rng;

use super::{Pixels, SampleRng, Stage, Transform};

/// Blank canvas with the same pixel layout as `like`.
pub(crate) fn blank_like(like: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    match like.color() {
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => DynamicImage::new_luma8(width, height),
        _ => DynamicImage::new_rgb8(width, height),
    }
}

/// Warp an 8-bit gray or RGB image, filling uncovered pixels with `fill`.
pub(crate) fn warp_image(
    img: &DynamicImage,
    projection: &Projection,
    interpolation: Interpolation,
    fill: u8,
) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(gray) => {
            DynamicImage::ImageLuma8(warp(gray, projection, interpolation, Luma([fill])))
        }
        other => DynamicImage::ImageRgb8(warp(&other.to_rgb8(), projection, interpolation, Rgb([fill; 3]))),
    }
}

/// Zero-pad by `padding` on every side, then cut a random `size × size` window.
#[derive(Debug, Clone)]
pub struct RandomCrop {
    pub size: u32,
    pub padding: u32,
}

impl RandomCrop {
    pub fn new(size: u32, padding: u32) -> Self {
        Self { size, padding }
    }
}

impl Transform for RandomCrop {
    fn name(&self) -> &'static str {
        "RandomCrop"
    }

    fn input_stage(&self) -> Stage {
        Stage::Image
    }

    fn apply(&self, input: Pixels, rng: &mut SampleRng) -> Result<Pixels> {
        let img = input.into_image(self.name())?;
        let padded = if self.padding > 0 {
            let (w, h) = img.dimensions();
            let mut canvas = blank_like(&img, w + 2 * self.padding, h + 2 * self.padding);
            canvas.copy_from(&img, self.padding, self.padding)?;
            canvas
        } else {
            img
        };

        let (w, h) = padded.dimensions();
        if w < self.size || h < self.size {
            anyhow::bail!(
                "RandomCrop of {}x{} does not fit a padded {}x{} image",
                self.size,
                self.size,
                w,
                h
            );
        }
        let x = rng.random_range(0..=w - self.size);
        let y = rng.random_range(0..=h - self.size);
        Ok(Pixels::Image(padded.crop_imm(x, y, self.size, self.size)))
    }
}

/// Resize to an exact size with bilinear filtering.
#[derive(Debug, Clone)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

impl Resize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Transform for Resize {
    fn name(&self) -> &'static str {
        "Resize"
    }

    fn input_stage(&self) -> Stage {
        Stage::Image
    }

    fn apply(&self, input: Pixels, _rng: &mut SampleRng) -> Result<Pixels> {
        let img = input.into_image(self.name())?;
        if img.dimensions() == (self.width, self.height) {
            return Ok(Pixels::Image(img));
        }
        Ok(Pixels::Image(img.resize_exact(self.width, self.height, FilterType::Triangle)))
    }
}

#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    p: f64,
}

impl RandomHorizontalFlip {
    pub fn new(p: f64) -> Self {
        Self { p: p.clamp(0.0, 1.0) }
    }
}

impl Default for RandomHorizontalFlip {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl Transform for RandomHorizontalFlip {
    fn name(&self) -> &'static str {
        "RandomHorizontalFlip"
    }

    fn input_stage(&self) -> Stage {
        Stage::Image
    }

    fn apply(&self, input: Pixels, rng: &mut SampleRng) -> Result<Pixels> {
        let img = input.into_image(self.name())?;
        if rng.random_bool(self.p) {
            Ok(Pixels::Image(img.fliph()))
        } else {
            Ok(Pixels::Image(img))
        }
    }
}

/// Random rotation within `±degrees` combined with a random isotropic
/// scale, both about the image centre. Uncovered pixels become black.
#[derive(Debug, Clone)]
pub struct RandomAffine {
    degrees: (f32, f32),
    scale: (f32, f32),
}

impl RandomAffine {
    pub fn new(degrees: (f32, f32), scale: (f32, f32)) -> Result<Self> {
        if degrees.0 > degrees.1 {
            anyhow::bail!("RandomAffine degrees range {:?} is inverted", degrees);
        }
        if scale.0 <= 0.0 || scale.0 > scale.1 {
            anyhow::bail!("RandomAffine scale range {:?} must be positive and ordered", scale);
        }
        Ok(Self { degrees, scale })
    }

    fn projection(&self, width: u32, height: u32, rng: &mut SampleRng) -> Projection {
        let angle = rng.random_range(self.degrees.0..=self.degrees.1);
        let scale = rng.random_range(self.scale.0..=self.scale.1);
        let (cx, cy) = (width as f32 * 0.5, height as f32 * 0.5);
        Projection::translate(cx, cy)
            * Projection::rotate(angle.to_radians())
            * Projection::scale(scale, scale)
            * Projection::translate(-cx, -cy)
    }
}

impl Transform for RandomAffine {
    fn name(&self) -> &'static str {
        "RandomAffine"
    }

    fn input_stage(&self) -> Stage {
        Stage::Image
    }

    fn apply(&self, input: Pixels, rng: &mut SampleRng) -> Result<Pixels> {
        let img = input.into_image(self.name())?;
        let (w, h) = img.dimensions();
        let projection = self.projection(w, h, rng);
        Ok(Pixels::Image(warp_image(&img, &projection, Interpolation::Nearest, 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage};
    use rand::SeedableRng;

    fn rng() -> SampleRng {
        SampleRng::seed_from_u64(11)
    }

    fn image_of(pixels: Pixels) -> DynamicImage {
        pixels.into_image("test").unwrap()
    }

    #[test]
    fn random_crop_keeps_size_and_pads_with_zero() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([200, 200, 200])));
        let crop = RandomCrop::new(32, 4);
        let mut rng = rng();

        let mut saw_padding = false;
        for _ in 0..20 {
            let out = image_of(crop.apply(Pixels::Image(img.clone()), &mut rng).unwrap());
            assert_eq!(out.dimensions(), (32, 32));
            let rgb = out.to_rgb8();
            saw_padding |= rgb.pixels().any(|p| p.0 == [0, 0, 0]);
            assert!(rgb.pixels().all(|p| p.0 == [0, 0, 0] || p.0 == [200, 200, 200]));
        }
        assert!(saw_padding, "twenty crops never touched the padding");
    }

    #[test]
    fn random_crop_too_large_is_an_error() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(10, 10));
        assert!(RandomCrop::new(32, 4).apply(Pixels::Image(img), &mut rng()).is_err());
    }

    #[test]
    fn resize_is_exact() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 60));
        let out = image_of(Resize::new(32, 32).apply(Pixels::Image(img), &mut rng()).unwrap());
        assert_eq!(out.dimensions(), (32, 32));
    }

    #[test]
    fn flip_probability_bounds() {
        let mut img = GrayImage::new(2, 1);
        img.put_pixel(0, 0, Luma([9]));
        let img = DynamicImage::ImageLuma8(img);

        let always = image_of(RandomHorizontalFlip::new(1.0).apply(Pixels::Image(img.clone()), &mut rng()).unwrap());
        assert_eq!(always.to_luma8().get_pixel(1, 0)[0], 9);

        let never = image_of(RandomHorizontalFlip::new(0.0).apply(Pixels::Image(img), &mut rng()).unwrap());
        assert_eq!(never.to_luma8().get_pixel(0, 0)[0], 9);
    }

    #[test]
    fn affine_keeps_gray_images_gray() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(28, 28, Luma([100])));
        let affine = RandomAffine::new((-15.0, 15.0), (0.8, 1.2)).unwrap();
        let out = image_of(affine.apply(Pixels::Image(img), &mut rng()).unwrap());
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
        assert_eq!(out.dimensions(), (28, 28));
    }

    #[test]
    fn affine_rejects_bad_ranges() {
        assert!(RandomAffine::new((15.0, -15.0), (0.8, 1.2)).is_err());
        assert!(RandomAffine::new((-15.0, 15.0), (0.0, 1.2)).is_err());
    }
}
