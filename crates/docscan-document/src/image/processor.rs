// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: scaling, rotation, grayscale, and the brightness /
// contrast / sharpness enhancement factors used by the manual adjustment
// controls. Operates on in-memory images using the `image` and `imageproc`
// crates.

use std::path::Path;

use docscan_core::Adjustments;
use docscan_core::error::DocscanError;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::geometric_transformations::{self, Interpolation};
use tracing::{debug, info, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// All operations are non-destructive: each method consumes `self` and returns a
/// new `ImageProcessor` wrapping the transformed image, enabling method chaining.
///
/// ```ignore
/// let result = ImageProcessor::open("page.jpg")?
///     .rotate(90.0)
///     .brightness(1.2)
///     .contrast(1.4)
///     .sharpness(2.0)
///     .to_png_bytes()?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocscanError> {
        let img = image::open(path.as_ref()).map_err(|err| {
            DocscanError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, DocscanError> {
        let img = image::load_from_memory(data).map_err(|err| {
            DocscanError::ImageError(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Geometry -------------------------------------------------------------

    /// Resize to fit inside `max_width` x `max_height`, preserving aspect
    /// ratio.
    #[instrument(skip(self), fields(max_width, max_height))]
    pub fn resize(self, max_width: u32, max_height: u32) -> Self {
        debug!(
            from_w = self.image.width(),
            from_h = self.image.height(),
            max_width,
            max_height,
            "Resizing image"
        );
        Self {
            image: self.image.resize(max_width, max_height, FilterType::Lanczos3),
        }
    }

    /// Crop to the rectangle at (`x`, `y`) of size `width` x `height`.
    /// The rectangle is clipped to the image bounds.
    pub fn crop(self, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            image: self.image.crop_imm(x, y, width, height),
        }
    }

    /// Downscale so that the longest side is at most `max_dimension` pixels,
    /// preserving aspect ratio. Images already small enough are untouched.
    #[instrument(skip(self), fields(max_dimension))]
    pub fn fit_within(self, max_dimension: u32) -> Self {
        let (w, h) = (self.image.width(), self.image.height());
        let longest = w.max(h);
        if longest <= max_dimension || max_dimension == 0 {
            return self;
        }

        let (new_w, new_h) = if w >= h {
            let new_h = (h as f64 * max_dimension as f64 / w as f64) as u32;
            (max_dimension, new_h.max(1))
        } else {
            let new_w = (w as f64 * max_dimension as f64 / h as f64) as u32;
            (new_w.max(1), max_dimension)
        };

        debug!(from_w = w, from_h = h, new_w, new_h, "Downscaling to fit");
        Self {
            image: self.image.resize_exact(new_w, new_h, FilterType::Lanczos3),
        }
    }

    /// Upscale so that both sides are at least `min_side` pixels. No-op when
    /// the image is already large enough.
    pub fn upscale_to_min(self, min_side: u32) -> Self {
        let (w, h) = (self.image.width(), self.image.height());
        if w == 0 || h == 0 || (w >= min_side && h >= min_side) {
            return self;
        }
        let scale = (min_side as f64 / h as f64).max(min_side as f64 / w as f64);
        self.scale(scale)
    }

    /// Upscale so that the height is at least `min_height` pixels.
    pub fn upscale_to_height(self, min_height: u32) -> Self {
        let h = self.image.height();
        if h == 0 || h >= min_height {
            return self;
        }
        self.scale(min_height as f64 / h as f64)
    }

    /// Uniform cubic rescale by `factor`.
    fn scale(self, factor: f64) -> Self {
        let new_w = ((self.image.width() as f64 * factor) as u32).max(1);
        let new_h = ((self.image.height() as f64 * factor) as u32).max(1);
        debug!(factor, new_w, new_h, "Rescaling image");
        Self {
            image: self
                .image
                .resize_exact(new_w, new_h, FilterType::CatmullRom),
        }
    }

    /// Rotate the image by an arbitrary angle in degrees (clockwise).
    ///
    /// For 90/180/270 degree rotations, lossless rotation is used. For other
    /// angles, imageproc's rotation with bilinear interpolation is applied on
    /// a white background.
    #[instrument(skip(self), fields(degrees))]
    pub fn rotate(self, degrees: f32) -> Self {
        info!(degrees, "Rotating image");

        let normalised = degrees.rem_euclid(360.0);
        if (normalised - 90.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate90(),
            };
        }
        if (normalised - 180.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate180(),
            };
        }
        if (normalised - 270.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate270(),
            };
        }
        if normalised.abs() < 0.01 || (normalised - 360.0).abs() < 0.01 {
            return self;
        }

        let rgba = self.image.to_rgba8();
        let rotated: RgbaImage = geometric_transformations::rotate_about_center(
            &rgba,
            degrees.to_radians(),
            Interpolation::Bilinear,
            Rgba([255u8, 255, 255, 255]),
        );

        Self {
            image: DynamicImage::ImageRgba8(rotated),
        }
    }

    /// Convert the image to grayscale (luma).
    #[instrument(skip(self))]
    pub fn grayscale(self) -> Self {
        debug!("Converting to grayscale");
        Self {
            image: self.image.grayscale(),
        }
    }

    // -- Enhancement factors --------------------------------------------------
    //
    // Each factor interpolates between a "degenerate" image and the original:
    // `out = degenerate + factor * (original - degenerate)`. A factor of 1.0
    // returns the original, 0.0 returns the degenerate image, and values above
    // 1.0 extrapolate away from it.

    /// Brightness factor. The degenerate image is black.
    #[instrument(skip(self), fields(factor))]
    pub fn brightness(self, factor: f32) -> Self {
        debug!(factor, "Adjusting brightness");
        self.blend_with(factor, |_, _, _| 0.0)
    }

    /// Contrast factor. The degenerate image is flat grey at the mean
    /// luminance of the original.
    #[instrument(skip(self), fields(factor))]
    pub fn contrast(self, factor: f32) -> Self {
        let mean = mean_luminance(&self.image);
        debug!(factor, mean, "Adjusting contrast");
        self.blend_with(factor, move |_, _, _| mean)
    }

    /// Sharpness factor. The degenerate image is a 3x3 smoothed copy (border
    /// pixels are left as-is).
    #[instrument(skip(self), fields(factor))]
    pub fn sharpness(self, factor: f32) -> Self {
        debug!(factor, "Adjusting sharpness");
        let smoothed = smooth_rgba(&self.image.to_rgba8());
        self.blend_with(factor, move |x, y, channel| {
            smoothed.get_pixel(x, y).0[channel] as f32
        })
    }

    /// Apply manual adjustments in order brightness → contrast → sharpness,
    /// skipping factors that are exactly 1.0.
    #[instrument(skip(self))]
    pub fn apply_adjustments(self, adjustments: &Adjustments) -> Self {
        info!(
            brightness = adjustments.brightness,
            contrast = adjustments.contrast,
            sharpness = adjustments.sharpness,
            "Applying adjustments"
        );

        let mut processor = self;
        if adjustments.brightness != 1.0 {
            processor = processor.brightness(adjustments.brightness);
        }
        if adjustments.contrast != 1.0 {
            processor = processor.contrast(adjustments.contrast);
        }
        if adjustments.sharpness != 1.0 {
            processor = processor.sharpness(adjustments.sharpness);
        }
        processor
    }

    /// Blend every colour channel with a degenerate value; alpha is kept.
    /// Greyscale inputs stay greyscale.
    fn blend_with<F>(self, factor: f32, degenerate: F) -> Self
    where
        F: Fn(u32, u32, usize) -> f32,
    {
        let was_gray = matches!(self.image.color(), ColorType::L8 | ColorType::La8);
        let rgba = self.image.to_rgba8();

        let blended = RgbaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let mix = |channel: usize, value: u8| -> u8 {
                let base = degenerate(x, y, channel);
                let out = base + factor * (value as f32 - base);
                out.round().clamp(0.0, 255.0) as u8
            };
            Rgba([mix(0, r), mix(1, g), mix(2, b), a])
        });

        let image = DynamicImage::ImageRgba8(blended);
        Self {
            image: if was_gray {
                DynamicImage::ImageLuma8(image.to_luma8())
            } else {
                image
            },
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, DocscanError> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| DocscanError::ImageError(format!("PNG encoding failed: {}", err)))?;
        Ok(buffer)
    }

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, DocscanError> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder).map_err(|err| {
            DocscanError::ImageError(format!("JPEG encoding failed: {}", err))
        })?;
        Ok(buffer)
    }

    /// Write the image to a file. The format is inferred from the file
    /// extension; JPEG output uses `jpeg_quality`.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>, jpeg_quality: u8) -> Result<(), DocscanError> {
        let path = path.as_ref();
        let format = ImageFormat::from_path(path).map_err(|_| {
            DocscanError::UnsupportedImageFormat(path.display().to_string())
        })?;

        if format == ImageFormat::Jpeg {
            let bytes = self.to_jpeg_bytes(jpeg_quality)?;
            std::fs::write(path, bytes)?;
        } else {
            self.image.save_with_format(path, format).map_err(|err| {
                DocscanError::ImageError(format!(
                    "failed to save image to {}: {}",
                    path.display(),
                    err
                ))
            })?;
        }
        info!("Saved image to {}", path.display());
        Ok(())
    }
}

/// Mean luminance (ITU-R 601-2 luma), rounded to the nearest integer.
fn mean_luminance(image: &DynamicImage) -> f32 {
    let luma = image.to_luma8();
    let count = luma.width() as u64 * luma.height() as u64;
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = luma.pixels().map(|p| p.0[0] as u64).sum();
    (sum as f64 / count as f64 + 0.5).floor() as f32
}

/// Smooth with the kernel `[1 1 1; 1 5 1; 1 1 1] / 13`. Border pixels are
/// copied unchanged.
fn smooth_rgba(source: &RgbaImage) -> RgbaImage {
    let (w, h) = source.dimensions();
    RgbaImage::from_fn(w, h, |x, y| {
        let pixel = *source.get_pixel(x, y);
        if x == 0 || y == 0 || x + 1 >= w || y + 1 >= h {
            return pixel;
        }
        let mut out = pixel;
        for channel in 0..3 {
            let mut sum = 0u32;
            for dy in 0..3 {
                for dx in 0..3 {
                    let weight = if dx == 1 && dy == 1 { 5 } else { 1 };
                    sum += weight * source.get_pixel(x + dx - 1, y + dy - 1).0[channel] as u32;
                }
            }
            out.0[channel] = ((sum as f32) / 13.0).round() as u8;
        }
        out
    })
}
