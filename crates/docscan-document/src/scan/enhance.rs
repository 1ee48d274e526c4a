// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement pipeline: perspective correction, adaptive binarization,
// OCR preparation, live-preview and still-capture enhancement, and
// scan-to-PDF conversion.

use docscan_core::PaperSize;
use docscan_core::error::{DocscanError, Result};
use image::{ColorType, DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::{ThresholdType, equalize_histogram, otsu_level, threshold};
use imageproc::filter::{gaussian_blur_f32, laplacian_filter, median_filter};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, info, instrument, warn};

use crate::image::processor::ImageProcessor;
use crate::pdf::writer::PdfWriter;
use crate::scan::detect::{DetectionParams, Quad, find_document_quad};

/// Gaussian sigma matching an 11x11 adaptive-threshold block.
const ADAPTIVE_SIGMA: f32 = 2.0;
/// Offset subtracted from the local mean before thresholding.
const ADAPTIVE_C: i16 = 2;
/// Smallest side accepted by the OCR preparation step.
const OCR_MIN_SIDE: u32 = 300;
/// Smallest height accepted by the alternative OCR enhancement.
const OCR_MIN_HEIGHT: u32 = 500;

/// Result of automatic processing.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub image: DynamicImage,
    /// The document outline, when one was found and the image was warped.
    pub quad: Option<Quad>,
}

impl ProcessOutcome {
    pub fn edges_found(&self) -> bool {
        self.quad.is_some()
    }
}

/// Turns a photo of a page into a clean, flat scan.
///
/// Like [`ImageProcessor`], every step consumes `self` so calls chain:
///
/// ```ignore
/// let pdf = ScanEnhancer::open("photo.jpg", PaperSize::A4)?
///     .process_document()
///     .scan_to_pdf()?;
/// ```
pub struct ScanEnhancer {
    image: DynamicImage,
    /// Target paper size for [`ScanEnhancer::scan_to_pdf`].
    paper_size: PaperSize,
    params: DetectionParams,
}

impl ScanEnhancer {
    // -- Construction ---------------------------------------------------------

    /// Create an enhancer from raw image bytes (JPEG, PNG, TIFF, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8], paper_size: PaperSize) -> Result<Self> {
        let image = image::load_from_memory(data).map_err(|err| {
            DocscanError::ImageError(format!("failed to decode scan image: {}", err))
        })?;
        info!(
            width = image.width(),
            height = image.height(),
            "Scan image loaded"
        );
        Ok(Self::from_dynamic(image, paper_size))
    }

    /// Create an enhancer from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>, paper_size: PaperSize) -> Result<Self> {
        let image = image::open(path.as_ref()).map_err(|err| {
            DocscanError::ImageError(format!(
                "failed to open scan image {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        Ok(Self::from_dynamic(image, paper_size))
    }

    pub fn from_dynamic(image: DynamicImage, paper_size: PaperSize) -> Self {
        Self {
            image,
            paper_size,
            params: DetectionParams::default(),
        }
    }

    /// Override the edge-detection tuning.
    pub fn with_params(mut self, params: DetectionParams) -> Self {
        self.params = params;
        self
    }

    // -- Accessors ------------------------------------------------------------

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    fn with_image(self, image: DynamicImage) -> Self {
        Self { image, ..self }
    }

    // -- Automatic processing -------------------------------------------------

    /// Find the document outline in the current image.
    pub fn detect(&self) -> Option<Quad> {
        find_document_quad(&self.image, &self.params)
    }

    /// Flatten and clean up a photographed page.
    ///
    /// When a document outline is found the image is warped to it first;
    /// either way the result is binarized with [`ScanEnhancer::enhance_document`].
    #[instrument(skip(self), fields(width = self.image.width(), height = self.image.height()))]
    pub fn process(self) -> ProcessOutcome {
        let quad = self.detect();
        let enhancer = match &quad {
            Some(quad) => {
                info!(corners = ?quad.corners, "Document edges found; correcting perspective");
                self.correct_perspective(quad)
            }
            None => {
                info!("No document edges found; enhancing whole image");
                self
            }
        };
        ProcessOutcome {
            image: enhancer.enhance_document().into_dynamic(),
            quad,
        }
    }

    /// [`ScanEnhancer::process`] without the outcome details.
    pub fn process_document(self) -> Self {
        let paper_size = self.paper_size;
        let params = self.params;
        let outcome = self.process();
        Self {
            image: outcome.image,
            paper_size,
            params,
        }
    }

    // -- Perspective correction -----------------------------------------------

    /// Warp the quad to an upright rectangle of [`Quad::target_size`].
    ///
    /// Degenerate quads leave the image unchanged.
    #[instrument(skip(self))]
    pub fn correct_perspective(self, quad: &Quad) -> Self {
        let (out_w, out_h) = quad.target_size();
        if out_w < 2 || out_h < 2 {
            warn!(out_w, out_h, "Quad too small to warp; returning unchanged");
            return self;
        }

        let (right, bottom) = ((out_w - 1) as f32, (out_h - 1) as f32);
        let dest = [(0.0, 0.0), (right, 0.0), (right, bottom), (0.0, bottom)];
        let Some(projection) = Projection::from_control_points(quad.corners, dest) else {
            warn!("Failed to compute projective transform; returning unchanged");
            return self;
        };

        let warped = match self.image.color() {
            ColorType::L8 | ColorType::La8 => {
                let mut out = GrayImage::new(out_w, out_h);
                warp_into(
                    &self.image.to_luma8(),
                    &projection,
                    Interpolation::Bilinear,
                    Luma([255u8]),
                    &mut out,
                );
                DynamicImage::ImageLuma8(out)
            }
            _ => {
                let mut out = RgbImage::new(out_w, out_h);
                warp_into(
                    &self.image.to_rgb8(),
                    &projection,
                    Interpolation::Bilinear,
                    Rgb([255u8, 255, 255]),
                    &mut out,
                );
                DynamicImage::ImageRgb8(out)
            }
        };

        info!(out_w, out_h, "Perspective correction applied");
        self.with_image(warped)
    }

    // -- Binarization ---------------------------------------------------------

    /// Gaussian adaptive threshold (11x11 block, C = 2) followed by a 3x3
    /// median to remove speckle. Colour inputs come back as RGB.
    #[instrument(skip(self))]
    pub fn enhance_document(self) -> Self {
        let was_gray = is_gray(&self.image);
        let binary = adaptive_threshold(&self.image.to_luma8());
        let denoised = median_filter(&binary, 1, 1);
        debug!("Document enhancement complete");

        let image = if was_gray {
            DynamicImage::ImageLuma8(denoised)
        } else {
            DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(denoised).to_rgb8())
        };
        self.with_image(image)
    }

    /// Global binarization at the Otsu threshold.
    #[instrument(skip(self))]
    pub fn binarize_otsu(self) -> Self {
        let image = DynamicImage::ImageLuma8(otsu_binarize(&self.image.to_luma8()));
        self.with_image(image)
    }

    // -- OCR preparation ------------------------------------------------------

    /// Greyscale, upscale so both sides are at least 300 px, Otsu threshold,
    /// then a 3x3 median. Used before every text recognition pass.
    #[instrument(skip(self))]
    pub fn prepare_for_ocr(self) -> Self {
        let paper_size = self.paper_size;
        let params = self.params;
        let scaled = ImageProcessor::from_dynamic(self.image)
            .grayscale()
            .upscale_to_min(OCR_MIN_SIDE)
            .into_dynamic();

        let binary = otsu_binarize(&scaled.to_luma8());
        Self {
            image: DynamicImage::ImageLuma8(median_filter(&binary, 1, 1)),
            paper_size,
            params,
        }
    }

    /// Alternative OCR clean-up: greyscale, upscale to at least 500 px tall,
    /// adaptive threshold.
    #[instrument(skip(self))]
    pub fn enhance_for_ocr(self) -> Self {
        let paper_size = self.paper_size;
        let params = self.params;
        let scaled = ImageProcessor::from_dynamic(self.image)
            .grayscale()
            .upscale_to_height(OCR_MIN_HEIGHT)
            .into_dynamic();
        Self {
            image: DynamicImage::ImageLuma8(adaptive_threshold(&scaled.to_luma8())),
            paper_size,
            params,
        }
    }

    // -- Camera frames --------------------------------------------------------

    /// Live-preview enhancement: 3x3 sharpen, then histogram equalization of
    /// the luminance with colour kept.
    pub fn enhance_frame(self) -> Self {
        let sharpened = sharpen(&self.image.to_rgb8());
        let image = DynamicImage::ImageRgb8(equalize_luminance(&sharpened));
        self.with_image(image)
    }

    /// Still-capture enhancement: light blur, adaptive threshold, RGB out.
    #[instrument(skip(self))]
    pub fn enhance_capture(self) -> Self {
        let blurred = gaussian_blur_f32(&self.image.to_luma8(), self.params.blur_sigma());
        let binary = adaptive_threshold(&blurred);
        let image = DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(binary).to_rgb8());
        self.with_image(image)
    }

    // -- Scan to PDF ----------------------------------------------------------

    /// Single-page PDF of the current image, fitted to the paper size.
    #[instrument(skip(self))]
    pub fn scan_to_pdf(&self) -> Result<Vec<u8>> {
        info!(paper = %self.paper_size, "Converting scan to PDF");
        let writer = PdfWriter::new(self.paper_size);
        let bytes = writer.create_from_images(std::slice::from_ref(&self.image))?;
        debug!(pdf_bytes = bytes.len(), "Scan-to-PDF complete");
        Ok(bytes)
    }
}

// -- Pixel helpers ------------------------------------------------------------

fn is_gray(image: &DynamicImage) -> bool {
    matches!(
        image.color(),
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16
    )
}

/// White where the pixel is brighter than the Gaussian-weighted local mean
/// minus [`ADAPTIVE_C`], black elsewhere.
fn adaptive_threshold(gray: &GrayImage) -> GrayImage {
    let local_mean = gaussian_blur_f32(gray, ADAPTIVE_SIGMA);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y).0[0] as i16;
        let mean = local_mean.get_pixel(x, y).0[0] as i16;
        if value > mean - ADAPTIVE_C {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Otsu binarization; pixels at or below the level become black.
fn otsu_binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    debug!(level, "Otsu level computed");
    threshold(gray, level, ThresholdType::Binary)
}

/// Variance of the 4-neighbour Laplacian response. Higher means sharper;
/// used to pick the best of several captured frames.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }

    let response = laplacian_filter(gray);
    let (sum, sum_sq) = response.pixels().fold((0.0f64, 0.0f64), |(sum, sum_sq), p| {
        let value = p.0[0] as f64;
        (sum + value, sum_sq + value * value)
    });

    let n = (w as f64) * (h as f64);
    let mean = sum / n;
    sum_sq / n - mean * mean
}

/// Kernel `[-1 -1 -1; -1 9 -1; -1 -1 -1]`, edges clamped.
fn sharpen(image: &RgbImage) -> RgbImage {
    let (w, h) = image.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let mut out = [0u8; 3];
        for (channel, slot) in out.iter_mut().enumerate() {
            let mut acc = 0i32;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
                    let sy = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
                    let weight = if dx == 0 && dy == 0 { 9 } else { -1 };
                    acc += weight * image.get_pixel(sx, sy).0[channel] as i32;
                }
            }
            *slot = acc.clamp(0, 255) as u8;
        }
        Rgb(out)
    })
}

/// Equalize the luminance histogram and shift each channel by the change in
/// luminance, so hue is roughly kept.
fn equalize_luminance(image: &RgbImage) -> RgbImage {
    let luma = DynamicImage::ImageRgb8(image.clone()).to_luma8();
    let equalized = equalize_histogram(&luma);
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let delta = equalized.get_pixel(x, y).0[0] as i16 - luma.get_pixel(x, y).0[0] as i16;
        let Rgb(channels) = *image.get_pixel(x, y);
        Rgb(channels.map(|c| (c as i16 + delta).clamp(0, 255) as u8))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn page_on_desk() -> DynamicImage {
        let img = RgbImage::from_fn(400, 500, |x, y| {
            if (50..350).contains(&x) && (60..440).contains(&y) {
                Rgb([240u8, 238, 230])
            } else {
                Rgb([30u8, 30, 35])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    fn is_binary(image: &DynamicImage) -> bool {
        image.to_luma8().pixels().all(|p| p.0[0] == 0 || p.0[0] == 255)
    }

    #[test]
    fn process_flattens_a_detected_page() {
        let outcome = ScanEnhancer::from_dynamic(page_on_desk(), PaperSize::A4).process();
        assert!(outcome.edges_found());

        // Cropped to roughly the 300x380 page.
        let (w, h) = (outcome.image.width(), outcome.image.height());
        assert!((290..=312).contains(&w), "width {w}");
        assert!((370..=392).contains(&h), "height {h}");
        assert_eq!(outcome.image.color(), ColorType::Rgb8);
        assert!(is_binary(&outcome.image));
    }

    #[test]
    fn process_without_edges_keeps_size() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 300, Luma([200u8])));
        let outcome = ScanEnhancer::from_dynamic(img, PaperSize::A4).process();
        assert!(!outcome.edges_found());
        assert_eq!((outcome.image.width(), outcome.image.height()), (200, 300));
        // Flat paper thresholds to white and stays greyscale.
        assert_eq!(outcome.image.color(), ColorType::L8);
        assert!(outcome.image.to_luma8().pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn perspective_correction_uses_quad_size() {
        let quad = Quad::from_points([(10.0, 10.0), (110.0, 10.0), (110.0, 60.0), (10.0, 60.0)]);
        let out = ScanEnhancer::from_dynamic(page_on_desk(), PaperSize::A4)
            .correct_perspective(&quad)
            .into_dynamic();
        assert_eq!((out.width(), out.height()), (100, 50));
    }

    #[test]
    fn degenerate_quad_is_ignored() {
        let quad = Quad::from_points([(5.0, 5.0); 4]);
        let out = ScanEnhancer::from_dynamic(page_on_desk(), PaperSize::A4)
            .correct_perspective(&quad)
            .into_dynamic();
        assert_eq!((out.width(), out.height()), (400, 500));
    }

    #[test]
    fn dark_text_survives_adaptive_threshold() {
        let mut img = GrayImage::from_pixel(60, 60, Luma([220u8]));
        for y in 25..35 {
            for x in 10..50 {
                img.put_pixel(x, y, Luma([20u8]));
            }
        }
        let out = ScanEnhancer::from_dynamic(DynamicImage::ImageLuma8(img), PaperSize::A4)
            .enhance_document()
            .into_dynamic()
            .to_luma8();
        assert_eq!(out.get_pixel(30, 26).0[0], 0);
        assert_eq!(out.get_pixel(5, 5).0[0], 255);
    }

    #[test]
    fn otsu_splits_two_levels() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([40u8]));
        for x in 0..10 {
            for y in 0..5 {
                img.put_pixel(x, y, Luma([200u8]));
            }
        }
        let level = otsu_level(&img);
        assert!((40..200).contains(&level));

        let out = ScanEnhancer::from_dynamic(DynamicImage::ImageLuma8(img), PaperSize::A4)
            .binarize_otsu()
            .into_dynamic()
            .to_luma8();
        assert_eq!(out.get_pixel(0, 0).0[0], 255);
        assert_eq!(out.get_pixel(0, 9).0[0], 0);
    }

    #[test]
    fn ink_at_the_otsu_level_stays_black() {
        // Two levels only: Otsu lands exactly on the ink value.
        let mut img = GrayImage::from_pixel(20, 20, Luma([250u8]));
        for x in 5..15 {
            img.put_pixel(x, 10, Luma([10u8]));
        }
        assert_eq!(otsu_level(&img), 10);

        let out = ScanEnhancer::from_dynamic(DynamicImage::ImageLuma8(img), PaperSize::A4)
            .binarize_otsu()
            .into_dynamic()
            .to_luma8();
        assert_eq!(out.get_pixel(7, 10).0[0], 0);
        assert_eq!(out.get_pixel(7, 2).0[0], 255);
    }

    #[test]
    fn ocr_preparation_upscales_small_images() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 50, Luma([180u8])));
        let out = ScanEnhancer::from_dynamic(img, PaperSize::A4)
            .prepare_for_ocr()
            .into_dynamic();
        assert!(out.width() >= 300 && out.height() >= 300);
        assert!(is_binary(&out));
    }

    #[test]
    fn ocr_enhancement_reaches_min_height() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 100, Luma([180u8])));
        let out = ScanEnhancer::from_dynamic(img, PaperSize::A4)
            .enhance_for_ocr()
            .into_dynamic();
        assert_eq!((out.width(), out.height()), (1000, 500));
    }

    #[test]
    fn capture_enhancement_is_binary_rgb() {
        let out = ScanEnhancer::from_dynamic(page_on_desk(), PaperSize::A4)
            .enhance_capture()
            .into_dynamic();
        assert_eq!(out.color(), ColorType::Rgb8);
        assert!(is_binary(&out));
    }

    #[test]
    fn frame_enhancement_keeps_size() {
        let out = ScanEnhancer::from_dynamic(page_on_desk(), PaperSize::A4)
            .enhance_frame()
            .into_dynamic();
        assert_eq!((out.width(), out.height()), (400, 500));
    }

    #[test]
    fn laplacian_variance_ranks_sharpness() {
        let flat = GrayImage::from_pixel(20, 20, Luma([128u8]));
        let checker = GrayImage::from_fn(20, 20, |x, y| {
            if (x + y) % 2 == 0 { Luma([0u8]) } else { Luma([255u8]) }
        });
        let blurred = gaussian_blur_f32(&checker, 2.0);

        assert_eq!(laplacian_variance(&flat), 0.0);
        assert!(laplacian_variance(&checker) > laplacian_variance(&blurred));
    }

    #[test]
    fn scan_to_pdf_produces_a_pdf() {
        let pdf = ScanEnhancer::from_dynamic(page_on_desk(), PaperSize::Letter)
            .scan_to_pdf()
            .unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }
}
