// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DocscanError, Result};

/// Persistent application settings.
///
/// Every section is `#[serde(default)]`, so a config file only needs the keys
/// it wants to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where exported PDFs and images go when no explicit path is given.
    pub output_dir: PathBuf,
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub ocr: OcrSettings,
    pub pdf: PdfSettings,
    /// JPEG quality (1-100) used when saving images.
    pub jpeg_quality: u8,
}

/// Webcam defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Edge-detection tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Side of the (odd) Gaussian kernel used before Canny.
    pub blur_kernel: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Side of the square dilation kernel (3 = one pixel in every direction).
    pub dilate_kernel: u32,
    pub dilate_iterations: u32,
    /// Detected quads smaller than this fraction of the image are ignored.
    pub min_area_ratio: f32,
}

/// OCR settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Directory holding `text-detection.rten` / `text-recognition.rten`.
    /// `None` uses the ocrs cache directory.
    pub model_dir: Option<PathBuf>,
    /// Informational only: the bundled recognition model is Latin-script.
    pub language: String,
}

/// PDF export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfSettings {
    pub paper_size: crate::PaperSize,
    /// Page margin in inches.
    pub margin_in: f32,
    /// Longest image side (pixels) embedded in the PDF.
    pub max_image_dimension: u32,
    /// JPEG quality (1-100) for colour images embedded in PDFs. Greyscale
    /// pages are always stored losslessly.
    pub quality: u8,
    pub metadata: crate::PdfMetadata,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            camera: CameraConfig::default(),
            detection: DetectionConfig::default(),
            ocr: OcrSettings::default(),
            pdf: PdfSettings::default(),
            jpeg_quality: 95,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            canny_low: 50.0,
            canny_high: 150.0,
            dilate_kernel: 3,
            dilate_iterations: 1,
            min_area_ratio: 0.10,
        }
    }
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            model_dir: None,
            language: "spa".into(),
        }
    }
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            paper_size: crate::PaperSize::A4,
            margin_in: 0.5,
            max_image_dimension: 2480,
            quality: 95,
            metadata: crate::PdfMetadata::default(),
        }
    }
}

impl PdfSettings {
    /// Page margin in millimetres.
    pub fn margin_mm(&self) -> f32 {
        self.margin_in * 25.4
    }
}

impl AppConfig {
    /// Read and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        debug!(path = %path.as_ref().display(), "Configuration loaded");
        Ok(config)
    }

    /// Read a config file, falling back to defaults when it is missing or
    /// invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Ignoring unreadable config; using defaults");
                Self::default()
            }
        }
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.detection.blur_kernel == 0 || self.detection.blur_kernel % 2 == 0 {
            return Err(DocscanError::Config(format!(
                "detection.blur_kernel must be odd and positive, got {}",
                self.detection.blur_kernel
            )));
        }
        if self.detection.canny_low > self.detection.canny_high {
            return Err(DocscanError::Config(format!(
                "detection.canny_low ({}) exceeds canny_high ({})",
                self.detection.canny_low, self.detection.canny_high
            )));
        }
        if !(0.0..1.0).contains(&self.detection.min_area_ratio) {
            return Err(DocscanError::Config(format!(
                "detection.min_area_ratio must be in [0, 1), got {}",
                self.detection.min_area_ratio
            )));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(DocscanError::Config(format!(
                "jpeg_quality must be 1-100, got {}",
                self.jpeg_quality
            )));
        }
        if self.pdf.quality == 0 || self.pdf.quality > 100 {
            return Err(DocscanError::Config(format!(
                "pdf.quality must be 1-100, got {}",
                self.pdf.quality
            )));
        }
        if self.pdf.margin_in < 0.0 {
            return Err(DocscanError::Config("pdf.margin_in must not be negative".into()));
        }
        if self.pdf.max_image_dimension == 0 {
            return Err(DocscanError::Config(
                "pdf.max_image_dimension must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "jpeg_quality": 80, "camera": { "index": 2 } }"#).unwrap();
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.camera.index, 2);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.pdf.max_image_dimension, 2480);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.pdf.paper_size = crate::PaperSize::Letter;
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn even_blur_kernel_is_rejected() {
        let mut config = AppConfig::default();
        config.detection.blur_kernel = 4;
        assert!(matches!(config.validate(), Err(DocscanError::Config(_))));
    }

    #[test]
    fn pdf_quality_must_be_positive() {
        let mut config = AppConfig::default();
        config.pdf.quality = 0;
        assert!(matches!(config.validate(), Err(DocscanError::Config(_))));
    }

    #[test]
    fn legacy_temp_dir_key_is_ignored() {
        let config: AppConfig = serde_json::from_str(r#"{ "temp_dir": "temp" }"#).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn margin_converts_to_mm() {
        let settings = PdfSettings::default();
        assert!((settings.margin_mm() - 12.7).abs() < 1e-4);
    }
}
