// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text recognition for scanned pages, backed by the pure-Rust `ocrs` engine
// running its neural network models through `rten`.
//
// Only compiled with the `ocr` feature:
//
// ```toml
// docscan-document = { workspace = true, features = ["ocr"] }
// ```
//
// The engine needs two model files, `text-detection.rten` and
// `text-recognition.rten`. Running the `ocrs` CLI once downloads them into
// `$XDG_CACHE_HOME/ocrs` (usually `~/.cache/ocrs`), which is where this module
// looks unless `ocr.model_dir` is set in the config file.

use std::path::{Path, PathBuf};

use docscan_core::PaperSize;
use docscan_core::config::OcrSettings;
use docscan_core::error::{DocscanError, Result};
use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams, OcrInput};
use rten::Model;
use tracing::{debug, info, instrument};

use crate::scan::enhance::ScanEnhancer;

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Where to load the OCR models from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl From<&OcrSettings> for OcrConfig {
    fn from(settings: &OcrSettings) -> Self {
        match &settings.model_dir {
            Some(dir) => Self::from_dir(dir),
            None => Self::default(),
        }
    }
}

impl OcrConfig {
    /// Both models inside `dir` under their standard file names.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    pub fn from_paths(
        detection_model: impl Into<PathBuf>,
        recognition_model: impl Into<PathBuf>,
    ) -> Self {
        Self {
            detection_model_path: detection_model.into(),
            recognition_model_path: recognition_model.into(),
        }
    }

    /// Both model files must exist.
    pub fn validate(&self) -> Result<()> {
        for (kind, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(DocscanError::OcrError(format!(
                    "{kind} model not found at {}; run the `ocrs` CLI once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// A recognised line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrTextLine {
    pub text: String,
}

impl std::fmt::Display for OcrTextLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Extracts text from page images.
///
/// Loading the models is the expensive part, so build one engine and reuse it
/// for every page. The `ocrs` and `rten` crates are built with `opt-level = 3`
/// even in dev profiles; unoptimised they are far too slow to be usable.
pub struct OcrEngine {
    engine: OcrsEngine,
}

impl OcrEngine {
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: OcrConfig) -> Result<Self> {
        config.validate()?;

        let load = |path: &Path, kind: &str| {
            info!(kind, "Loading OCR model");
            Model::load_file(path).map_err(|err| {
                DocscanError::OcrError(format!(
                    "failed to load {kind} model from {}: {err}",
                    path.display()
                ))
            })
        };
        let detection_model = load(&config.detection_model_path, "detection")?;
        let recognition_model = load(&config.recognition_model_path, "recognition")?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| DocscanError::OcrError(format!("failed to initialise OCR engine: {err}")))?;

        info!("OCR engine ready");
        Ok(Self { engine })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(OcrConfig::default())
    }

    pub fn from_model_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(OcrConfig::from_dir(dir))
    }

    pub fn from_settings(settings: &OcrSettings) -> Result<Self> {
        Self::new(OcrConfig::from(settings))
    }

    /// Recognise all text on a page.
    ///
    /// The image is cleaned up first (greyscale, upscaled to at least 300 px,
    /// Otsu threshold, median filter). Lines are joined with `\n` and the
    /// result is trimmed.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn recognize_text(&self, image: &DynamicImage) -> Result<String> {
        let input = self.prepare(image)?;
        let text = self
            .engine
            .get_text(&input)
            .map_err(|err| DocscanError::OcrError(format!("text recognition failed: {err}")))?;

        let text = text.trim().to_string();
        debug!(
            line_count = text.lines().count(),
            char_count = text.len(),
            "OCR recognition complete"
        );
        Ok(text)
    }

    /// Recognise text line by line, dropping blank lines.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn recognize_text_with_layout(&self, image: &DynamicImage) -> Result<Vec<OcrTextLine>> {
        let input = self.prepare(image)?;

        let word_rects = self
            .engine
            .detect_words(&input)
            .map_err(|err| DocscanError::OcrError(format!("word detection failed: {err}")))?;
        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        debug!(words = word_rects.len(), lines = line_rects.len(), "Text layout found");

        let lines = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|err| DocscanError::OcrError(format!("line recognition failed: {err}")))?;

        let results: Vec<OcrTextLine> = lines
            .iter()
            .flatten()
            .map(|line| line.to_string())
            .filter(|text| !text.trim().is_empty())
            .map(|text| OcrTextLine { text })
            .collect();

        info!(lines = results.len(), "Layout-aware OCR complete");
        Ok(results)
    }

    fn prepare(&self, image: &DynamicImage) -> Result<OcrInput> {
        let cleaned = ScanEnhancer::from_dynamic(image.clone(), PaperSize::A4)
            .prepare_for_ocr()
            .into_dynamic()
            .to_rgb8();
        let (width, height) = cleaned.dimensions();

        let source = ImageSource::from_bytes(cleaned.as_raw(), (width, height)).map_err(|err| {
            DocscanError::OcrError(format!(
                "failed to create image source ({width}x{height}): {err}"
            ))
        })?;
        self.engine
            .prepare_input(source)
            .map_err(|err| DocscanError::OcrError(format!("OCR preprocessing failed: {err}")))
    }
}

/// Whether both models exist in the default cache directory.
pub fn models_available() -> bool {
    let config = OcrConfig::default();
    config.detection_model_path.exists() && config.recognition_model_path.exists()
}

/// The default model directory, for diagnostics.
pub fn model_directory() -> PathBuf {
    default_model_dir()
}
