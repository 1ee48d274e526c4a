// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline: document edge detection, perspective correction,
// enhancement, and optical character recognition (OCR).

pub mod detect;
pub mod enhance;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use detect::{DetectionParams, Quad};
pub use enhance::ScanEnhancer;

#[cfg(feature = "ocr")]
pub use ocr::OcrEngine;
