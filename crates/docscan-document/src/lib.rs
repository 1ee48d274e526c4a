// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pages, image processing, and output for the docscan
// document scanner.
//
// Provides the page/document model, image adjustments (brightness, contrast,
// sharpness), document edge detection and perspective correction, scan
// enhancement, optional OCR, and multi-page PDF generation.

pub mod document;
pub mod image;
pub mod pdf;
pub mod scan;

// Re-export the primary structs so callers can use `docscan_document::PdfWriter` etc.
pub use document::{Document, Page};
pub use image::processor::ImageProcessor;
pub use pdf::reader::{PdfInfo, PdfReader};
pub use pdf::writer::PdfWriter;
pub use scan::detect::{DetectionParams, Quad, Region};
pub use scan::enhance::{ProcessOutcome, ScanEnhancer};

#[cfg(feature = "ocr")]
pub use scan::ocr::OcrEngine;
