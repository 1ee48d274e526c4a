// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for docscan.

use thiserror::Error;

/// Top-level error type for all docscan operations.
#[derive(Debug, Error)]
pub enum DocscanError {
    // -- Capture errors --
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("frame capture failed: {0}")]
    CaptureFailed(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    // -- Image errors --
    #[error("unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("document edges could not be detected")]
    DetectionFailed,

    // -- OCR errors --
    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("OCR support was not compiled in (enable the `ocr` feature)")]
    OcrUnavailable,

    // -- PDF errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("document has no pages")]
    EmptyDocument,

    // -- Session / document model --
    #[error("page index {index} out of range (document has {len} pages)")]
    PageIndex { index: usize, len: usize },

    #[error("no page selected")]
    NoPageSelected,

    #[error("no changes to apply")]
    NothingToApply,

    #[error("no image loaded")]
    NoImage,

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocscanError>;
