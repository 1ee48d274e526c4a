// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Severity drives how the front end presents the problem and whether a retry
// makes sense.

use crate::error::DocscanError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Worth trying again as-is (camera busy, blurry capture).
    Transient,
    /// User must do something first (select a page, connect a camera).
    ActionRequired,
    /// Retrying will not help (corrupt file, unsupported format).
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: &str, suggestion: impl Into<String>, retriable: bool, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable,
            severity,
        }
    }
}

impl std::fmt::Display for HumanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.message, self.suggestion)
    }
}

/// Convert a `DocscanError` into a `HumanError`.
pub fn humanize_error(err: &DocscanError) -> HumanError {
    use Severity::*;

    match err {
        // -- Capture --
        DocscanError::CameraUnavailable(detail) => {
            if detail.contains("busy") || detail.contains("in use") {
                HumanError::new(
                    "The camera is being used by another program.",
                    "Close any other app that uses the camera (video calls, photo booths), then try again.",
                    true,
                    Transient,
                )
            } else {
                HumanError::new(
                    "We couldn't access the camera.",
                    "Check that a webcam is connected and that this program is allowed to use it.",
                    true,
                    ActionRequired,
                )
            }
        }

        DocscanError::CaptureFailed(_) => HumanError::new(
            "The camera stopped sending pictures.",
            "Try again. If this keeps happening, unplug the camera and plug it back in.",
            true,
            Transient,
        ),

        DocscanError::PlatformUnavailable => HumanError::new(
            "Camera capture isn't available in this build.",
            "Load an image file instead, or rebuild with the `webcam` feature.",
            false,
            Permanent,
        ),

        // -- Images --
        DocscanError::UnsupportedImageFormat(detail) => HumanError::new(
            "This type of file can't be scanned.",
            format!("Use a JPEG, PNG, BMP or TIFF image. (File: {detail})"),
            false,
            Permanent,
        ),

        DocscanError::ImageError(_) => HumanError::new(
            "There's a problem with this image.",
            "The image may be damaged or in an unusual format. Try saving it as a JPEG or PNG first.",
            false,
            Permanent,
        ),

        DocscanError::DetectionFailed => HumanError::new(
            "We couldn't find the edges of the document.",
            "Put the page on a dark, plain surface so all four corners are visible, then try again.",
            true,
            Transient,
        ),

        // -- OCR --
        DocscanError::OcrError(detail) => {
            if detail.contains("model not found") {
                HumanError::new(
                    "The text recognition models are missing.",
                    "Run `ocrs` once to download them, or set `ocr.model_dir` in the config file.",
                    false,
                    ActionRequired,
                )
            } else {
                HumanError::new(
                    "Text recognition didn't work on this scan.",
                    "Try scanning the document again with better lighting, making sure the text is clear and in focus.",
                    true,
                    Transient,
                )
            }
        }

        DocscanError::OcrUnavailable => HumanError::new(
            "Text recognition isn't included in this build.",
            "Rebuild with the `ocr` feature enabled.",
            false,
            Permanent,
        ),

        // -- PDF --
        DocscanError::PdfError(_) => HumanError::new(
            "There's a problem with this PDF file.",
            "The file may be damaged. Try opening it in a PDF viewer first to check it works.",
            false,
            Permanent,
        ),

        DocscanError::EmptyDocument => HumanError::new(
            "There are no pages to put in the PDF.",
            "Add at least one page, then export again.",
            false,
            ActionRequired,
        ),

        // -- Session --
        DocscanError::PageIndex { index, len } => HumanError::new(
            "That page doesn't exist.",
            format!("Choose a page between 1 and {len}. (Asked for page {})", index + 1),
            false,
            ActionRequired,
        ),

        DocscanError::NoPageSelected => HumanError::new(
            "No page is selected.",
            "Select a page from the list first.",
            false,
            ActionRequired,
        ),

        DocscanError::NothingToApply => HumanError::new(
            "There are no changes to save.",
            "Process or adjust the image first.",
            false,
            ActionRequired,
        ),

        DocscanError::NoImage => HumanError::new(
            "There's no image to work with.",
            "Load an image file or capture one from the camera first.",
            false,
            ActionRequired,
        ),

        // -- Config / storage --
        DocscanError::Config(detail) => HumanError::new(
            "The settings file has a mistake in it.",
            format!("Fix or delete the config file to go back to the defaults. ({detail})"),
            false,
            ActionRequired,
        ),

        DocscanError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError::new(
                "The file couldn't be found.",
                "It may have been moved or deleted. Check the path and try again.",
                false,
                ActionRequired,
            ),
            std::io::ErrorKind::PermissionDenied => HumanError::new(
                "This program doesn't have permission to use that file.",
                "Check the file permissions, or choose a different location.",
                false,
                ActionRequired,
            ),
            _ => HumanError::new(
                "There was a problem reading or writing a file.",
                "Try again. If this keeps happening, your disk may be full.",
                true,
                Transient,
            ),
        },

        DocscanError::Serialization(_) => HumanError::new(
            "A settings file couldn't be read.",
            "The file may be damaged. Delete it to go back to the defaults.",
            false,
            Permanent,
        ),
    }
}
