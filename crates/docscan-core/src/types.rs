// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the docscan document scanner.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a scanned page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(pub Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Image file extensions accepted as scan input.
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif"];

/// Whether `ext` (without the dot, any case) is an accepted input image type.
pub fn is_supported_image_extension(ext: &str) -> bool {
    let lower = ext.to_ascii_lowercase();
    SUPPORTED_IMAGE_EXTENSIONS.contains(&lower.as_str())
}

/// Standard paper sizes for PDF export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    Letter,
    Legal,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }

    /// Parse a paper size name (`a4`, `letter`, `legal`), case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "a4" => Some(Self::A4),
            "letter" => Some(Self::Letter),
            "legal" => Some(Self::Legal),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaperSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A4 => f.write_str("A4"),
            Self::Letter => f.write_str("Letter"),
            Self::Legal => f.write_str("Legal"),
            Self::Custom {
                width_mm,
                height_mm,
            } => write!(f, "{width_mm}x{height_mm}mm"),
        }
    }
}

/// Manual image adjustment factors. `1.0` leaves the image unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustments {
    /// 0.0 is black; valid range 0.5..=2.0.
    pub brightness: f32,
    /// 0.0 is flat mid-grey; valid range 0.5..=2.0.
    pub contrast: f32,
    /// 0.0 is blurred; valid range 0.0..=3.0.
    pub sharpness: f32,
}

impl Adjustments {
    pub const BRIGHTNESS_RANGE: (f32, f32) = (0.5, 2.0);
    pub const CONTRAST_RANGE: (f32, f32) = (0.5, 2.0);
    pub const SHARPNESS_RANGE: (f32, f32) = (0.0, 3.0);

    pub fn new(brightness: f32, contrast: f32, sharpness: f32) -> Self {
        Self {
            brightness,
            contrast,
            sharpness,
        }
    }

    /// Clamp every factor into its valid range.
    pub fn clamped(self) -> Self {
        Self {
            brightness: self
                .brightness
                .clamp(Self::BRIGHTNESS_RANGE.0, Self::BRIGHTNESS_RANGE.1),
            contrast: self
                .contrast
                .clamp(Self::CONTRAST_RANGE.0, Self::CONTRAST_RANGE.1),
            sharpness: self
                .sharpness
                .clamp(Self::SHARPNESS_RANGE.0, Self::SHARPNESS_RANGE.1),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.brightness == 1.0 && self.contrast == 1.0 && self.sharpness == 1.0
    }
}

impl Default for Adjustments {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

/// Metadata written into the `/Info` dictionary of exported PDFs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub title: String,
    pub author: String,
    pub subject: String,
    pub creator: String,
    pub producer: String,
    pub keywords: Vec<String>,
}

impl Default for PdfMetadata {
    fn default() -> Self {
        Self {
            title: "Scanned Document".into(),
            author: "Document Scanner".into(),
            subject: "Digitized document".into(),
            creator: "docscan".into(),
            producer: "docscan PDF generator".into(),
            keywords: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjustments_clamp_into_slider_ranges() {
        let adj = Adjustments::new(5.0, 0.1, -1.0).clamped();
        assert_eq!(adj, Adjustments::new(2.0, 0.5, 0.0));
    }

    #[test]
    fn default_adjustments_are_identity() {
        assert!(Adjustments::default().is_identity());
        assert!(!Adjustments::new(1.0, 1.2, 1.0).is_identity());
    }

    #[test]
    fn image_extensions_are_case_insensitive() {
        assert!(is_supported_image_extension("JPG"));
        assert!(is_supported_image_extension("tif"));
        assert!(!is_supported_image_extension("gif"));
    }

    #[test]
    fn paper_size_names() {
        assert_eq!(PaperSize::from_name("Letter"), Some(PaperSize::Letter));
        assert_eq!(PaperSize::from_name("a5"), None);
        assert_eq!(PaperSize::Legal.dimensions_mm(), (216, 356));
    }
}
