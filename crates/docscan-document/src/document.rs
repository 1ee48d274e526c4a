// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page and document model. A document is an ordered list of scanned pages that
// is exported as a single PDF.

use chrono::{DateTime, Local, Utc};
use docscan_core::PageId;
use docscan_core::error::{DocscanError, Result};
use image::DynamicImage;
use tracing::{debug, info};

/// One scanned image plus optional OCR text and a user label.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: PageId,
    pub name: String,
    pub image: DynamicImage,
    /// Text extracted by OCR, if it has been run for this image.
    pub text: Option<String>,
    /// Set on creation, duplication, and image replacement.
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn new(name: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            id: PageId::new(),
            name: name.into(),
            image,
            text: None,
            updated_at: Utc::now(),
        }
    }

    /// Local wall-clock time of the last change, `HH:MM:SS`.
    pub fn timestamp_label(&self) -> String {
        self.updated_at
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }
}

/// An ordered collection of pages.
///
/// Indices are 0-based; out-of-range indices yield
/// [`DocscanError::PageIndex`].
#[derive(Debug, Clone, Default)]
pub struct Document {
    pages: Vec<Page>,
    /// Number of pages ever added since the last `clear`; drives default names.
    counter: usize,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Result<&Page> {
        let len = self.pages.len();
        self.pages
            .get(index)
            .ok_or(DocscanError::PageIndex { index, len })
    }

    fn page_mut(&mut self, index: usize) -> Result<&mut Page> {
        let len = self.pages.len();
        self.pages
            .get_mut(index)
            .ok_or(DocscanError::PageIndex { index, len })
    }

    /// Name the next added page gets when none is supplied.
    pub fn next_default_name(&self) -> String {
        format!("Page {}", self.counter + 1)
    }

    /// Append a page. Blank or missing names fall back to `Page N`.
    pub fn add_page(&mut self, image: DynamicImage, name: Option<&str>) -> PageId {
        let default_name = self.next_default_name();
        self.counter += 1;

        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => default_name,
        };

        let page = Page::new(name, image);
        let id = page.id;
        info!(page = %page.name, index = self.pages.len(), "Page added");
        self.pages.push(page);
        id
    }

    /// Rename a page. Returns `Ok(false)` and leaves the name alone when the
    /// new name is blank.
    pub fn rename_page(&mut self, index: usize, name: &str) -> Result<bool> {
        let trimmed = name.trim();
        let page = self.page_mut(index)?;
        if trimmed.is_empty() {
            return Ok(false);
        }
        debug!(from = %page.name, to = trimmed, "Page renamed");
        page.name = trimmed.to_string();
        Ok(true)
    }

    pub fn remove_page(&mut self, index: usize) -> Result<Page> {
        self.page(index)?;
        let page = self.pages.remove(index);
        info!(page = %page.name, index, "Page removed");
        Ok(page)
    }

    /// Swap the page with its predecessor. Returns the page's new index.
    pub fn move_page_up(&mut self, index: usize) -> Result<usize> {
        self.page(index)?;
        if index == 0 {
            return Ok(0);
        }
        self.pages.swap(index, index - 1);
        Ok(index - 1)
    }

    /// Swap the page with its successor. Returns the page's new index.
    pub fn move_page_down(&mut self, index: usize) -> Result<usize> {
        self.page(index)?;
        if index + 1 >= self.pages.len() {
            return Ok(index);
        }
        self.pages.swap(index, index + 1);
        Ok(index + 1)
    }

    /// Insert a copy of the page right after the original.
    pub fn duplicate_page(&mut self, index: usize) -> Result<PageId> {
        let original = self.page(index)?;
        let mut copy = Page::new(format!("{} (Copy)", original.name), original.image.clone());
        copy.text = original.text.clone();
        let id = copy.id;
        info!(page = %original.name, index, "Page duplicated");
        self.pages.insert(index + 1, copy);
        Ok(id)
    }

    /// Replace a page's image. Any OCR text belonged to the old image and is
    /// dropped.
    pub fn replace_image(&mut self, index: usize, image: DynamicImage) -> Result<()> {
        let page = self.page_mut(index)?;
        page.image = image;
        page.text = None;
        page.updated_at = Utc::now();
        info!(page = %page.name, index, "Page image updated");
        Ok(())
    }

    pub fn set_text(&mut self, index: usize, text: impl Into<String>) -> Result<()> {
        self.page_mut(index)?.text = Some(text.into());
        Ok(())
    }

    /// Remove every page and restart default numbering.
    pub fn clear(&mut self) {
        info!(pages = self.pages.len(), "Document cleared");
        self.pages.clear();
        self.counter = 0;
    }

    /// `"{n}. {name} ({HH:MM:SS})"` for every page, 1-based.
    pub fn listing(&self) -> Vec<String> {
        self.pages
            .iter()
            .enumerate()
            .map(|(i, page)| format!("{}. {} ({})", i + 1, page.name, page.timestamp_label()))
            .collect()
    }

    pub fn images(&self) -> Vec<&DynamicImage> {
        self.pages.iter().map(|p| &p.image).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn img(value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([value])))
    }

    fn names(doc: &Document) -> Vec<&str> {
        doc.pages().iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn default_names_follow_the_counter() {
        let mut doc = Document::new();
        doc.add_page(img(1), None);
        doc.add_page(img(2), Some("   "));
        doc.add_page(img(3), Some(" Invoice "));
        assert_eq!(names(&doc), ["Page 1", "Page 2", "Invoice"]);
    }

    #[test]
    fn counter_survives_removal_but_not_clear() {
        let mut doc = Document::new();
        doc.add_page(img(1), None);
        doc.add_page(img(2), None);
        doc.remove_page(0).unwrap();
        doc.add_page(img(3), None);
        assert_eq!(names(&doc), ["Page 2", "Page 3"]);

        doc.clear();
        assert!(doc.is_empty());
        doc.add_page(img(4), None);
        assert_eq!(names(&doc), ["Page 1"]);
    }

    #[test]
    fn blank_rename_is_ignored() {
        let mut doc = Document::new();
        doc.add_page(img(1), None);
        assert!(!doc.rename_page(0, "  ").unwrap());
        assert!(doc.rename_page(0, "Cover").unwrap());
        assert_eq!(names(&doc), ["Cover"]);
    }

    #[test]
    fn moves_stop_at_the_ends() {
        let mut doc = Document::new();
        for v in 0..3 {
            doc.add_page(img(v), None);
        }
        assert_eq!(doc.move_page_up(0).unwrap(), 0);
        assert_eq!(doc.move_page_down(2).unwrap(), 2);
        assert_eq!(doc.move_page_down(0).unwrap(), 1);
        assert_eq!(names(&doc), ["Page 2", "Page 1", "Page 3"]);
        assert_eq!(doc.move_page_up(2).unwrap(), 1);
        assert_eq!(names(&doc), ["Page 2", "Page 3", "Page 1"]);
    }

    #[test]
    fn duplicate_inserts_after_original() {
        let mut doc = Document::new();
        doc.add_page(img(1), Some("A"));
        doc.add_page(img(2), Some("B"));
        doc.set_text(0, "hello").unwrap();

        let id = doc.duplicate_page(0).unwrap();
        assert_eq!(names(&doc), ["A", "A (Copy)", "B"]);
        let copy = doc.page(1).unwrap();
        assert_eq!(copy.id, id);
        assert_ne!(copy.id, doc.page(0).unwrap().id);
        assert_eq!(copy.text.as_deref(), Some("hello"));
    }

    #[test]
    fn replacing_the_image_clears_text() {
        let mut doc = Document::new();
        doc.add_page(img(1), None);
        doc.set_text(0, "stale").unwrap();
        doc.replace_image(0, img(9)).unwrap();
        let page = doc.page(0).unwrap();
        assert!(page.text.is_none());
        assert_eq!(page.image.to_luma8().get_pixel(0, 0).0[0], 9);
    }

    #[test]
    fn out_of_range_index_reports_length() {
        let mut doc = Document::new();
        doc.add_page(img(1), None);
        let err = doc.remove_page(3).unwrap_err();
        assert!(matches!(err, DocscanError::PageIndex { index: 3, len: 1 }));
        assert!(doc.duplicate_page(1).is_err());
        assert!(doc.move_page_up(5).is_err());
    }

    #[test]
    fn listing_is_numbered_from_one() {
        let mut doc = Document::new();
        doc.add_page(img(1), Some("Front"));
        doc.add_page(img(2), Some("Back"));
        let listing = doc.listing();
        assert!(listing[0].starts_with("1. Front ("));
        assert!(listing[1].starts_with("2. Back ("));
        assert!(listing[1].ends_with(')'));
    }
}
