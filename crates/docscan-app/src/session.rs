// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan session state.
//
// Tracks the image being worked on, its processed variants, the manual
// adjustment factors, and the page selected for editing, on top of the
// multi-page `Document` that gets exported.

use std::path::Path;

use docscan_core::error::{DocscanError, Result};
use docscan_core::{Adjustments, AppConfig, PageId, PaperSize, is_supported_image_extension};
use docscan_document::{DetectionParams, Document, ImageProcessor, PdfWriter, ScanEnhancer};
use image::DynamicImage;
use tracing::{debug, info, instrument};

/// Everything the scanner front end needs between user actions.
pub struct ScanSession {
    document: Document,
    /// Image loaded from a file, a capture, or the selected page.
    current: Option<DynamicImage>,
    /// Result of the last automatic processing of `current`.
    auto_processed: Option<DynamicImage>,
    /// Latest result of processing or adjustment, not yet committed.
    processed: Option<DynamicImage>,
    selected: Option<usize>,
    adjustments: Adjustments,
    paper_size: PaperSize,
    detection: DetectionParams,
}

impl ScanSession {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            document: Document::new(),
            current: None,
            auto_processed: None,
            processed: None,
            selected: None,
            adjustments: Adjustments::default(),
            paper_size: config.pdf.paper_size,
            detection: DetectionParams::from(&config.detection),
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn current(&self) -> Option<&DynamicImage> {
        self.current.as_ref()
    }

    pub fn processed(&self) -> Option<&DynamicImage> {
        self.processed.as_ref()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn adjustments(&self) -> Adjustments {
        self.adjustments
    }

    /// The processed image if there is one, otherwise the current image.
    pub fn working_image(&self) -> Option<&DynamicImage> {
        self.processed.as_ref().or(self.current.as_ref())
    }

    /// Short description of what is being edited.
    pub fn editing_label(&self) -> String {
        match self.selected.and_then(|index| self.document.page(index).ok()) {
            Some(page) => format!("Editing: {}", page.name),
            None if self.current.is_some() => "Editing: new image".into(),
            None => "Mode: new image".into(),
        }
    }

    // -- Loading --------------------------------------------------------------

    /// Load an image file as a new, unsaved page.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(is_supported_image_extension);
        if !supported {
            return Err(DocscanError::UnsupportedImageFormat(
                path.display().to_string(),
            ));
        }

        let image = ImageProcessor::open(path)?.into_dynamic();
        self.load_image(image);
        Ok(())
    }

    /// Use a captured or decoded image as a new, unsaved page.
    pub fn load_image(&mut self, image: DynamicImage) {
        self.new_image_mode();
        debug!(width = image.width(), height = image.height(), "Image loaded");
        self.current = Some(image);
    }

    /// Leave page editing and drop all working images.
    pub fn new_image_mode(&mut self) {
        self.selected = None;
        self.current = None;
        self.reset_adjustments();
        self.auto_processed = None;
    }

    // -- Processing -----------------------------------------------------------

    /// Detect, straighten, and binarize the current image.
    ///
    /// Returns whether document edges were found. The result becomes both the
    /// processed image and the base for later adjustments.
    #[instrument(skip(self))]
    pub fn auto_process(&mut self) -> Result<bool> {
        let current = self.current.clone().ok_or(DocscanError::NoImage)?;
        let outcome = ScanEnhancer::from_dynamic(current, self.paper_size)
            .with_params(self.detection)
            .process();
        let edges_found = outcome.edges_found();

        self.adjustments = Adjustments::default();
        self.auto_processed = Some(outcome.image.clone());
        self.processed = Some(outcome.image);
        info!(edges_found, "Automatic processing complete");
        Ok(edges_found)
    }

    /// Apply brightness, contrast, and sharpness factors.
    ///
    /// Factors are clamped to their ranges and always applied to the same
    /// base (the auto-processed image, else the current image), so repeated
    /// calls do not compound.
    #[instrument(skip(self))]
    pub fn apply_adjustments(&mut self, adjustments: Adjustments) -> Result<()> {
        let base = self
            .auto_processed
            .as_ref()
            .or(self.current.as_ref())
            .ok_or(DocscanError::NoImage)?;

        let adjustments = adjustments.clamped();
        self.processed = if adjustments.is_identity() {
            self.auto_processed.clone()
        } else {
            Some(
                ImageProcessor::from_dynamic(base.clone())
                    .apply_adjustments(&adjustments)
                    .into_dynamic(),
            )
        };
        self.adjustments = adjustments;
        Ok(())
    }

    /// Back to neutral factors and no processed image.
    pub fn reset_adjustments(&mut self) {
        self.adjustments = Adjustments::default();
        self.processed = None;
    }

    // -- Pages ----------------------------------------------------------------

    /// Append the working image as a page. Blank names get "Page N".
    #[instrument(skip(self))]
    pub fn add_page(&mut self, name: Option<&str>) -> Result<PageId> {
        let image = self.working_image().cloned().ok_or(DocscanError::NoImage)?;
        Ok(self.document.add_page(image, name))
    }

    /// Load a page for editing.
    #[instrument(skip(self))]
    pub fn select_page(&mut self, index: usize) -> Result<()> {
        let image = self.document.page(index)?.image.clone();
        self.load_image(image);
        self.selected = Some(index);
        Ok(())
    }

    /// Write the processed image back into the selected page.
    #[instrument(skip(self))]
    pub fn update_selected_page(&mut self) -> Result<()> {
        let index = self.selected.ok_or(DocscanError::NoPageSelected)?;
        let image = self.processed.take().ok_or(DocscanError::NothingToApply)?;

        self.document.replace_image(index, image.clone())?;
        self.current = Some(image);
        self.auto_processed = None;
        self.adjustments = Adjustments::default();
        info!(index, "Selected page updated");
        Ok(())
    }

    /// Remove a page, keeping the selection on the same page where possible.
    pub fn remove_page(&mut self, index: usize) -> Result<()> {
        self.document.remove_page(index)?;
        self.selected = match self.selected {
            Some(selected) if selected == index => {
                self.current = None;
                self.reset_adjustments();
                self.auto_processed = None;
                None
            }
            Some(selected) if selected > index => Some(selected - 1),
            other => other,
        };
        Ok(())
    }

    pub fn move_page_up(&mut self, index: usize) -> Result<usize> {
        let to = self.document.move_page_up(index)?;
        self.follow_move(index, to);
        Ok(to)
    }

    pub fn move_page_down(&mut self, index: usize) -> Result<usize> {
        let to = self.document.move_page_down(index)?;
        self.follow_move(index, to);
        Ok(to)
    }

    fn follow_move(&mut self, from: usize, to: usize) {
        self.selected = self.selected.map(|selected| match selected {
            s if s == from => to,
            s if s == to => from,
            s => s,
        });
    }

    /// Drop every page and the working images.
    pub fn clear(&mut self) {
        self.document.clear();
        self.new_image_mode();
    }

    // -- Output ---------------------------------------------------------------

    /// Run OCR on the working image. When a page is selected its text is
    /// stored on the page for searchable export.
    #[cfg(feature = "ocr")]
    #[instrument(skip_all)]
    pub fn extract_text(&mut self, engine: &docscan_document::OcrEngine) -> Result<String> {
        let image = self.working_image().ok_or(DocscanError::NoImage)?;
        let text = engine.recognize_text(image)?;
        if let Some(index) = self.selected {
            self.document.set_text(index, text.clone())?;
        }
        Ok(text)
    }

    /// Run OCR on every page that has no text yet.
    #[cfg(feature = "ocr")]
    #[instrument(skip_all)]
    pub fn extract_all_text(&mut self, engine: &docscan_document::OcrEngine) -> Result<()> {
        for index in 0..self.document.len() {
            let page = self.document.page(index)?;
            if page.text.is_some() {
                continue;
            }
            let text = engine.recognize_text(&page.image)?;
            self.document.set_text(index, text)?;
        }
        Ok(())
    }

    /// Save the working image; JPEG quality applies to `.jpg`/`.jpeg` paths.
    pub fn save_image(&self, path: impl AsRef<Path>, jpeg_quality: u8) -> Result<()> {
        let image = self.working_image().ok_or(DocscanError::NoImage)?;
        ImageProcessor::from_dynamic(image.clone()).save(path, jpeg_quality)
    }

    /// Export every page to one PDF at `path`. Returns the written bytes.
    #[instrument(skip(self, writer), fields(pages = self.document.len()))]
    pub fn export_pdf(
        &self,
        writer: &PdfWriter,
        path: impl AsRef<Path> + std::fmt::Debug,
        searchable: bool,
    ) -> Result<Vec<u8>> {
        let bytes = writer.create_from_document(&self.document, searchable)?;
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "PDF exported");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::*;

    fn session() -> ScanSession {
        ScanSession::new(&AppConfig::default())
    }

    fn photo() -> DynamicImage {
        let mut img = GrayImage::from_pixel(300, 400, Luma([40u8]));
        for y in 50..350 {
            for x in 40..260 {
                img.put_pixel(x, y, Luma([230u8]));
            }
        }
        DynamicImage::ImageLuma8(img)
    }

    fn flat(value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 20, Rgb([value, value, value])))
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let mut session = session();
        let err = session.load_file("notes.gif").unwrap_err();
        assert!(matches!(err, DocscanError::UnsupportedImageFormat(_)));
        assert!(session.current().is_none());
    }

    #[test]
    fn uppercase_extension_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SCAN.PNG");
        flat(100).save(&path).unwrap();

        let mut session = session();
        session.load_file(&path).unwrap();
        assert!(session.current().is_some());
        assert_eq!(session.editing_label(), "Editing: new image");
    }

    #[test]
    fn auto_process_finds_the_page() {
        let mut session = session();
        session.load_image(photo());
        assert!(session.auto_process().unwrap());
        let processed = session.processed().unwrap();
        assert!(processed.width() < 300);
    }

    #[test]
    fn auto_process_without_image_fails() {
        assert!(matches!(
            session().auto_process(),
            Err(DocscanError::NoImage)
        ));
    }

    #[test]
    fn adjustments_do_not_compound() {
        let mut session = session();
        session.load_image(flat(100));

        session.apply_adjustments(Adjustments::new(1.5, 1.0, 1.0)).unwrap();
        let first = session.processed().unwrap().to_rgb8();
        session.apply_adjustments(Adjustments::new(1.5, 1.0, 1.0)).unwrap();
        let second = session.processed().unwrap().to_rgb8();
        assert_eq!(first, second);
        assert!(first.get_pixel(0, 0)[0] > 100);
    }

    #[test]
    fn adjustments_are_clamped() {
        let mut session = session();
        session.load_image(flat(100));
        session.apply_adjustments(Adjustments::new(9.0, 0.1, -1.0)).unwrap();
        assert_eq!(session.adjustments(), Adjustments::new(2.0, 0.5, 0.0));
    }

    #[test]
    fn identity_adjustment_restores_auto_processed() {
        let mut session = session();
        session.load_image(photo());
        session.auto_process().unwrap();
        let auto = session.processed().cloned().unwrap();

        session.apply_adjustments(Adjustments::new(0.6, 1.0, 1.0)).unwrap();
        assert_ne!(session.processed().unwrap().as_bytes(), auto.as_bytes());

        session.apply_adjustments(Adjustments::default()).unwrap();
        assert_eq!(session.processed().unwrap().as_bytes(), auto.as_bytes());
    }

    #[test]
    fn identity_without_auto_processing_clears_processed() {
        let mut session = session();
        session.load_image(flat(100));
        session.apply_adjustments(Adjustments::new(1.2, 1.0, 1.0)).unwrap();
        session.apply_adjustments(Adjustments::default()).unwrap();
        assert!(session.processed().is_none());
        assert!(session.working_image().is_some());
    }

    #[test]
    fn pages_use_the_working_image() {
        let mut session = session();
        session.load_image(flat(100));
        session.add_page(None).unwrap();
        session.apply_adjustments(Adjustments::new(2.0, 1.0, 1.0)).unwrap();
        session.add_page(Some("Brighter")).unwrap();

        let pages = session.document().pages();
        assert_eq!(pages[0].name, "Page 1");
        assert_eq!(pages[1].name, "Brighter");
        assert!(pages[1].image.to_rgb8().get_pixel(0, 0)[0] > 100);
    }

    #[test]
    fn add_page_without_image_fails() {
        assert!(matches!(session().add_page(None), Err(DocscanError::NoImage)));
    }

    #[test]
    fn selected_page_can_be_updated() {
        let mut session = session();
        session.load_image(flat(100));
        session.add_page(Some("Receipt")).unwrap();

        session.select_page(0).unwrap();
        assert_eq!(session.editing_label(), "Editing: Receipt");
        assert!(matches!(
            session.update_selected_page(),
            Err(DocscanError::NothingToApply)
        ));

        session.apply_adjustments(Adjustments::new(2.0, 1.0, 1.0)).unwrap();
        session.update_selected_page().unwrap();
        assert!(session.processed().is_none());
        let page = session.document().page(0).unwrap();
        assert!(page.image.to_rgb8().get_pixel(0, 0)[0] > 100);
    }

    #[test]
    fn update_without_selection_fails() {
        let mut session = session();
        session.load_image(flat(100));
        session.apply_adjustments(Adjustments::new(2.0, 1.0, 1.0)).unwrap();
        assert!(matches!(
            session.update_selected_page(),
            Err(DocscanError::NoPageSelected)
        ));
    }

    #[test]
    fn selection_follows_page_moves_and_removals() {
        let mut session = session();
        for value in [10, 20, 30] {
            session.load_image(flat(value));
            session.add_page(None).unwrap();
        }

        session.select_page(2).unwrap();
        assert_eq!(session.move_page_up(2).unwrap(), 1);
        assert_eq!(session.selected(), Some(1));

        session.remove_page(0).unwrap();
        assert_eq!(session.selected(), Some(0));

        session.remove_page(0).unwrap();
        assert_eq!(session.selected(), None);
        assert!(session.current().is_none());
        assert_eq!(session.document().len(), 1);
    }

    #[test]
    fn new_image_mode_drops_everything_but_pages() {
        let mut session = session();
        session.load_image(flat(100));
        session.add_page(None).unwrap();
        session.select_page(0).unwrap();
        session.apply_adjustments(Adjustments::new(1.5, 1.0, 1.0)).unwrap();

        session.new_image_mode();
        assert!(session.current().is_none());
        assert!(session.processed().is_none());
        assert_eq!(session.selected(), None);
        assert_eq!(session.adjustments(), Adjustments::default());
        assert_eq!(session.document().len(), 1);
        assert_eq!(session.editing_label(), "Mode: new image");
    }

    #[test]
    fn export_writes_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/scan.pdf");

        let mut session = session();
        for value in [50, 150] {
            session.load_image(flat(value));
            session.add_page(None).unwrap();
        }

        let bytes = session.export_pdf(&PdfWriter::a4(), &path, false).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
        let reader = docscan_document::PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.page_count(), 2);
    }

    #[test]
    fn export_of_empty_document_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = session().export_pdf(&PdfWriter::a4(), dir.path().join("x.pdf"), false);
        assert!(matches!(result, Err(DocscanError::EmptyDocument)));
    }
}
