// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader. Opens exported PDFs to report page counts and `/Info` metadata,
// and merges several PDFs into one, using the `lopdf` crate.

use std::path::Path;

use docscan_core::error::{DocscanError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Summary of a PDF file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PdfInfo {
    pub page_count: usize,
    pub version: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub keywords: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

/// Reads existing PDF files.
pub struct PdfReader {
    document: Document,
    /// Source path, if opened from a file.
    source_path: Option<String>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let document = Document::load(path_ref).map_err(|err| {
            DocscanError::PdfError(format!("failed to open {}: {}", path_ref.display(), err))
        })?;
        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self {
            document,
            source_path: Some(path_ref.display().to_string()),
        })
    }

    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            DocscanError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;
        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self {
            document,
            source_path: None,
        })
    }

    // -- Inspection -----------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// Page count, PDF version, and the text entries of `/Info`.
    pub fn metadata(&self) -> PdfInfo {
        let info = self.info_dictionary();
        let field = |key: &[u8]| info.and_then(|dict| dict.get(key).ok()).and_then(decode_text);

        PdfInfo {
            page_count: self.page_count(),
            version: self.document.version.clone(),
            title: field(b"Title"),
            author: field(b"Author"),
            subject: field(b"Subject"),
            creator: field(b"Creator"),
            producer: field(b"Producer"),
            keywords: field(b"Keywords"),
            creation_date: field(b"CreationDate"),
            modification_date: field(b"ModDate"),
        }
    }

    fn info_dictionary(&self) -> Option<&Dictionary> {
        match self.document.trailer.get(b"Info").ok()? {
            Object::Reference(id) => self.document.get_dictionary(*id).ok(),
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    // -- Merging --------------------------------------------------------------

    /// Append the pages of each PDF in `others` after this document's pages.
    #[instrument(skip_all, fields(additional_count = others.len()))]
    pub fn merge(&self, others: &[&[u8]]) -> Result<Vec<u8>> {
        info!(
            base_pages = self.page_count(),
            additional_documents = others.len(),
            "Merging PDFs"
        );

        let mut merged = self.document.clone();

        for (index, other_bytes) in others.iter().enumerate() {
            let other_doc = Document::load_mem(other_bytes).map_err(|err| {
                DocscanError::PdfError(format!(
                    "failed to load additional PDF #{}: {}",
                    index + 1,
                    err
                ))
            })?;

            // `get_pages` is a BTreeMap keyed by page number, so this is in order.
            for page_id in other_doc.get_pages().into_values() {
                clone_page_into(&other_doc, &mut merged, page_id)?;
            }
        }

        let mut output = Vec::new();
        merged.save_to(&mut output).map_err(|err| {
            DocscanError::PdfError(format!("failed to serialise merged PDF: {}", err))
        })?;

        debug!(output_bytes = output.len(), "Merge complete");
        Ok(output)
    }

    /// Merge PDF files in the given order. Needs at least one path.
    pub fn merge_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<u8>> {
        let (first, rest) = paths.split_first().ok_or(DocscanError::EmptyDocument)?;
        let base = Self::open(first)?;
        let others = rest
            .iter()
            .map(|path| std::fs::read(path.as_ref()))
            .collect::<std::io::Result<Vec<_>>>()?;
        let slices: Vec<&[u8]> = others.iter().map(Vec::as_slice).collect();
        base.merge(&slices)
    }
}

/// Decode a PDF text string: UTF-16BE when it carries a byte-order mark,
/// otherwise bytes are taken as UTF-8 (lossy).
fn decode_text(object: &Object) -> Option<String> {
    let Object::String(bytes, _) = object else {
        return None;
    };
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// Clone a page (and everything it references) from `source` into `target`,
/// appending it as the last page.
fn clone_page_into(source: &Document, target: &mut Document, page_id: ObjectId) -> Result<()> {
    let page_object = source.get_object(page_id).map_err(|err| {
        DocscanError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
    })?;

    let cloned = deep_clone_object(source, target, page_object)?;
    let cloned_id = target.add_object(cloned);

    let pages_id = target
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(|pages| pages.as_reference())
        .map_err(|err| DocscanError::PdfError(format!("target has no page tree: {}", err)))?;

    if let Ok(Object::Dictionary(pages_dict)) = target.get_object_mut(pages_id) {
        if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
            kids.push(Object::Reference(cloned_id));
        }
        if let Ok(Object::Integer(count)) = pages_dict.get_mut(b"Count") {
            *count += 1;
        }
    }

    if let Ok(Object::Dictionary(page_dict)) = target.get_object_mut(cloned_id) {
        page_dict.set("Parent", Object::Reference(pages_id));
    }

    Ok(())
}

/// Deep-clone an object, following references. `/Parent` is skipped to avoid
/// walking back up the page tree; the caller patches it.
fn deep_clone_object(source: &Document, target: &mut Document, object: &Object) -> Result<Object> {
    let clone_dict = |dict: &Dictionary, target: &mut Document| -> Result<Dictionary> {
        let mut new_dict = Dictionary::new();
        for (key, value) in dict.iter() {
            if key == b"Parent" {
                continue;
            }
            new_dict.set(key.clone(), deep_clone_object(source, target, value)?);
        }
        Ok(new_dict)
    };

    match object {
        Object::Dictionary(dict) => Ok(Object::Dictionary(clone_dict(dict, target)?)),
        Object::Array(items) => items
            .iter()
            .map(|item| deep_clone_object(source, target, item))
            .collect::<Result<Vec<_>>>()
            .map(Object::Array),
        Object::Reference(ref_id) => match source.get_object(*ref_id) {
            Ok(referenced) => {
                let cloned = deep_clone_object(source, target, referenced)?;
                Ok(Object::Reference(target.add_object(cloned)))
            }
            Err(err) => {
                warn!(?ref_id, %err, "Cannot resolve reference, using Null");
                Ok(Object::Null)
            }
        },
        Object::Stream(stream) => Ok(Object::Stream(lopdf::Stream::new(
            clone_dict(&stream.dict, target)?,
            stream.content.clone(),
        ))),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_strings_are_decoded() {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in "Página".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        let object = Object::String(bytes, lopdf::StringFormat::Hexadecimal);
        assert_eq!(decode_text(&object).as_deref(), Some("Página"));
    }

    #[test]
    fn non_strings_are_ignored() {
        assert_eq!(decode_text(&Object::Integer(3)), None);
    }

    #[test]
    fn garbage_is_not_a_pdf() {
        assert!(matches!(
            PdfReader::from_bytes(b"not a pdf"),
            Err(DocscanError::PdfError(_))
        ));
    }

    #[test]
    fn merging_nothing_is_an_error() {
        let paths: [&str; 0] = [];
        assert!(matches!(
            PdfReader::merge_files(&paths),
            Err(DocscanError::EmptyDocument)
        ));
    }
}
