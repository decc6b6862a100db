//! PDF text and glyph extraction using pdf-extract.

use std::panic::{self, AssertUnwindSafe};

use pdf_extract::{Document, MediaBox, OutputDev, OutputError, Transform};
use tracing::{debug, trace};

use super::{PdfProcessor, Result};
use crate::error::PdfError;
use crate::layout::PositionedFragment;

/// PDF content extractor.
///
/// Documents are parsed with the lopdf version re-exported by pdf-extract so
/// the same `Document` can be handed to its content stream interpreter.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
        }
    }

    /// Create an extractor with `data` already loaded.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut extractor = Self::new();
        extractor.load(data)?;
        Ok(extractor)
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or(PdfError::Parse("No document loaded".to_string()))
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects one fragment per visible glyph of a page.
///
/// pdf-extract resolves fonts, encodings and widths; `trm` is the glyph's
/// text rendering matrix without the font size, `width` its advance per
/// unit of font size.
#[derive(Default)]
struct FragmentCollector {
    page_top: f64,
    fragments: Vec<PositionedFragment>,
}

impl OutputDev for FragmentCollector {
    fn begin_page(
        &mut self,
        _page_num: u32,
        media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> std::result::Result<(), OutputError> {
        self.page_top = media_box.ury;
        Ok(())
    }

    fn end_page(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        text: &str,
    ) -> std::result::Result<(), OutputError> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let scale = trm.m11.hypot(trm.m12);
        let x0 = trm.m31;
        let x1 = x0 + width * font_size * scale;
        let top = self.page_top - trm.m32;

        self.fragments
            .push(PositionedFragment::new(text, x0 as f32, x1 as f32, top as f32));
        Ok(())
    }

    fn begin_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // Save decrypted document to raw_data for pdf_extract
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_text(&self) -> Result<String> {
        let text = pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))?;
        trace!("native text: {} chars", text.len());
        Ok(text)
    }

    fn extract_fragments(&self, page: u32) -> Result<Vec<PositionedFragment>> {
        let doc = self.document()?;
        if !doc.get_pages().contains_key(&page) {
            return Err(PdfError::InvalidPage(page));
        }

        let mut collector = FragmentCollector::default();
        // pdf-extract panics on some malformed fonts and content streams.
        let walked = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::output_doc_page(doc, &mut collector, page)
        }));

        match walked {
            Ok(Ok(())) => {
                trace!("page {}: {} glyphs", page, collector.fragments.len());
                Ok(collector.fragments)
            }
            Ok(Err(e)) => Err(PdfError::Content {
                page,
                reason: e.to_string(),
            }),
            Err(_) => Err(PdfError::Content {
                page,
                reason: "content stream could not be interpreted".to_string(),
            }),
        }
    }
}
