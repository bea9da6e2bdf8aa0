//! Parser backends: the black box that turns bytes into pages and metadata

use crate::error::{Error, Result};
use pdfium_render::prelude::*;

/// Raw document information as reported by a backend.
/// Fields the document does not carry stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

/// A parsed document, alive for the duration of [`PdfBackend::open`]
pub trait OpenDocument {
    fn page_count(&self) -> u32;

    fn metadata(&self) -> RawMetadata;

    /// Text of the page at the zero-based `index`
    fn page_text(&self, index: u32) -> Result<String>;
}

/// Trait for PDF parsing backends.
///
/// Implementors parse the bytes and hand the open document to `visit`;
/// page selection, cleaning and error policy live in
/// [`crate::pdf::PdfExtractor`].
pub trait PdfBackend: Send + Sync {
    fn open(
        &self,
        data: &[u8],
        visit: &mut dyn FnMut(&dyn OpenDocument) -> Result<()>,
    ) -> Result<()>;
}

/// PDFium-based implementation of [`PdfBackend`]
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumBackend;

impl PdfiumBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Encrypted documents are out of scope, so a password prompt is just
/// another unreadable PDF.
fn map_load_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::InvalidPdf {
                reason: "password protected PDFs are not supported".to_string(),
            }
        }
        other => Error::InvalidPdf {
            reason: other.to_string(),
        },
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl OpenDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> u32 {
        self.document.pages().len() as u32
    }

    fn metadata(&self) -> RawMetadata {
        let meta = self.document.metadata();
        let tag = |tag_type| meta.get(tag_type).map(|t| t.value().to_string());

        RawMetadata {
            title: tag(PdfDocumentMetadataTagType::Title),
            author: tag(PdfDocumentMetadataTagType::Author),
            subject: tag(PdfDocumentMetadataTagType::Subject),
            keywords: tag(PdfDocumentMetadataTagType::Keywords),
            creator: tag(PdfDocumentMetadataTagType::Creator),
            producer: tag(PdfDocumentMetadataTagType::Producer),
            creation_date: tag(PdfDocumentMetadataTagType::CreationDate),
            modification_date: tag(PdfDocumentMetadataTagType::ModificationDate),
        }
    }

    fn page_text(&self, index: u32) -> Result<String> {
        let page_index = u16::try_from(index).map_err(|_| Error::Pdfium {
            reason: format!("page index {} exceeds PDFium's range", index),
        })?;
        let page = self.document.pages().get(page_index).map_err(|e| Error::Pdfium {
            reason: format!("Failed to get page {}: {}", index + 1, e),
        })?;

        // Pages without a text layer (scans) read as empty
        Ok(page.text().map(|t| t.all()).unwrap_or_default())
    }
}

impl PdfBackend for PdfiumBackend {
    fn open(
        &self,
        data: &[u8],
        visit: &mut dyn FnMut(&dyn OpenDocument) -> Result<()>,
    ) -> Result<()> {
        let pdfium = create_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(map_load_error)?;

        // The document borrows `pdfium` and must be dropped first
        let document = PdfiumDocument { document };
        let result = visit(&document);
        result
    }
}
