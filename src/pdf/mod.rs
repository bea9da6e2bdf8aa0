//! PDF processing layer
//!
//! A [`PdfBackend`] parses bytes; [`PdfExtractor`] applies page selection and
//! metadata policy on top of it, and [`TextNormalizer`] cleans the result.

mod backend;
mod reader;
mod text;

pub use backend::{OpenDocument, PdfBackend, PdfiumBackend, RawMetadata};
pub use reader::{
    normalize_pdf_date, ExtractedPdf, ExtractionRequest, PageText, PdfExtractor, PdfMetadata,
};
pub use text::{clean, expand_ligatures, truncate, TextNormalizer, TRUNCATION_MARKER};
