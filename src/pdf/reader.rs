//! Page selection, metadata and text extraction on top of a [`PdfBackend`]

use crate::error::{Error, Result};
use crate::pdf::backend::{OpenDocument, PdfBackend, RawMetadata};
use crate::pdf::text::TextNormalizer;
use chrono::{FixedOffset, NaiveDate, TimeZone};
use rmcp::schemars::JsonSchema;
use serde::Serialize;
use std::sync::Arc;

/// Document information; absent fields are omitted, never invented
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct PdfMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    /// RFC 3339 when the PDF date could be parsed, raw value otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
}

impl From<RawMetadata> for PdfMetadata {
    fn from(raw: RawMetadata) -> Self {
        let text = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let date = |value: Option<String>| text(value).map(|v| normalize_pdf_date(&v));

        Self {
            title: text(raw.title),
            author: text(raw.author),
            subject: text(raw.subject),
            keywords: text(raw.keywords),
            creator: text(raw.creator),
            producer: text(raw.producer),
            creation_date: date(raw.creation_date),
            modification_date: date(raw.modification_date),
        }
    }
}

/// Text of one page (1-indexed)
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

/// What to pull out of a document
#[derive(Debug, Clone, Default)]
pub struct ExtractionRequest {
    /// Explicit 1-based pages; `None` means no explicit selection
    pub pages: Option<Vec<i64>>,
    pub include_metadata: bool,
    pub include_full_text: bool,
}

/// Result of extracting one document
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPdf {
    pub page_count: u32,
    pub metadata: Option<PdfMetadata>,
    pub pages: Vec<PageText>,
}

impl ExtractedPdf {
    /// All extracted pages joined with a page marker
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| format!("--- Page {} ---\n{}", p.page, p.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Map a public 1-based page number to the backend's 0-based index.
/// The only place the two numbering schemes meet.
fn page_index(page: u32) -> u32 {
    page - 1
}

/// Validate explicit pages against the page count
fn select_pages(requested: &[i64], page_count: u32) -> Result<Vec<u32>> {
    let out_of_range: Vec<i64> = requested
        .iter()
        .copied()
        .filter(|&p| p < 1 || p > i64::from(page_count))
        .collect();

    if !out_of_range.is_empty() {
        return Err(Error::PageOutOfRange {
            pages: out_of_range,
            total: page_count,
        });
    }

    Ok(requested.iter().map(|&p| p as u32).collect())
}

/// Extracts page count, metadata and page text through a backend
pub struct PdfExtractor {
    backend: Arc<dyn PdfBackend>,
    normalizer: TextNormalizer,
}

impl PdfExtractor {
    pub fn new(backend: Arc<dyn PdfBackend>, normalizer: TextNormalizer) -> Self {
        Self {
            backend,
            normalizer,
        }
    }

    pub fn extract(&self, data: &[u8], request: &ExtractionRequest) -> Result<ExtractedPdf> {
        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::InvalidPdf {
                reason: "Not a valid PDF file".to_string(),
            });
        }

        let mut extracted = None;
        self.backend.open(data, &mut |document: &dyn OpenDocument| -> Result<()> {
            extracted = Some(self.extract_document(document, request)?);
            Ok(())
        })?;

        extracted.ok_or_else(|| Error::InvalidPdf {
            reason: "backend did not yield a document".to_string(),
        })
    }

    fn extract_document(
        &self,
        document: &dyn OpenDocument,
        request: &ExtractionRequest,
    ) -> Result<ExtractedPdf> {
        let page_count = document.page_count();
        if page_count == 0 {
            return Err(Error::InvalidPdf {
                reason: "PDF has no pages".to_string(),
            });
        }

        let pages_to_read = match &request.pages {
            Some(requested) => select_pages(requested, page_count)?,
            None if request.include_full_text => (1..=page_count).collect(),
            None => Vec::new(),
        };

        let metadata = request
            .include_metadata
            .then(|| PdfMetadata::from(document.metadata()));

        let pages = pages_to_read
            .into_iter()
            .map(|page| {
                let raw = document.page_text(page_index(page))?;
                Ok(PageText {
                    page,
                    text: self.normalizer.normalize(&raw),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ExtractedPdf {
            page_count,
            metadata,
            pages,
        })
    }
}

/// Convert a PDF date (`D:YYYYMMDDHHmmSSOHH'mm'`) to RFC 3339.
/// Anything that does not parse is returned unchanged.
pub fn normalize_pdf_date(raw: &str) -> String {
    parse_pdf_date(raw).unwrap_or_else(|| raw.to_string())
}

fn parse_pdf_date(raw: &str) -> Option<String> {
    let s = raw.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);

    let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, zone) = s.split_at(digits_end);
    if digits.len() < 4 || digits.len() % 2 != 0 || digits.len() > 14 {
        return None;
    }

    let field = |start: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + 2) {
            Some(v) => v.parse().ok(),
            None => Some(default),
        }
    };
    let year: i32 = digits[0..4].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4, 1)?, field(6, 1)?)?;
    let naive = date.and_hms_opt(field(8, 0)?, field(10, 0)?, field(12, 0)?)?;

    let offset_secs = match zone.chars().next() {
        None | Some('Z') => 0,
        Some(sign @ ('+' | '-')) => {
            let rest: String = zone[1..].chars().filter(|c| c.is_ascii_digit()).collect();
            let hours: i32 = rest.get(0..2)?.parse().ok()?;
            let minutes: i32 = rest.get(2..4).map(|m| m.parse().ok()).unwrap_or(Some(0))?;
            let secs = hours * 3600 + minutes * 60;
            if sign == '-' {
                -secs
            } else {
                secs
            }
        }
        Some(_) => return None,
    };

    let offset = FixedOffset::east_opt(offset_secs)?;
    let datetime = offset.from_local_datetime(&naive).single()?;
    Some(datetime.to_rfc3339())
}
