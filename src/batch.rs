//! Batch orchestration for the `read_pdf` operation
//!
//! A request is validated as a whole before any I/O. Each source then runs
//! fetch, extract and normalize on its own; failures are recorded in that
//! source's result and never touch its siblings.

use crate::config::ServerConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::pdf::{
    ExtractedPdf, ExtractionRequest, PageText, PdfBackend, PdfExtractor, PdfMetadata,
    TextNormalizer,
};
use crate::source::{parse_http_url, PathGuard, SourceFetcher};
use futures_util::StreamExt;
use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

// ============================================================================
// Request types
// ============================================================================

/// One PDF source as it arrives on the wire
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SourceParams {
    /// Path to a local PDF, relative to the project root
    #[serde(default)]
    pub path: Option<String>,
    /// http(s) URL of a PDF
    #[serde(default)]
    pub url: Option<String>,
    /// Specific pages to extract (1-based)
    #[serde(default)]
    pub pages: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadPdfParams {
    /// PDF sources to process (each needs exactly one of "path" or "url")
    pub sources: Vec<SourceParams>,
    /// Include PDF metadata (default: true)
    #[serde(default = "default_true")]
    pub include_metadata: bool,
    /// Include total page count (default: true)
    #[serde(default = "default_true")]
    pub include_page_count: bool,
    /// Extract every page when no specific pages are requested (default: false)
    #[serde(default)]
    pub include_full_text: bool,
}

fn default_true() -> bool {
    true
}

/// Where a document comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// File relative to the project root
    Local { path: String },
    /// http or https URL
    Remote { url: String },
}

/// A validated source: one location plus an optional page selection
/// (deduplicated, ascending).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    location: SourceLocation,
    pages: Option<Vec<i64>>,
}

impl SourceDescriptor {
    fn local(path: impl Into<String>) -> Self {
        Self {
            location: SourceLocation::Local { path: path.into() },
            pages: None,
        }
    }

    fn remote(url: impl Into<String>) -> Self {
        Self {
            location: SourceLocation::Remote { url: url.into() },
            pages: None,
        }
    }

    fn with_pages(mut self, mut pages: Vec<i64>) -> Self {
        pages.sort_unstable();
        pages.dedup();
        self.pages = Some(pages);
        self
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn pages(&self) -> Option<&[i64]> {
        self.pages.as_deref()
    }

    /// The path or URL as the caller wrote it
    pub fn display(&self) -> &str {
        match &self.location {
            SourceLocation::Local { path } => path,
            SourceLocation::Remote { url } => url,
        }
    }

    fn from_params(index: usize, params: SourceParams, config: &ServerConfig) -> Result<Self> {
        let invalid = |reason: String| Error::Validation {
            reason: format!("sources[{}]: {}", index, reason),
        };

        let descriptor = match (params.path, params.url) {
            (Some(_), Some(_)) => {
                return Err(invalid(
                    "exactly one of \"path\" or \"url\" must be set, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(invalid(
                    "exactly one of \"path\" or \"url\" must be set".to_string(),
                ))
            }
            (Some(path), None) => {
                if path.trim().is_empty() {
                    return Err(invalid("\"path\" must not be empty".to_string()));
                }
                Self::local(path)
            }
            (None, Some(url)) => {
                parse_http_url(&url).map_err(|e| invalid(e.client_message()))?;
                Self::remote(url)
            }
        };

        match params.pages {
            None => Ok(descriptor),
            Some(pages) if pages.is_empty() => {
                Err(invalid("\"pages\" must not be an empty list".to_string()))
            }
            Some(pages) => {
                let descriptor = descriptor.with_pages(pages);
                let count = descriptor.pages.as_ref().map(Vec::len).unwrap_or(0);
                if count > config.max_pages_per_source {
                    return Err(invalid(format!(
                        "too many pages requested ({}, limit: {})",
                        count, config.max_pages_per_source
                    )));
                }
                Ok(descriptor)
            }
        }
    }
}

/// Output switches shared by every source of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionFlags {
    pub include_metadata: bool,
    pub include_page_count: bool,
    pub include_full_text: bool,
}

impl Default for ExtractionFlags {
    fn default() -> Self {
        Self {
            include_metadata: true,
            include_page_count: true,
            include_full_text: false,
        }
    }
}

/// A request that has passed validation; only [`BatchRequest::from_params`]
/// builds one
#[derive(Debug, Clone)]
pub struct BatchRequest {
    sources: Vec<SourceDescriptor>,
    flags: ExtractionFlags,
}

impl BatchRequest {
    pub fn from_params(params: ReadPdfParams, config: &ServerConfig) -> Result<Self> {
        let flags = ExtractionFlags {
            include_metadata: params.include_metadata,
            include_page_count: params.include_page_count,
            include_full_text: params.include_full_text,
        };

        // Count first so an oversized batch is rejected without looking further
        check_source_count(params.sources.len(), config)?;
        let sources = params
            .sources
            .into_iter()
            .enumerate()
            .map(|(i, source)| SourceDescriptor::from_params(i, source, config))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { sources, flags })
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn flags(&self) -> ExtractionFlags {
        self.flags
    }
}

fn check_source_count(count: usize, config: &ServerConfig) -> Result<()> {
    if count == 0 {
        return Err(Error::Validation {
            reason: "at least one source is required".to_string(),
        });
    }
    if count > config.max_sources {
        return Err(Error::Validation {
            reason: format!("too many sources ({}, limit: {})", count, config.max_sources),
        });
    }
    Ok(())
}

// ============================================================================
// Result types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct SourceData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_texts: Option<Vec<PageText>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PdfMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_pages: Option<u32>,
    /// All pages joined with page markers (full-text mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct SourceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for SourceError {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.client_message(),
        }
    }
}

/// Outcome for one source
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct SourceResult {
    pub source: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SourceData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SourceError>,
}

impl SourceResult {
    fn success(source: String, extracted: ExtractedPdf, flags: ExtractionFlags, explicit: bool) -> Self {
        let full_text = (!explicit && flags.include_full_text).then(|| extracted.full_text());
        let page_texts = (explicit || flags.include_full_text).then_some(extracted.pages);

        Self {
            source,
            success: true,
            data: Some(SourceData {
                page_texts,
                metadata: extracted.metadata,
                num_pages: flags.include_page_count.then_some(extracted.page_count),
                full_text,
            }),
            error: None,
        }
    }

    fn failure(source: String, err: &Error) -> Self {
        Self {
            source,
            success: false,
            data: None,
            error: Some(SourceError::from(err)),
        }
    }
}

/// One result per requested source, in request order
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct BatchResult {
    pub results: Vec<SourceResult>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Runs validated batches: fetch, extract and normalize per source
pub struct BatchOrchestrator {
    config: Arc<ServerConfig>,
    fetcher: SourceFetcher,
    extractor: Arc<PdfExtractor>,
}

impl BatchOrchestrator {
    pub fn new(config: Arc<ServerConfig>, backend: Arc<dyn PdfBackend>) -> Result<Self> {
        let guard = PathGuard::new(&config.project_root)?;
        let fetcher = SourceFetcher::new(guard, Arc::clone(&config))?;
        let extractor = Arc::new(PdfExtractor::new(
            backend,
            TextNormalizer::new(config.max_text_chars),
        ));

        tracing::info!(project_root = %fetcher.guard().root().display(), "Project root configured");

        Ok(Self {
            config,
            fetcher,
            extractor,
        })
    }

    pub fn guard(&self) -> &PathGuard {
        self.fetcher.guard()
    }

    /// Validate raw parameters and run the batch.
    /// Only validation errors are returned as `Err`.
    pub async fn read_pdf(&self, params: ReadPdfParams) -> Result<BatchResult> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("read_pdf", %request_id, sources = params.sources.len());

        async move {
            let request = BatchRequest::from_params(params, &self.config).map_err(|e| {
                tracing::warn!(error = %e, "Rejected read_pdf request");
                e
            })?;

            let started = Instant::now();
            let result = self.run(&request).await;
            tracing::info!(
                succeeded = result.succeeded(),
                total = result.results.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "PDF processing completed"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Process every source of a validated request. Output order always
    /// matches request order, whatever order the sources finish in.
    pub async fn run(&self, request: &BatchRequest) -> BatchResult {
        let flags = request.flags();
        let tasks: Vec<_> = request
            .sources()
            .iter()
            .map(|source| self.process_source(source, flags))
            .collect();
        let results = futures_util::stream::iter(tasks)
            .buffered(self.config.max_concurrent_sources.max(1))
            .collect::<Vec<_>>()
            .await;

        BatchResult { results }
    }

    async fn process_source(&self, source: &SourceDescriptor, flags: ExtractionFlags) -> SourceResult {
        let name = source.display().to_string();
        tracing::debug!(source = %name, "Processing PDF source");

        match self.extract_source(source, flags).await {
            Ok(extracted) => SourceResult::success(name, extracted, flags, source.pages.is_some()),
            Err(e) => {
                tracing::warn!(source = %name, kind = %e.kind(), error = %e, "PDF source failed");
                SourceResult::failure(name, &e)
            }
        }
    }

    async fn extract_source(
        &self,
        source: &SourceDescriptor,
        flags: ExtractionFlags,
    ) -> Result<ExtractedPdf> {
        let resolved = self.fetcher.fetch(&source.location).await?;
        tracing::debug!(
            source = %resolved.source_name,
            bytes = resolved.data.len(),
            "Fetched PDF source"
        );

        // Move CPU-heavy PDF work to blocking thread pool; the bytes are
        // dropped when the closure returns
        let extractor = Arc::clone(&self.extractor);
        let data = resolved.data;
        let request = ExtractionRequest {
            pages: source.pages.clone(),
            include_metadata: flags.include_metadata,
            include_full_text: flags.include_full_text,
        };

        tokio::task::spawn_blocking(move || extractor.extract(&data, &request)).await?
    }
}
