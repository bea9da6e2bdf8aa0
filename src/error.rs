//! Error types for PDF Lite MCP

use serde::Serialize;
use thiserror::Error;

/// Result type alias for PDF Lite MCP
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for PDF Lite MCP
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or over-limit request; rejects the whole batch
    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    /// Local path is absolute or escapes the project root
    #[error("Path traversal rejected: {path} ({reason})")]
    PathTraversal { path: String, reason: String },

    /// Local file missing or not a regular file
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Local file exists but could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// URL is malformed, not http(s), or not allowed
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Download exceeded the configured timeout
    #[error("Download of {url} timed out after {seconds}s")]
    DownloadTimeout { url: String, seconds: u64 },

    /// Transport or HTTP failure while downloading
    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Download too large
    #[error("Download too large: {size} bytes (max: {max_size} bytes)")]
    DownloadTooLarge { size: u64, max_size: u64 },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// Requested pages outside 1..=page_count
    #[error("Pages {pages:?} out of range (total: {total})")]
    PageOutOfRange { pages: Vec<i64>, total: u32 },

    /// PDFium error (library binding or page access)
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Blocking extraction task failed to complete
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client-visible error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub enum ErrorKind {
    ValidationError,
    PathTraversal,
    FileNotFound,
    InvalidUrl,
    DownloadTimeout,
    DownloadError,
    ReadError,
    InvalidPdf,
    PageOutOfRange,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::PathTraversal => "PathTraversal",
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::InvalidUrl => "InvalidUrl",
            ErrorKind::DownloadTimeout => "DownloadTimeout",
            ErrorKind::DownloadError => "DownloadError",
            ErrorKind::ReadError => "ReadError",
            ErrorKind::InvalidPdf => "InvalidPdf",
            ErrorKind::PageOutOfRange => "PageOutOfRange",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Category reported to clients alongside the message
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::ValidationError,
            Error::PathTraversal { .. } => ErrorKind::PathTraversal,
            Error::FileNotFound { .. } => ErrorKind::FileNotFound,
            Error::Read { .. } | Error::Io(_) => ErrorKind::ReadError,
            Error::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            Error::DownloadTimeout { .. } => ErrorKind::DownloadTimeout,
            Error::Download { .. } | Error::DownloadTooLarge { .. } => ErrorKind::DownloadError,
            Error::InvalidPdf { .. } => ErrorKind::InvalidPdf,
            Error::PageOutOfRange { .. } => ErrorKind::PageOutOfRange,
            Error::Pdfium { .. } | Error::Join(_) | Error::HttpRequest(_) => {
                ErrorKind::InternalError
            }
        }
    }

    /// Return a sanitized error message safe to send to clients.
    /// Internal details (resolved paths, library errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::Validation { reason } => format!("Invalid request: {}", reason),
            Error::PathTraversal { path, .. } => {
                format!("Access denied: {} is outside the project root", path)
            }
            Error::FileNotFound { path } => format!("File not found: {}", path),
            Error::Read { path, .. } => format!("Failed to read file: {}", path),
            Error::Io(_) => "I/O error".to_string(),
            Error::InvalidUrl { url, reason } => format!("Invalid URL {}: {}", url, reason),
            Error::DownloadTimeout { url, seconds } => {
                format!("Download of {} timed out after {}s", url, seconds)
            }
            Error::Download { url, reason } => format!("Download of {} failed: {}", url, reason),
            Error::HttpRequest(_) => "HTTP client unavailable".to_string(),
            Error::DownloadTooLarge { max_size, .. } => {
                format!("Download exceeds maximum size of {} bytes", max_size)
            }
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PageOutOfRange { pages, total } => format!(
                "Requested pages {:?} are out of range (document has {} pages)",
                pages, total
            ),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::Join(_) => "Internal processing error".to_string(),
        }
    }
}
