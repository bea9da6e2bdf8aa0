//! PDF Lite MCP Server Library
//!
//! This crate provides MCP tools for reading PDFs in batches:
//! - `read_pdf`: Extract text, metadata and page counts from local or remote PDFs
//! - `list_pdfs`: List PDF files under the project root

pub mod batch;
pub mod config;
pub mod error;
pub mod pdf;
pub mod server;
pub mod source;

pub use batch::{
    BatchOrchestrator, BatchRequest, BatchResult, ExtractionFlags, ReadPdfParams,
    SourceDescriptor, SourceLocation, SourceParams, SourceResult,
};
pub use config::ServerConfig;
pub use error::{Error, ErrorKind, Result};
pub use server::{run_server_with_config, PdfServer};
pub use source::{ListPdfsParams, ListPdfsResult, PdfFileInfo};
