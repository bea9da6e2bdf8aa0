//! Source resolution: path confinement, local reads, downloads and discovery

pub mod guard;
pub mod listing;
pub mod resolver;

pub use guard::PathGuard;
pub use listing::{list_pdfs, ListPdfsParams, ListPdfsResult, PdfFileInfo};
pub use resolver::{parse_http_url, resolve_path, resolve_url, ResolvedPdf, SourceFetcher};
