//! MCP Server implementation using rmcp

use crate::batch::{BatchOrchestrator, ReadPdfParams, SourceError};
use crate::config::ServerConfig;
use crate::error::Error;
use crate::pdf::{PdfBackend, PdfiumBackend};
use crate::source::{list_pdfs, ListPdfsParams, ListPdfsResult};
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*, tool,
    tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::Serialize;
use std::sync::Arc;

/// PDF MCP Server
#[derive(Clone)]
pub struct PdfServer {
    orchestrator: Arc<BatchOrchestrator>,
    tool_router: ToolRouter<Self>,
}

const SERIALIZATION_FAILURE: &str =
    r#"{"error":{"kind":"InternalError","message":"Failed to serialize response"}}"#;

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize tool response");
        SERIALIZATION_FAILURE.to_string()
    })
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl PdfServer {
    /// Create a new PdfServer with full configuration
    pub fn with_config(
        config: ServerConfig,
        backend: Arc<dyn PdfBackend>,
    ) -> crate::error::Result<Self> {
        let orchestrator = BatchOrchestrator::new(Arc::new(config), backend)?;
        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            tool_router: Self::tool_router(),
        })
    }

    /// Extract text from one or more PDFs
    #[tool(
        description = "Extract text, metadata and page counts from up to 10 PDF files in one call.

Source format: each element must be exactly one of {\"path\": \"relative/to/project.pdf\"} or {\"url\": \"https://...\"}, optionally with \"pages\": [1, 3] (1-based).

Every source gets its own result with success, data or error; one failing source never fails the others. Set include_full_text to extract every page when no pages are given."
    )]
    pub async fn read_pdf(&self, Parameters(params): Parameters<ReadPdfParams>) -> String {
        match self.orchestrator.read_pdf(params).await {
            Ok(result) => to_json(&result),
            Err(e) => to_json(&serde_json::json!({ "error": SourceError::from(&e) })),
        }
    }

    /// List PDF files in a directory
    #[tool(
        description = "List PDF files under the project root. Useful for discovering PDFs before reading them.

Returns for each file:
- Path relative to the project root (can be passed to read_pdf)
- Filename
- File size in bytes
- Last modified time

Supports recursive search and glob pattern filtering."
    )]
    pub async fn list_pdfs(&self, Parameters(params): Parameters<ListPdfsParams>) -> String {
        let directory = params.directory.clone().unwrap_or_else(|| ".".to_string());
        let guard = self.orchestrator.guard().clone();

        // Directory walks are blocking filesystem work
        let result = tokio::task::spawn_blocking(move || list_pdfs(&guard, &params))
            .await
            .map_err(Error::from)
            .and_then(|listed| listed)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "list_pdfs failed");
                ListPdfsResult {
                    directory,
                    files: vec![],
                    total_count: 0,
                    error: Some(e.client_message()),
                }
            });

        to_json(&result)
    }
}

#[tool_handler]
impl ServerHandler for PdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF Lite MCP Server reads text and metadata from PDFs under the project root \
                 or at public http(s) URLs. Use list_pdfs to discover files and read_pdf to \
                 extract them in batches."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    let server = PdfServer::with_config(config, Arc::new(PdfiumBackend::new()))?;

    tracing::info!("PDF Lite MCP Server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::SourceParams;
    use pretty_assertions::assert_eq;

    fn server() -> (tempfile::TempDir, PdfServer) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.pdf"), b"not really a pdf").unwrap();
        let server = PdfServer::with_config(
            ServerConfig::with_project_root(dir.path()),
            Arc::new(PdfiumBackend::new()),
        )
        .unwrap();
        (dir, server)
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not representable"))
        }
    }

    #[test]
    fn test_to_json_failure_is_still_json() {
        let output = to_json(&Unserializable);
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["error"]["kind"], "InternalError");
    }

    #[test]
    fn test_get_info_enables_tools() {
        let (_dir, server) = server();
        let info = server.get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.unwrap().contains("read_pdf"));
    }

    #[tokio::test]
    async fn test_read_pdf_validation_error() {
        let (_dir, server) = server();
        let params = ReadPdfParams {
            sources: vec![],
            include_metadata: true,
            include_page_count: true,
            include_full_text: false,
        };

        let output = server.read_pdf(Parameters(params)).await;
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["error"]["kind"], "ValidationError");
        assert!(json.get("results").is_none());
    }

    #[tokio::test]
    async fn test_read_pdf_per_source_failures() {
        let (_dir, server) = server();
        let params = ReadPdfParams {
            sources: vec![
                SourceParams {
                    path: Some("missing.pdf".to_string()),
                    ..SourceParams::default()
                },
                SourceParams {
                    path: Some("notes.pdf".to_string()),
                    ..SourceParams::default()
                },
            ],
            include_metadata: true,
            include_page_count: true,
            include_full_text: false,
        };

        let output = server.read_pdf(Parameters(params)).await;
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        let results = json["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["source"], "missing.pdf");
        assert_eq!(results[0]["error"]["kind"], "FileNotFound");
        // Header check fails before PDFium is ever loaded
        assert_eq!(results[1]["error"]["kind"], "InvalidPdf");
    }

    #[tokio::test]
    async fn test_list_pdfs_reports_errors_inline() {
        let (_dir, server) = server();
        let params = ListPdfsParams {
            directory: Some("../".to_string()),
            recursive: false,
            pattern: None,
        };

        let output = server.list_pdfs(Parameters(params)).await;
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["total_count"], 0);
        assert!(json["error"].as_str().unwrap().contains("outside"));
    }

    #[tokio::test]
    async fn test_list_pdfs_finds_files() {
        let (_dir, server) = server();
        let params = ListPdfsParams {
            directory: None,
            recursive: false,
            pattern: None,
        };

        let output = server.list_pdfs(Parameters(params)).await;
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["files"][0]["path"], "notes.pdf");
    }
}
