//! Discovery of PDF files under the project root

use crate::error::{Error, Result};
use crate::source::PathGuard;
use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListPdfsParams {
    /// Directory to search, relative to the project root (default: the root itself)
    #[serde(default)]
    pub directory: Option<String>,
    /// Search subdirectories recursively (default: false)
    #[serde(default)]
    pub recursive: bool,
    /// Filename pattern to filter (e.g., "report*.pdf"). Supports glob patterns.
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PdfFileInfo {
    /// Path relative to the project root, usable as a `read_pdf` path
    pub path: String,
    /// Filename only
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Last modified time (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ListPdfsResult {
    /// Directory that was searched
    pub directory: String,
    /// PDF files found, sorted by path
    pub files: Vec<PdfFileInfo>,
    pub total_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// List PDF files in a directory inside the guard's root
pub fn list_pdfs(guard: &PathGuard, params: &ListPdfsParams) -> Result<ListPdfsResult> {
    let directory = params.directory.clone().unwrap_or_else(|| ".".to_string());
    let dir_path = guard.resolve(&directory)?;

    if !dir_path.is_dir() {
        return Err(Error::FileNotFound { path: directory });
    }

    let pattern = match params.pattern.as_deref() {
        Some(p) => Some(glob::Pattern::new(p).map_err(|e| Error::Validation {
            reason: format!("invalid pattern {:?}: {}", p, e.msg),
        })?),
        None => None,
    };

    let mut files = Vec::new();
    collect_pdfs(guard, &dir_path, params.recursive, pattern.as_ref(), &mut files)?;
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(ListPdfsResult {
        directory,
        total_count: files.len() as u32,
        files,
        error: None,
    })
}

fn collect_pdfs(
    guard: &PathGuard,
    dir: &Path,
    recursive: bool,
    pattern: Option<&glob::Pattern>,
    files: &mut Vec<PdfFileInfo>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        // Symlinks are not followed, they could lead out of the root
        if file_type.is_dir() {
            if recursive {
                let _ = collect_pdfs(guard, &path, recursive, pattern, files);
            }
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let is_pdf = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if !is_pdf {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(pat) = pattern {
            if !pat.matches(&name) {
                continue;
            }
        }

        let Some(relative) = guard.relative_display(&path) else {
            continue;
        };

        let metadata = entry.metadata().ok();
        let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
        let modified = metadata
            .and_then(|m| m.modified().ok())
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());

        files.push(PdfFileInfo {
            path: relative,
            name,
            size,
            modified,
        });
    }

    Ok(())
}
