//! Process-wide configuration, fixed at start-up

use crate::pdf::TRUNCATION_MARKER;
use anyhow::Context;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Limits and security settings for the PDF Lite MCP server.
///
/// Built once (usually via [`ServerConfig::from_env`]) and shared read-only
/// behind an `Arc` by the path guard, fetcher and batch orchestrator.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory all local paths are resolved against
    pub project_root: PathBuf,
    /// Maximum number of sources per `read_pdf` request (default: 10)
    pub max_sources: usize,
    /// Maximum number of explicit pages per source (default: 100)
    pub max_pages_per_source: usize,
    /// Hard upper bound for a single URL download (default: 30s)
    pub download_timeout: Duration,
    /// Maximum download size in bytes for URL sources (default: 100MB)
    pub max_download_bytes: u64,
    /// Maximum characters kept per page after cleaning (default: 10000)
    pub max_text_chars: usize,
    /// Number of sources processed at the same time (default: 4)
    pub max_concurrent_sources: usize,
    /// Allow URLs that resolve to private/reserved IPs (default: false)
    pub allow_private_urls: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_sources: 10,
            max_pages_per_source: 100,
            download_timeout: Duration::from_secs(30),
            max_download_bytes: 100 * 1024 * 1024, // 100MB
            max_text_chars: 10_000,
            max_concurrent_sources: 4,
            allow_private_urls: false,
        }
    }
}

impl ServerConfig {
    /// Defaults with the project root replaced
    pub fn with_project_root(root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: root.into(),
            ..Self::default()
        }
    }

    /// Build the configuration from `PDF_LITE_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(root) = lookup("PDF_LITE_PROJECT_ROOT") {
            config.project_root = PathBuf::from(root);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "PDF_LITE_DOWNLOAD_TIMEOUT_SECS")? {
            anyhow::ensure!(secs > 0, "PDF_LITE_DOWNLOAD_TIMEOUT_SECS must be positive");
            config.download_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = parse_var(&lookup, "PDF_LITE_MAX_DOWNLOAD_BYTES")? {
            config.max_download_bytes = bytes;
        }
        if let Some(chars) = parse_var::<usize>(&lookup, "PDF_LITE_MAX_TEXT_CHARS")? {
            let marker = TRUNCATION_MARKER.chars().count();
            anyhow::ensure!(
                chars > marker,
                "PDF_LITE_MAX_TEXT_CHARS must be greater than {}",
                marker
            );
            config.max_text_chars = chars;
        }
        if let Some(workers) = parse_var::<usize>(&lookup, "PDF_LITE_MAX_CONCURRENCY")? {
            config.max_concurrent_sources = workers.max(1);
        }
        if let Some(allow) = parse_var(&lookup, "PDF_LITE_ALLOW_PRIVATE_URLS")? {
            config.allow_private_urls = allow;
        }

        Ok(config)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {}: {:?}", key, raw))
        })
        .transpose()
}
