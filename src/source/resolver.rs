//! Source acquisition: local files under the project root and http(s) downloads

use crate::batch::SourceLocation;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::source::PathGuard;
use futures_util::StreamExt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Redirect hops followed before a download is given up
const MAX_REDIRECTS: usize = 10;

/// Raw bytes of a PDF together with the name it was requested under
pub struct ResolvedPdf {
    pub data: Vec<u8>,
    pub source_name: String,
}

/// Turns a source location into document bytes.
///
/// Downloads are buffered in memory; the buffer is owned by the in-flight
/// future, so a timeout or error drops it on the way out.
#[derive(Clone)]
pub struct SourceFetcher {
    guard: PathGuard,
    client: reqwest::Client,
    config: Arc<ServerConfig>,
}

impl SourceFetcher {
    pub fn new(guard: PathGuard, config: Arc<ServerConfig>) -> Result<Self> {
        // Redirects are followed by hand so every hop passes the host check
        let client = reqwest::Client::builder()
            .connect_timeout(config.download_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(Error::HttpRequest)?;

        Ok(Self {
            guard,
            client,
            config,
        })
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    pub async fn fetch(&self, location: &SourceLocation) -> Result<ResolvedPdf> {
        match location {
            SourceLocation::Local { path } => resolve_path(&self.guard, path).await,
            SourceLocation::Remote { url } => {
                resolve_url(
                    &self.client,
                    url,
                    self.config.download_timeout,
                    self.config.allow_private_urls,
                    self.config.max_download_bytes,
                )
                .await
            }
        }
    }
}

/// Read a file given relative to the guard's root
pub async fn resolve_path(guard: &PathGuard, path: &str) -> Result<ResolvedPdf> {
    let resolved = guard.resolve(path)?;

    let not_found = || Error::FileNotFound {
        path: path.to_string(),
    };
    let metadata = tokio::fs::metadata(&resolved).await.map_err(|_| not_found())?;
    if !metadata.is_file() {
        return Err(not_found());
    }

    let data = tokio::fs::read(&resolved).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => not_found(),
        _ => Error::Read {
            path: path.to_string(),
            source: e,
        },
    })?;

    Ok(ResolvedPdf {
        data,
        source_name: path.to_string(),
    })
}

/// Check that a URL is syntactically valid and uses http or https
pub fn parse_http_url(url_str: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(url_str).map_err(|e| Error::InvalidUrl {
        url: url_str.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::InvalidUrl {
                url: url_str.to_string(),
                reason: format!("unsupported scheme \"{}\", expected http or https", other),
            })
        }
    }

    if parsed.host_str().is_none() {
        return Err(Error::InvalidUrl {
            url: url_str.to_string(),
            reason: "URL has no host".to_string(),
        });
    }

    Ok(parsed)
}

/// Loopback, private, link-local, CGNAT and unspecified addresses
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || (octets[0] == 100 && (octets[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xFE00) == 0xFC00 // unique local
                || (first & 0xFFC0) == 0xFE80 // link-local
        }
    }
}

/// Refuse hosts that are, or resolve to, non-public addresses
async fn check_public_host(url_str: &str, parsed: &url::Url) -> Result<()> {
    let blocked = || Error::InvalidUrl {
        url: url_str.to_string(),
        reason: "URL resolves to a private or reserved address".to_string(),
    };

    let domain = match parsed.host() {
        Some(url::Host::Ipv4(ip)) if is_private_ip(&IpAddr::V4(ip)) => return Err(blocked()),
        Some(url::Host::Ipv6(ip)) if is_private_ip(&IpAddr::V6(ip)) => return Err(blocked()),
        Some(url::Host::Domain(domain)) => domain,
        _ => return Ok(()),
    };
    let port = parsed.port_or_known_default().unwrap_or(443);

    let addrs = tokio::net::lookup_host((domain, port))
        .await
        .map_err(|e| Error::Download {
            url: url_str.to_string(),
            reason: format!("DNS resolution failed for {}: {}", domain, e),
        })?;

    for addr in addrs {
        if is_private_ip(&addr.ip()) {
            return Err(blocked());
        }
    }

    Ok(())
}

/// Download a URL with a hard time limit and a size cap
pub async fn resolve_url(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    allow_private_urls: bool,
    max_download_bytes: u64,
) -> Result<ResolvedPdf> {
    let parsed = parse_http_url(url)?;

    let check_host = |hop: url::Url| async move {
        if allow_private_urls {
            Ok(())
        } else {
            check_public_host(url, &hop).await
        }
    };
    let fetch = fetch_following_redirects(client, url, parsed, max_download_bytes, check_host);

    let data = tokio::time::timeout(timeout, fetch)
        .await
        .map_err(|_| Error::DownloadTimeout {
            url: url.to_string(),
            seconds: timeout.as_secs(),
        })??;

    Ok(ResolvedPdf {
        data,
        source_name: url.to_string(),
    })
}

/// Fetch `start`, following redirects by hand. `check_host` runs before
/// every hop, including the first.
async fn fetch_following_redirects<F, Fut>(
    client: &reqwest::Client,
    url: &str,
    start: url::Url,
    max_download_bytes: u64,
    check_host: F,
) -> Result<Vec<u8>>
where
    F: Fn(url::Url) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let mut current = start;
    for _ in 0..=MAX_REDIRECTS {
        check_host(current.clone()).await?;
        match download(client, url, &current, max_download_bytes).await? {
            Fetched::Body(data) => return Ok(data),
            Fetched::Redirect(next) => {
                tracing::debug!(url = %url, location = %next, "Following redirect");
                current = next;
            }
        }
    }

    Err(Error::Download {
        url: url.to_string(),
        reason: format!("more than {} redirects", MAX_REDIRECTS),
    })
}

enum Fetched {
    Body(Vec<u8>),
    Redirect(url::Url),
}

/// One request without redirect handling. `url` is the address the caller
/// asked for and is what errors report; `target` is the hop being fetched.
async fn download(
    client: &reqwest::Client,
    url: &str,
    target: &url::Url,
    max_download_bytes: u64,
) -> Result<Fetched> {
    let transport_error = |e: reqwest::Error| Error::Download {
        url: url.to_string(),
        reason: if e.is_connect() {
            "connection failed".to_string()
        } else {
            "transfer failed".to_string()
        },
    };

    let response = client
        .get(target.clone())
        .send()
        .await
        .map_err(transport_error)?;

    if response.status().is_redirection() {
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Download {
                url: url.to_string(),
                reason: format!("HTTP status {} without a Location header", response.status()),
            })?;
        let next = target.join(location).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: format!("redirect to an invalid location: {}", e),
        })?;
        if !matches!(next.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl {
                url: url.to_string(),
                reason: format!("redirect to unsupported scheme \"{}\"", next.scheme()),
            });
        }
        return Ok(Fetched::Redirect(next));
    }

    if !response.status().is_success() {
        return Err(Error::Download {
            url: url.to_string(),
            reason: format!("HTTP status {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !content_type.contains("pdf") && !target.path().to_ascii_lowercase().ends_with(".pdf") {
        tracing::warn!(url = %url, content_type = %content_type, "Downloaded content may not be a PDF");
    }

    // Content-Length allows early rejection
    if let Some(content_length) = response.content_length() {
        if content_length > max_download_bytes {
            return Err(Error::DownloadTooLarge {
                size: content_length,
                max_size: max_download_bytes,
            });
        }
    }

    let mut data = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(transport_error)?;
        data.extend_from_slice(&chunk);
        if data.len() as u64 > max_download_bytes {
            return Err(Error::DownloadTooLarge {
                size: data.len() as u64,
                max_size: max_download_bytes,
            });
        }
    }

    Ok(Fetched::Body(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ftp://example.com/a.pdf")]
    #[case("file:///etc/passwd")]
    #[case("not a url")]
    #[case("javascript:alert(1)")]
    fn test_parse_http_url_rejects(#[case] url: &str) {
        assert!(matches!(parse_http_url(url), Err(Error::InvalidUrl { .. })));
    }

    #[test]
    fn test_parse_http_url_accepts() {
        assert!(parse_http_url("https://example.com/a.pdf").is_ok());
        assert!(parse_http_url("http://example.com:8080/docs/b").is_ok());
    }

    #[tokio::test]
    async fn test_resolve_path_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PathGuard::new(dir.path()).unwrap();
        let result = resolve_path(&guard, "missing.pdf").await;
        assert!(matches!(result, Err(Error::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_resolve_path_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        let guard = PathGuard::new(dir.path()).unwrap();
        let result = resolve_path(&guard, "docs").await;
        assert!(matches!(result, Err(Error::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_resolve_path_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF-1.7 body").unwrap();
        let guard = PathGuard::new(dir.path()).unwrap();

        let resolved = resolve_path(&guard, "a.pdf").await.unwrap();
        assert_eq!(resolved.data, b"%PDF-1.7 body");
        assert_eq!(resolved.source_name, "a.pdf");
    }

    #[tokio::test]
    async fn test_resolve_url_blocks_loopback() {
        let client = reqwest::Client::new();
        let result = resolve_url(
            &client,
            "http://127.0.0.1:9/a.pdf",
            Duration::from_secs(5),
            false,
            1024,
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidUrl { .. })));
    }

    #[rstest]
    #[case("http://[::ffff:127.0.0.1]:9/a.pdf")]
    #[case("http://[::ffff:7f00:1]:9/a.pdf")]
    #[case("http://[::1]:9/a.pdf")]
    #[tokio::test]
    async fn test_resolve_url_blocks_mapped_ipv6(#[case] url: &str) {
        let client = reqwest::Client::new();
        let result = resolve_url(&client, url, Duration::from_secs(5), false, 1024).await;
        assert!(matches!(result, Err(Error::InvalidUrl { .. })), "{} should be blocked", url);
    }

    #[tokio::test]
    async fn test_redirect_target_is_checked() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start.pdf"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", "http://169.254.169.254/latest/meta-data"),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        let url = format!("{}/start.pdf", server.uri());
        let start = parse_http_url(&url).unwrap();
        let mock_port = start.port();

        // The mock server itself is on loopback; every other hop gets the real check
        let result = fetch_following_redirects(&client, &url, start, 1024, |hop| {
            let url = url.clone();
            async move {
                if hop.port() == mock_port {
                    Ok(())
                } else {
                    check_public_host(&url, &hop).await
                }
            }
        })
        .await;

        assert!(matches!(result, Err(Error::InvalidUrl { .. })));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[test]
    fn test_is_private_ip() {
        for ip in [
            "127.0.0.1",
            "10.0.0.1",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.169.254",
            "100.64.0.1",
            "0.0.0.0",
            "255.255.255.255",
            "::1",
            "::",
            "fd00::1",
            "fe80::1",
            "::ffff:127.0.0.1",
            "::ffff:169.254.169.254",
            "::ffff:10.0.0.1",
        ] {
            assert!(is_private_ip(&ip.parse().unwrap()), "{} should be private", ip);
        }

        for ip in ["8.8.8.8", "1.1.1.1", "2001:db8::1", "::ffff:8.8.8.8"] {
            assert!(!is_private_ip(&ip.parse().unwrap()), "{} should be public", ip);
        }
    }
}
