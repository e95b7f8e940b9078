//! Remote image sideloading.
//!
//! Fetches an image over HTTP, checks it is really an image of acceptable
//! size, and stores it under the media directory named by its SHA-256.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::redirect::Policy;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use url::Url;

use pageforge_shared::{MediaConfig, MediaRef, PageForgeError, Result};

/// User-Agent string for media requests.
const USER_AGENT: &str = concat!("PageForge/", env!("CARGO_PKG_VERSION"));

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 5;

/// Source of media files for featured images.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch `url` and return a reference to the stored file.
    async fn fetch(&self, url: &str) -> Result<MediaRef>;
}

// ---------------------------------------------------------------------------
// Sideloader
// ---------------------------------------------------------------------------

/// HTTP image fetcher writing into a local media directory.
pub struct Sideloader {
    client: Client,
    media_dir: PathBuf,
    max_bytes: u64,
    /// Allow localhost/private IPs (integration tests, intranet CDNs).
    allow_private_hosts: bool,
}

impl Sideloader {
    pub fn new(config: &MediaConfig, media_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs, config.allow_private_hosts)?,
            media_dir,
            max_bytes: config.max_bytes,
            allow_private_hosts: config.allow_private_hosts,
        })
    }

    /// Download `raw_url` into the media directory.
    #[instrument(skip(self), fields(max_bytes = self.max_bytes))]
    pub async fn sideload(&self, raw_url: &str) -> Result<MediaRef> {
        let url = Url::parse(raw_url)
            .map_err(|e| PageForgeError::Media(format!("invalid image URL '{raw_url}': {e}")))?;

        if !self.allow_private_hosts && is_ssrf_target(&url) {
            return Err(PageForgeError::Media(format!(
                "refusing to fetch private or non-http URL: {url}"
            )));
        }

        debug!(%url, "fetching image");
        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_redirect() {
                    PageForgeError::Media(format!("{url}: {e}"))
                } else {
                    PageForgeError::Network(format!("{url}: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageForgeError::Network(format!("{url}: HTTP {status}")));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
            .unwrap_or_default();
        let Some(extension) = extension_for(&mime_type) else {
            return Err(PageForgeError::Media(format!(
                "{url}: unsupported content type '{mime_type}'"
            )));
        };

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(PageForgeError::Media(format!(
                    "{url}: {len} bytes exceeds limit of {}",
                    self.max_bytes
                )));
            }
        }

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| PageForgeError::Network(format!("{url}: body read failed: {e}")))?
        {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(PageForgeError::Media(format!(
                    "{url}: body exceeds limit of {} bytes",
                    self.max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(PageForgeError::Media(format!("{url}: empty body")));
        }

        let sha256 = compute_hash(&bytes);
        let stored_name = format!("{sha256}.{extension}");
        let file_path = self.media_dir.join(&stored_name);

        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .map_err(|e| PageForgeError::io(&self.media_dir, e))?;
        if tokio::fs::try_exists(&file_path).await.unwrap_or(false) {
            debug!(path = %file_path.display(), "identical file already stored");
        } else {
            tokio::fs::write(&file_path, &bytes)
                .await
                .map_err(|e| PageForgeError::io(&file_path, e))?;
        }

        info!(path = %file_path.display(), bytes = bytes.len(), "image sideloaded");

        Ok(MediaRef {
            file_path: file_path.display().to_string(),
            file_name: source_file_name(&url).unwrap_or(stored_name),
            mime_type,
            sha256,
            source_url: url.to_string(),
            byte_len: bytes.len() as u64,
        })
    }
}

#[async_trait]
impl MediaFetcher for Sideloader {
    async fn fetch(&self, url: &str) -> Result<MediaRef> {
        self.sideload(url).await
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

fn build_client(timeout_secs: u64, allow_private_hosts: bool) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(Policy::custom(move |attempt| {
            match check_redirect(attempt.url(), attempt.previous().len(), allow_private_hosts) {
                Ok(()) => attempt.follow(),
                Err(reason) => attempt.error(reason),
            }
        }))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PageForgeError::Network(format!("failed to build HTTP client: {e}")))
}

/// Decide whether a redirect to `target` may be followed after `hops`
/// earlier requests. Every hop gets the same host check as the first URL.
fn check_redirect(
    target: &Url,
    hops: usize,
    allow_private_hosts: bool,
) -> std::result::Result<(), String> {
    if hops > MAX_REDIRECTS {
        return Err(format!("too many redirects (limit {MAX_REDIRECTS})"));
    }
    if !allow_private_hosts && is_ssrf_target(target) {
        return Err(format!("redirect to private or non-http URL refused: {target}"));
    }
    Ok(())
}

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local, fe80::/10 link local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                // ::ffff:a.b.c.d reaches the IPv4 host
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// File extension for accepted image MIME types. SVG is refused.
fn extension_for(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/avif" => Some("avif"),
        _ => None,
    }
}

/// Last path segment of the source URL, if it has one.
fn source_file_name(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Compute SHA-256 hash of file bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

    fn test_sideloader(max_bytes: u64) -> (Sideloader, PathBuf) {
        let dir = std::env::temp_dir().join(format!("pf-media-test-{}", Uuid::now_v7()));
        let config = MediaConfig {
            timeout_secs: 5,
            max_bytes,
            allow_private_hosts: true,
        };
        let loader = Sideloader::new(&config, dir.clone()).unwrap();
        (loader, dir)
    }

    #[test]
    fn test_compute_hash() {
        let hash = compute_hash(b"hello world");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_ssrf_blocks_private_and_local() {
        for raw in [
            "file:///etc/passwd",
            "http://192.168.1.1/a.png",
            "http://10.0.0.1/",
            "http://127.0.0.1:8080/",
            "http://localhost/a.png",
            "http://[::1]/a.png",
            "http://metadata.internal/",
            "http://[::ffff:127.0.0.1]/a.png",
            "http://[::ffff:169.254.169.254]/latest",
            "http://[::ffff:10.1.2.3]/",
        ] {
            let url = Url::parse(raw).unwrap();
            assert!(is_ssrf_target(&url), "{raw} should be blocked");
        }
    }

    #[test]
    fn test_ssrf_allows_public() {
        let url = Url::parse("https://cdn.example.com/img/hero.png").unwrap();
        assert!(!is_ssrf_target(&url));
    }

    #[test]
    fn test_ssrf_allows_public_mapped_v6() {
        let url = Url::parse("http://[::ffff:93.184.216.34]/a.png").unwrap();
        assert!(!is_ssrf_target(&url));
    }

    #[test]
    fn test_redirect_hops_are_checked() {
        let public = Url::parse("https://cdn.example.com/a.png").unwrap();
        let metadata = Url::parse("http://169.254.169.254/latest/meta-data").unwrap();
        let mapped = Url::parse("http://[::ffff:127.0.0.1]/a.png").unwrap();

        assert!(check_redirect(&public, 1, false).is_ok());
        assert!(check_redirect(&metadata, 1, false).is_err());
        assert!(check_redirect(&mapped, 1, false).is_err());
        assert!(check_redirect(&metadata, 1, true).is_ok());
        assert!(check_redirect(&public, MAX_REDIRECTS + 1, true).is_err());
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/svg+xml"), None);
        assert_eq!(extension_for("text/html"), None);
    }

    #[tokio::test]
    async fn test_sideload_stores_by_hash() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/hero.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PNG.to_vec(), "image/png"))
            .mount(&server)
            .await;

        let (loader, dir) = test_sideloader(1024);
        let url = format!("{}/img/hero.png", server.uri());
        let media = loader.sideload(&url).await.expect("sideload");

        assert_eq!(media.file_name, "hero.png");
        assert_eq!(media.mime_type, "image/png");
        assert_eq!(media.byte_len, PNG.len() as u64);
        assert_eq!(media.sha256, compute_hash(PNG));
        assert!(media.file_path.ends_with(&format!("{}.png", media.sha256)));
        assert_eq!(std::fs::read(&media.file_path).unwrap(), PNG);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_sideload_rejects_non_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;

        let (loader, _dir) = test_sideloader(1024);
        let err = loader
            .sideload(&format!("{}/page", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported content type"));
    }

    #[tokio::test]
    async fn test_sideload_enforces_size_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 4096], "image/png"))
            .mount(&server)
            .await;

        let (loader, _dir) = test_sideloader(1024);
        let err = loader
            .sideload(&format!("{}/big.png", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[tokio::test]
    async fn test_sideload_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (loader, _dir) = test_sideloader(1024);
        let err = loader
            .sideload(&format!("{}/missing.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, PageForgeError::Network(_)));
    }

    #[tokio::test]
    async fn test_private_host_blocked_by_default() {
        let config = MediaConfig {
            timeout_secs: 5,
            max_bytes: 1024,
            allow_private_hosts: false,
        };
        let loader = Sideloader::new(&config, std::env::temp_dir()).unwrap();
        let err = loader
            .sideload("http://127.0.0.1:9/a.png")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("refusing"));
    }

    #[tokio::test]
    async fn test_redirect_to_private_host_is_not_followed() {
        let server = MockServer::start().await;
        let port = server.address().port();
        Mock::given(method("GET"))
            .and(path("/hop.png"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("http://localhost:{port}/secret.png")),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/secret.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PNG.to_vec(), "image/png"))
            .expect(0)
            .mount(&server)
            .await;

        // The first hop passes as if it were public; the redirect must not.
        let config = MediaConfig {
            timeout_secs: 5,
            max_bytes: 1024,
            allow_private_hosts: false,
        };
        let loader = Sideloader {
            client: build_client(config.timeout_secs, false).unwrap(),
            media_dir: std::env::temp_dir(),
            max_bytes: config.max_bytes,
            allow_private_hosts: true,
        };
        let err = loader
            .sideload(&format!("{}/hop.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, PageForgeError::Media(_)), "{err}");
        assert!(err.to_string().contains("redirect"));
    }

    #[tokio::test]
    async fn test_redirect_within_allowed_hosts_is_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old.png"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new.png"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PNG.to_vec(), "image/png"))
            .mount(&server)
            .await;

        let (loader, dir) = test_sideloader(1024);
        let media = loader
            .sideload(&format!("{}/old.png", server.uri()))
            .await
            .expect("sideload");
        assert_eq!(media.sha256, compute_hash(PNG));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
