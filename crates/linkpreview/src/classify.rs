//! URL classification: website vs direct asset
//!
//! Plain assets (images, media files, archives, documents) skip the whole
//! HTML/transcript path. Classification first checks the URL extension, then
//! falls back to a short HEAD probe; an ambiguous or failed probe classifies
//! as a website so the pipeline gets a chance to extract something.

use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Cap on the HEAD probe, independent of the request timeout
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Content-type prefixes that mark a direct asset
const ASSET_TYPE_PREFIXES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "font/",
    "application/octet-stream",
    "application/pdf",
    "application/zip",
    "application/gzip",
    "application/x-tar",
    "application/x-rar",
    "application/x-7z",
    "application/vnd.ms-",
    "application/vnd.openxmlformats",
];

/// File extensions that mark a direct asset without any probe
const ASSET_EXTENSIONS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("mp3", "audio/mpeg"),
    ("m4a", "audio/mp4"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("flac", "audio/flac"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mov", "video/quicktime"),
    ("mkv", "video/x-matroska"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
];

/// Result of classifying a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlKind {
    /// An HTML-bearing page
    Website,
    /// A plain asset reachable by content type or extension
    DirectAsset {
        /// Best-effort content type
        content_type: String,
    },
}

/// Classify a URL as a website or a direct asset
///
/// Never fails: probe errors and timeouts default to [`UrlKind::Website`].
pub async fn classify_url(client: &Client, url: &str) -> UrlKind {
    if let Some(content_type) = asset_type_from_extension(url) {
        return UrlKind::DirectAsset {
            content_type: content_type.to_string(),
        };
    }

    let probe = client.head(url).timeout(PROBE_TIMEOUT).send();
    match probe.await {
        Ok(response) => {
            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            if is_asset_content_type(content_type) {
                UrlKind::DirectAsset {
                    content_type: content_type.to_string(),
                }
            } else {
                UrlKind::Website
            }
        }
        Err(err) => {
            tracing::debug!(url, error = %err, "HEAD probe failed, assuming website");
            UrlKind::Website
        }
    }
}

/// Check a content type against the asset prefixes
pub fn is_asset_content_type(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    ASSET_TYPE_PREFIXES.iter().any(|prefix| ct.starts_with(prefix))
}

/// Map a URL's path extension to an asset content type, if any
pub fn asset_type_from_extension(url: &str) -> Option<&'static str> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path().to_lowercase();
    let ext = path.rsplit('/').next()?.rsplit_once('.')?.1.to_string();
    ASSET_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, ct)| *ct)
}
