//! Social-post readers
//!
//! Two providers: a dedicated reader command (JSON in, JSON out) when one is
//! configured, and an anonymized mirror reader that rotates through a fixed
//! host list. Rotation is deterministic per URL so the same post always walks
//! mirrors in the same order; the hash only spreads load across posts.

use super::{ProviderContext, ProviderResult, TranscriptProvider};
use crate::budget::normalize_text;
use crate::error::ProviderError;
use crate::progress::{emit, ProgressEvent};
use crate::types::{SourceKind, TranscriptSource};
use async_trait::async_trait;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Fixed mirror host list, rotated deterministically per URL
pub const MIRROR_HOSTS: &[&str] = &[
    "nitter.net",
    "nitter.poast.org",
    "nitter.privacydev.net",
    "lightbrd.com",
];

/// A social post as returned by a reader
#[derive(Debug, Clone)]
pub struct SocialPost {
    pub author: Option<String>,
    pub text: String,
}

/// Dedicated social-post reader command
///
/// Contract for implementations wrapping an executable: JSON on stdin, JSON
/// on stdout; a non-zero exit or invalid JSON is a recoverable failure.
#[async_trait]
pub trait SocialReader: Send + Sync {
    fn name(&self) -> &'static str;

    async fn read_post(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Option<SocialPost>, ProviderError>;
}

/// Reader-command provider
pub struct SocialReaderProvider;

impl SocialReaderProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SocialReaderProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptProvider for SocialReaderProvider {
    fn name(&self) -> &'static str {
        "social-reader"
    }

    fn can_handle(&self, _url: &Url, kind: SourceKind) -> bool {
        kind == SourceKind::SocialPost
    }

    async fn fetch_transcript(&self, url: &Url, ctx: &ProviderContext) -> ProviderResult {
        let reader = match ctx.social_reader.as_ref() {
            Some(reader) => reader,
            None => return ProviderResult::skip("social reader not configured"),
        };

        emit(
            ctx.sink.as_ref(),
            ProgressEvent::SocialReaderStart {
                url: url.to_string(),
            },
        );
        let outcome = reader.read_post(url.as_str(), ctx.timeout).await;
        emit(
            ctx.sink.as_ref(),
            ProgressEvent::SocialReaderDone {
                succeeded: matches!(outcome, Ok(Some(_))),
            },
        );

        match outcome {
            Ok(Some(post)) => {
                let mut metadata = HashMap::new();
                if let Some(author) = post.author {
                    metadata.insert("author".to_string(), author);
                }
                ProviderResult::success(post.text, TranscriptSource::SocialReader)
                    .with_metadata(metadata)
            }
            Ok(None) => ProviderResult::skip("reader returned no post"),
            Err(err) => ProviderResult::skip(err.to_string()),
        }
    }
}

/// Anonymized mirror provider
pub struct SocialMirrorProvider {
    hosts: Vec<String>,
}

impl SocialMirrorProvider {
    pub fn new() -> Self {
        Self {
            hosts: MIRROR_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl Default for SocialMirrorProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptProvider for SocialMirrorProvider {
    fn name(&self) -> &'static str {
        "social-mirror"
    }

    fn can_handle(&self, _url: &Url, kind: SourceKind) -> bool {
        kind == SourceKind::SocialPost
    }

    async fn fetch_transcript(&self, url: &Url, ctx: &ProviderContext) -> ProviderResult {
        let mut notes: Vec<String> = Vec::new();

        for host in rotation_for(url.as_str(), &self.hosts) {
            let mut mirrored = url.clone();
            if mirrored.set_host(Some(&host)).is_err() {
                notes.push(format!("{}: bad host", host));
                continue;
            }
            debug!(mirror = %host, "trying social mirror");

            match fetch_post_text(ctx, mirrored.as_str()).await {
                Ok(Some(text)) => {
                    let mut metadata = HashMap::new();
                    metadata.insert("mirror".to_string(), host);
                    return ProviderResult::success(text, TranscriptSource::SocialReader)
                        .with_metadata(metadata);
                }
                Ok(None) => notes.push(format!("{}: no post content", host)),
                Err(note) => notes.push(format!("{}: {}", host, note)),
            }
        }

        ProviderResult::skip(notes.join("; "))
    }
}

/// Deterministic mirror rotation for a URL
///
/// Same URL, same ordered list; each host appears exactly once.
pub fn mirror_rotation(url: &str) -> Vec<String> {
    rotation_for(url, &MIRROR_HOSTS.iter().map(|h| h.to_string()).collect::<Vec<_>>())
}

fn rotation_for(url: &str, hosts: &[String]) -> Vec<String> {
    if hosts.is_empty() {
        return Vec::new();
    }
    let digest = Sha256::digest(url.as_bytes());
    let start = (digest[0] as usize) % hosts.len();
    (0..hosts.len())
        .map(|i| hosts[(start + i) % hosts.len()].clone())
        .collect()
}

/// Pull the post text out of a mirror page
async fn fetch_post_text(ctx: &ProviderContext, url: &str) -> Result<Option<String>, String> {
    let response = ctx
        .http
        .get(url)
        .timeout(ctx.timeout)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status().as_u16()));
    }
    let body = response.text().await.map_err(|e| e.to_string())?;
    Ok(extract_post_text(&body))
}

/// Mirror pages carry the post body in a content div and mirror it into the
/// social-card description; either will do.
fn extract_post_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for raw in [".tweet-content", ".main-tweet .tweet-content", "blockquote"] {
        if let Ok(selector) = Selector::parse(raw) {
            if let Some(element) = document.select(&selector).next() {
                let text = normalize_text(&element.text().collect::<Vec<_>>().join(" "));
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }

    let meta = Selector::parse(r#"meta[property="og:description"]"#).ok()?;
    document
        .select(&meta)
        .filter_map(|el| el.value().attr("content"))
        .map(normalize_text)
        .find(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_is_deterministic() {
        let url = "https://x.com/user/status/12345";
        let first = mirror_rotation(url);
        let second = mirror_rotation(url);
        assert_eq!(first, second);
        assert_eq!(first.len(), MIRROR_HOSTS.len());
    }

    #[test]
    fn test_rotation_hosts_are_unique() {
        let rotation = mirror_rotation("https://x.com/user/status/98765");
        let mut deduped = rotation.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), rotation.len());
    }

    #[test]
    fn test_rotation_preserves_cyclic_order() {
        let rotation = mirror_rotation("https://x.com/another/status/555");
        let start = MIRROR_HOSTS
            .iter()
            .position(|h| *h == rotation[0])
            .unwrap();
        for (i, host) in rotation.iter().enumerate() {
            assert_eq!(host, MIRROR_HOSTS[(start + i) % MIRROR_HOSTS.len()]);
        }
    }

    #[test]
    fn test_extract_post_text_from_content_div() {
        let html = r#"<div class="tweet-content">Hello from the post</div>"#;
        assert_eq!(
            extract_post_text(html).as_deref(),
            Some("Hello from the post")
        );
    }

    #[test]
    fn test_extract_post_text_from_og_description() {
        let html = r#"<html><head>
            <meta property="og:description" content="Post text in the card">
            </head><body></body></html>"#;
        assert_eq!(
            extract_post_text(html).as_deref(),
            Some("Post text in the card")
        );
    }

    #[test]
    fn test_extract_post_text_empty_page() {
        assert!(extract_post_text("<html><body></body></html>").is_none());
    }
}
