//! Podcast feeds and embedded players
//!
//! Locates an audio enclosure in an RSS feed or an embedded-player JSON
//! blob. A host-published transcript is preferred; otherwise the enclosure is
//! downloaded and fed through the speech-to-text escalation. Embed pages that
//! look bot-blocked are re-fetched through the managed scrape service, except
//! when the page carries the known embedded-data marker (some players ship a
//! challenge-looking shell with the real payload inline).

use super::media::transcribe_with_escalation;
use super::{ProviderContext, ProviderResult, TranscriptProvider};
use crate::budget::normalize_text;
use crate::extract::{looks_bot_blocked, BOT_CHALLENGE_MARKERS};
use crate::progress::{emit, ProgressEvent};
use crate::types::{CacheMode, SourceKind, TranscriptSource};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, warn};
use url::Url;

/// Embedded-data marker that overrides a bot-challenge verdict
pub const EMBED_DATA_MARKER: &str = "window.__PLAYER_DATA__";

fn enclosure_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<enclosure[^>]*\burl="([^"]+)""#).expect("static regex"))
}

fn feed_transcript_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<podcast:transcript[^>]*\burl="([^"]+)""#).expect("static regex")
    })
}

fn embed_audio_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""(?:audioUrl|audio_url|enclosureUrl|enclosure_url)"\s*:\s*"([^"]+)""#)
            .expect("static regex")
    })
}

fn markup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("static regex"))
}

/// Feed and embedded-player provider
pub struct PodcastProvider;

impl PodcastProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PodcastProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptProvider for PodcastProvider {
    fn name(&self) -> &'static str {
        "podcast-feed"
    }

    fn can_handle(&self, _url: &Url, kind: SourceKind) -> bool {
        kind == SourceKind::PodcastFeed
    }

    async fn fetch_transcript(&self, url: &Url, ctx: &ProviderContext) -> ProviderResult {
        let body = match fetch_body(ctx, url.as_str()).await {
            Ok(body) => body,
            Err(note) => return ProviderResult::skip(note),
        };

        if is_feed(&body) {
            resolve_from_feed(ctx, &body).await
        } else {
            resolve_from_embed_page(ctx, url, body).await
        }
    }
}

fn is_feed(body: &str) -> bool {
    let head: String = body.chars().take(512).collect::<String>().to_lowercase();
    head.contains("<rss") || head.contains("<feed")
}

async fn resolve_from_feed(ctx: &ProviderContext, feed: &str) -> ProviderResult {
    // A transcript published by the host beats transcribing the audio.
    if let Some(captures) = feed_transcript_re().captures(feed) {
        let transcript_url = decode_xml_url(&captures[1]);
        debug!(url = %transcript_url, "feed publishes a transcript");
        match fetch_body(ctx, &transcript_url).await {
            Ok(body) => {
                let text = normalize_text(&markup_re().replace_all(&body, " "));
                if !text.is_empty() {
                    let mut metadata = HashMap::new();
                    metadata.insert("transcript_url".to_string(), transcript_url);
                    return ProviderResult::success(text, TranscriptSource::FeedEmbed)
                        .with_metadata(metadata);
                }
            }
            Err(note) => warn!(%note, "published transcript fetch failed"),
        }
    }

    let enclosure_url = match enclosure_re().captures(feed) {
        Some(captures) => decode_xml_url(&captures[1]),
        None => return ProviderResult::skip("feed has no enclosure"),
    };

    transcribe_enclosure(ctx, &enclosure_url).await
}

async fn resolve_from_embed_page(
    ctx: &ProviderContext,
    url: &Url,
    mut body: String,
) -> ProviderResult {
    let default_markers: Vec<String> =
        BOT_CHALLENGE_MARKERS.iter().map(|s| s.to_string()).collect();
    let blocked = looks_bot_blocked(&body, &default_markers) && !body.contains(EMBED_DATA_MARKER);

    if blocked {
        let Some(scrape) = ctx.scrape.as_ref() else {
            return ProviderResult::skip("embed page looks bot-blocked and no scrape service");
        };
        emit(
            ctx.sink.as_ref(),
            ProgressEvent::ScrapeFallbackStart {
                url: url.to_string(),
            },
        );
        match scrape
            .scrape(url.as_str(), CacheMode::Default, ctx.timeout)
            .await
        {
            Ok(Some(page)) if page.html.is_some() => {
                emit(ctx.sink.as_ref(), ProgressEvent::ScrapeFallbackDone { succeeded: true });
                body = page.html.unwrap_or_default();
            }
            Ok(_) => {
                emit(ctx.sink.as_ref(), ProgressEvent::ScrapeFallbackDone { succeeded: false });
                return ProviderResult::skip("embed page blocked; scrape had no html");
            }
            Err(err) => {
                emit(ctx.sink.as_ref(), ProgressEvent::ScrapeFallbackDone { succeeded: false });
                return ProviderResult::skip(format!("embed page blocked; scrape failed: {}", err));
            }
        }
    }

    let audio_url = match embed_audio_re().captures(&body) {
        Some(captures) => captures[1].replace("\\/", "/"),
        None => return ProviderResult::skip("no embedded audio found on page"),
    };

    transcribe_enclosure(ctx, &audio_url).await
}

/// Download an audio URL over plain HTTP and run the escalation
async fn transcribe_enclosure(ctx: &ProviderContext, audio_url: &str) -> ProviderResult {
    emit(
        ctx.sink.as_ref(),
        ProgressEvent::DownloadStart {
            url: audio_url.to_string(),
        },
    );

    let response = match ctx.http.get(audio_url).timeout(ctx.timeout).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            return ProviderResult::skip(format!(
                "enclosure fetch: HTTP {}",
                response.status().as_u16()
            ));
        }
        Err(err) => return ProviderResult::skip(format!("enclosure fetch: {}", err)),
    };

    let media_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("audio/mpeg")
        .to_string();
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => return ProviderResult::skip(format!("enclosure read: {}", err)),
    };
    emit(
        ctx.sink.as_ref(),
        ProgressEvent::DownloadDone {
            bytes_downloaded: bytes.len() as u64,
        },
    );

    let mut result = transcribe_with_escalation(ctx, &bytes, &media_type).await;
    if result.text.is_some() {
        let metadata = result.metadata.get_or_insert_with(HashMap::new);
        metadata.insert("enclosure_url".to_string(), audio_url.to_string());
    }
    result
}

async fn fetch_body(ctx: &ProviderContext, url: &str) -> Result<String, String> {
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
    response.text().await.map_err(|e| e.to_string())
}

fn decode_xml_url(url: &str) -> String {
    url.replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_feed() {
        assert!(is_feed("<?xml version=\"1.0\"?><rss version=\"2.0\">"));
        assert!(is_feed("<feed xmlns=\"http://www.w3.org/2005/Atom\">"));
        assert!(!is_feed("<!DOCTYPE html><html><body>player</body></html>"));
    }

    #[test]
    fn test_enclosure_extraction() {
        let feed = r#"<rss><channel><item>
            <enclosure url="https://cdn.example.com/ep1.mp3&amp;x=1" type="audio/mpeg" length="123"/>
        </item></channel></rss>"#;
        let captures = enclosure_re().captures(feed).unwrap();
        assert_eq!(
            decode_xml_url(&captures[1]),
            "https://cdn.example.com/ep1.mp3&x=1"
        );
    }

    #[test]
    fn test_feed_transcript_extraction() {
        let feed = r#"<rss><channel><item>
            <podcast:transcript url="https://example.com/ep1.txt" type="text/plain"/>
        </item></channel></rss>"#;
        let captures = feed_transcript_re().captures(feed).unwrap();
        assert_eq!(&captures[1], "https://example.com/ep1.txt");
    }

    #[test]
    fn test_embed_audio_extraction() {
        let page = r#"<script>window.__PLAYER_DATA__ = {"audioUrl":"https:\/\/cdn.example.com\/ep.m4a"}</script>"#;
        let captures = embed_audio_re().captures(page).unwrap();
        assert_eq!(
            captures[1].replace("\\/", "/"),
            "https://cdn.example.com/ep.m4a"
        );
    }

    #[test]
    fn test_marker_overrides_block_verdict() {
        let markers: Vec<String> = BOT_CHALLENGE_MARKERS.iter().map(|s| s.to_string()).collect();
        let page = format!(
            "<html>verify you are human <script>{} = {{}}</script></html>",
            EMBED_DATA_MARKER
        );
        assert!(looks_bot_blocked(&page, &markers));
        assert!(page.contains(EMBED_DATA_MARKER));
    }
}
