//! Platform-native caption tracks
//!
//! Cheapest and highest-fidelity source: the watch page embeds a caption
//! track listing as a JSON blob. We scan for it, pick a track (preferring an
//! English one), fetch the timed-text document, and strip it down to plain
//! text. Any miss along the way is a soft skip.

use super::{ProviderContext, ProviderResult, TranscriptProvider};
use crate::budget::normalize_text;
use crate::types::{SourceKind, TranscriptSource};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

/// One entry of the embedded caption-track listing
#[derive(Debug, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode", default)]
    language_code: Option<String>,
}

fn track_listing_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""captionTracks"\s*:\s*(\[[^\]]*\])"#).expect("static regex"))
}

fn markup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("static regex"))
}

/// Caption-track provider for video platform pages
pub struct CaptionsProvider;

impl CaptionsProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CaptionsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptProvider for CaptionsProvider {
    fn name(&self) -> &'static str {
        "captions"
    }

    fn can_handle(&self, _url: &Url, kind: SourceKind) -> bool {
        kind == SourceKind::VideoPlatform
    }

    async fn fetch_transcript(&self, url: &Url, ctx: &ProviderContext) -> ProviderResult {
        let page = match fetch_text(ctx, url.as_str()).await {
            Ok(page) => page,
            Err(note) => return ProviderResult::skip(note),
        };

        let tracks = match parse_caption_tracks(&page) {
            Some(tracks) if !tracks.is_empty() => tracks,
            _ => return ProviderResult::skip("no caption tracks on page"),
        };

        let track = pick_track(&tracks);
        let track_url = track.base_url.replace("\\u0026", "&");
        debug!(lang = ?track.language_code, "fetching caption track");

        let timed_text = match fetch_text(ctx, &track_url).await {
            Ok(body) => body,
            Err(note) => return ProviderResult::skip(format!("caption track fetch: {}", note)),
        };

        let text = strip_timed_text(&timed_text);
        if text.is_empty() {
            return ProviderResult::skip("caption track was empty");
        }

        let mut metadata = HashMap::new();
        if let Some(lang) = &track.language_code {
            metadata.insert("language".to_string(), lang.clone());
        }
        ProviderResult::success(text, TranscriptSource::Captions).with_metadata(metadata)
    }
}

async fn fetch_text(ctx: &ProviderContext, url: &str) -> Result<String, String> {
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

fn parse_caption_tracks(page: &str) -> Option<Vec<CaptionTrack>> {
    let captures = track_listing_re().captures(page)?;
    serde_json::from_str(captures.get(1)?.as_str()).ok()
}

/// First English track, else the first track
fn pick_track(tracks: &[CaptionTrack]) -> &CaptionTrack {
    tracks
        .iter()
        .find(|t| {
            t.language_code
                .as_deref()
                .map(|l| l.starts_with("en"))
                .unwrap_or(false)
        })
        .unwrap_or(&tracks[0])
}

/// Reduce a timed-text XML document to plain text
fn strip_timed_text(xml: &str) -> String {
    let stripped = markup_re().replace_all(xml, " ");
    normalize_text(&stripped)
}
