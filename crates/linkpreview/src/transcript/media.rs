//! Media download + speech-to-text
//!
//! Last resort for video platforms: download the audio through an opaque
//! external utility and run it through the speech-to-text escalation. The
//! downloader writes to a scratch file that is unlinked when the provider
//! returns, success or failure.

use super::{ProviderContext, ProviderResult, TranscriptProvider};
use crate::error::ProviderError;
use crate::progress::{emit, ProgressEvent};
use crate::types::{SourceKind, TranscriptSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Outcome of one media download
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    /// Media type of the downloaded file, e.g. "audio/mp4"
    pub media_type: String,
    /// Bytes written to the destination
    pub bytes_downloaded: u64,
    /// Bounded tail of the utility's stderr, for diagnostics
    pub stderr_tail: Option<String>,
}

/// Opaque external media downloader
///
/// Contract for implementations wrapping an executable: exit code 0 is
/// success, a bounded stderr tail is captured for diagnostics, and a hard
/// wall-clock timeout kills the process.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Download the media behind `url` into `dest`
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
    ) -> Result<DownloadedMedia, ProviderError>;
}

/// A speech-to-text backend, local or hosted
#[async_trait]
pub trait SpeechToText: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the backend can be attempted at all (binary present, key set)
    fn is_ready(&self) -> bool;

    /// Transcribe media bytes; `Ok(None)` means no speech was recognized
    async fn transcribe(
        &self,
        media: &[u8],
        media_type: &str,
    ) -> Result<Option<String>, ProviderError>;
}

/// Download-then-transcribe provider
pub struct MediaTranscriptProvider;

impl MediaTranscriptProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MediaTranscriptProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptProvider for MediaTranscriptProvider {
    fn name(&self) -> &'static str {
        "media-download"
    }

    fn can_handle(&self, _url: &Url, kind: SourceKind) -> bool {
        kind == SourceKind::VideoPlatform
    }

    async fn fetch_transcript(&self, url: &Url, ctx: &ProviderContext) -> ProviderResult {
        let downloader = match ctx.downloader.as_ref() {
            Some(downloader) => downloader,
            None => return ProviderResult::skip("media downloader not configured"),
        };
        if !ctx.speech_to_text.iter().any(|s| s.is_ready()) {
            return ProviderResult::skip("no speech-to-text backend is ready");
        }

        // NamedTempFile unlinks on drop, covering every exit path.
        let scratch = match tempfile::Builder::new().suffix(".media").tempfile() {
            Ok(file) => file,
            Err(err) => return ProviderResult::skip(format!("scratch file: {}", err)),
        };

        emit(
            ctx.sink.as_ref(),
            ProgressEvent::DownloadStart {
                url: url.to_string(),
            },
        );
        let media = match downloader
            .download(url.as_str(), scratch.path(), ctx.timeout)
            .await
        {
            Ok(media) => media,
            Err(err) => {
                warn!(url = %url, error = %err, "media download failed");
                return ProviderResult::skip(format!("download: {}", err));
            }
        };
        emit(
            ctx.sink.as_ref(),
            ProgressEvent::DownloadDone {
                bytes_downloaded: media.bytes_downloaded,
            },
        );

        let bytes = match tokio::fs::read(scratch.path()).await {
            Ok(bytes) => bytes,
            Err(err) => return ProviderResult::skip(format!("read scratch file: {}", err)),
        };
        debug!(bytes = bytes.len(), media_type = %media.media_type, "media downloaded");

        transcribe_with_escalation(ctx, &bytes, &media.media_type).await
    }
}

/// Try each ready speech-to-text backend in preference order
///
/// Shared with the podcast provider. Backends that are not ready are noted
/// but never attempted, so diagnostics can tell "never attempted" from
/// "attempted and failed". The first backend to return text wins.
pub(crate) async fn transcribe_with_escalation(
    ctx: &ProviderContext,
    media: &[u8],
    media_type: &str,
) -> ProviderResult {
    let mut attempted: Vec<String> = Vec::new();
    let mut notes: Vec<String> = Vec::new();

    for backend in &ctx.speech_to_text {
        if !backend.is_ready() {
            notes.push(format!("{} not ready", backend.name()));
            continue;
        }
        attempted.push(backend.name().to_string());
        emit(
            ctx.sink.as_ref(),
            ProgressEvent::SpeechToTextStart {
                provider: backend.name().to_string(),
                estimated_seconds: None,
            },
        );

        match backend.transcribe(media, media_type).await {
            Ok(Some(text)) if !text.trim().is_empty() => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), backend.name().to_string());
                return ProviderResult::success(text, TranscriptSource::SpeechToText)
                    .with_metadata(metadata)
                    .with_attempted(attempted);
            }
            Ok(_) => notes.push(format!("{} recognized no speech", backend.name())),
            Err(err) => {
                warn!(backend = backend.name(), error = %err, "speech-to-text failed");
                notes.push(format!("{}: {}", backend.name(), err));
            }
        }
    }

    let note = if notes.is_empty() {
        "no speech-to-text backend configured".to_string()
    } else {
        notes.join("; ")
    };
    ProviderResult {
        note: Some(note),
        attempted,
        ..Default::default()
    }
}
