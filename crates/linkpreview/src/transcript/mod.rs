//! Transcript resolution engine
//!
//! Per source kind there is a fixed, ordered chain of providers. Each
//! provider declares whether it applies via `can_handle` and produces a
//! [`ProviderResult`] via `fetch_transcript`. Providers are tried strictly in
//! order, one at a time; chains are never raced because providers have side
//! effects (paid APIs, scrape credits). Every matching provider is appended
//! to the audit trail whether it succeeded or not, and the chain always
//! terminates: the last provider in every chain matches everything and
//! produces a structured "not implemented" result.
//!
//! Resolved transcripts are cached keyed by (URL, service, resource key);
//! a cache read short-circuits the whole chain.

mod captions;
mod fallback;
mod media;
mod podcast;
mod social;

pub use captions::CaptionsProvider;
pub use fallback::FallbackProvider;
pub use media::{
    DownloadedMedia, MediaDownloader, MediaTranscriptProvider, SpeechToText,
};
pub use podcast::{PodcastProvider, EMBED_DATA_MARKER};
pub use social::{
    mirror_rotation, SocialMirrorProvider, SocialPost, SocialReader, SocialReaderProvider,
    MIRROR_HOSTS,
};

use crate::cache::{CacheKey, CacheValue, ContentCache};
use crate::error::ProviderError;
use crate::progress::{emit, ProgressEvent, ProgressSink};
use crate::scrape::ScrapeService;
use crate::types::{
    CacheMode, CacheStatus, SourceKind, TranscriptDiagnostics, TranscriptResolution,
    TranscriptSource,
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Cache namespace for resolved transcripts
pub const TRANSCRIPT_SERVICE: &str = "transcript";

/// Managed transcript-extraction service (hosted; given a URL it returns a
/// transcript or nothing)
#[async_trait]
pub trait TranscriptService: Send + Sync {
    async fn fetch_transcript(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Option<String>, ProviderError>;
}

/// Everything a provider may need; collaborators are optional and a missing
/// one makes the dependent provider report itself unavailable
#[derive(Clone)]
pub struct ProviderContext {
    pub http: reqwest::Client,
    pub timeout: Duration,
    pub sink: Option<ProgressSink>,
    pub transcript_service: Option<Arc<dyn TranscriptService>>,
    pub downloader: Option<Arc<dyn MediaDownloader>>,
    pub speech_to_text: Vec<Arc<dyn SpeechToText>>,
    pub scrape: Option<Arc<dyn ScrapeService>>,
    pub social_reader: Option<Arc<dyn SocialReader>>,
}

impl ProviderContext {
    /// A context with no collaborators configured
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self {
            http,
            timeout,
            sink: None,
            transcript_service: None,
            downloader: None,
            speech_to_text: Vec::new(),
            scrape: None,
            social_reader: None,
        }
    }
}

/// Outcome of one provider attempt
///
/// A provider that does not apply returns a null-text result with an
/// explanatory note rather than erroring.
#[derive(Debug, Clone, Default)]
pub struct ProviderResult {
    /// Transcript text, when the provider produced one
    pub text: Option<String>,
    /// Source tag; set whenever `text` is set
    pub source: Option<TranscriptSource>,
    /// Backends the provider internally fanned out to
    pub attempted: Vec<String>,
    /// Free-form metadata (track language, backend name, ...)
    pub metadata: Option<HashMap<String, String>>,
    /// Why there is no text, when there is none
    pub note: Option<String>,
}

impl ProviderResult {
    /// A soft miss with an explanatory note
    pub fn skip(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Default::default()
        }
    }

    /// A successful resolution
    pub fn success(text: impl Into<String>, source: TranscriptSource) -> Self {
        Self {
            text: Some(text.into()),
            source: Some(source),
            ..Default::default()
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Record internal fanout
    pub fn with_attempted(mut self, attempted: Vec<String>) -> Self {
        self.attempted = attempted;
        self
    }
}

/// A single transcript-acquisition strategy
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// Stable identifier, used in the audit trail
    fn name(&self) -> &'static str;

    /// Whether this provider applies to the URL
    fn can_handle(&self, url: &Url, kind: SourceKind) -> bool;

    /// Attempt to resolve a transcript; failures are soft
    async fn fetch_transcript(&self, url: &Url, ctx: &ProviderContext) -> ProviderResult;
}

/// Classify a URL into the chain that should handle it
pub fn detect_source_kind(url: &Url) -> SourceKind {
    let host = url.host_str().unwrap_or("").to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let path = url.path().to_lowercase();

    const VIDEO_HOSTS: &[&str] = &["youtube.com", "m.youtube.com", "youtu.be", "vimeo.com"];
    const SOCIAL_HOSTS: &[&str] = &["twitter.com", "mobile.twitter.com", "x.com"];
    const PODCAST_HOSTS: &[&str] = &[
        "podcasts.apple.com",
        "overcast.fm",
        "pocketcasts.com",
        "pca.st",
    ];

    if VIDEO_HOSTS.contains(&host) {
        SourceKind::VideoPlatform
    } else if SOCIAL_HOSTS.contains(&host) {
        SourceKind::SocialPost
    } else if PODCAST_HOSTS.contains(&host)
        || path.ends_with(".rss")
        || path.ends_with(".xml")
        || path.split('/').any(|segment| segment == "feed")
    {
        SourceKind::PodcastFeed
    } else {
        SourceKind::Generic
    }
}

/// Stable per-URL resource key for the transcript cache
pub fn resource_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    // 16 hex chars is plenty: the URL itself is also part of the key.
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

/// The fixed provider chains, one per source kind
pub struct TranscriptEngine {
    video_chain: Vec<Arc<dyn TranscriptProvider>>,
    podcast_chain: Vec<Arc<dyn TranscriptProvider>>,
    social_chain: Vec<Arc<dyn TranscriptProvider>>,
    generic_chain: Vec<Arc<dyn TranscriptProvider>>,
}

impl Default for TranscriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptEngine {
    /// Build the default chains
    ///
    /// Chain order is an explicit constant: cheaper, higher-fidelity
    /// providers come first, and every chain ends with the fallback.
    pub fn new() -> Self {
        let captions: Arc<dyn TranscriptProvider> = Arc::new(CaptionsProvider::new());
        let media: Arc<dyn TranscriptProvider> = Arc::new(MediaTranscriptProvider::new());
        let podcast: Arc<dyn TranscriptProvider> = Arc::new(PodcastProvider::new());
        let social: Arc<dyn TranscriptProvider> = Arc::new(SocialReaderProvider::new());
        let mirror: Arc<dyn TranscriptProvider> = Arc::new(SocialMirrorProvider::new());
        let managed: Arc<dyn TranscriptProvider> = Arc::new(ManagedTranscriptProvider);
        let fallback: Arc<dyn TranscriptProvider> = Arc::new(FallbackProvider);

        Self {
            video_chain: vec![
                Arc::clone(&captions),
                Arc::clone(&managed),
                Arc::clone(&media),
                Arc::clone(&fallback),
            ],
            podcast_chain: vec![Arc::clone(&podcast), Arc::clone(&fallback)],
            social_chain: vec![
                Arc::clone(&social),
                Arc::clone(&mirror),
                Arc::clone(&fallback),
            ],
            generic_chain: vec![fallback],
        }
    }

    /// The chain for a source kind, in attempt order
    pub fn chain_for(&self, kind: SourceKind) -> &[Arc<dyn TranscriptProvider>] {
        match kind {
            SourceKind::VideoPlatform => &self.video_chain,
            SourceKind::PodcastFeed => &self.podcast_chain,
            SourceKind::SocialPost => &self.social_chain,
            SourceKind::Generic => &self.generic_chain,
        }
    }

    /// Run the chain for a URL, consulting the cache first
    pub async fn resolve(
        &self,
        url: &str,
        kind: SourceKind,
        ctx: &ProviderContext,
        cache: &ContentCache,
        cache_mode: CacheMode,
        ttl: Duration,
    ) -> TranscriptResolution {
        emit(
            ctx.sink.as_ref(),
            ProgressEvent::TranscriptStart {
                url: url.to_string(),
            },
        );

        let key = CacheKey::new(url, TRANSCRIPT_SERVICE, resource_key(url));
        let mut cache_status = CacheStatus::Bypassed;
        if cache_mode == CacheMode::Default {
            match cache.get(&key) {
                Some(cached) => {
                    debug!(url, "transcript cache hit");
                    let source = cached.source.unwrap_or(TranscriptSource::Captions);
                    emit(
                        ctx.sink.as_ref(),
                        ProgressEvent::TranscriptDone {
                            source: Some(source),
                        },
                    );
                    return TranscriptResolution {
                        text: Some(cached.content),
                        source: Some(source),
                        metadata: cached.metadata,
                        diagnostics: TranscriptDiagnostics {
                            cache_mode,
                            cache_status: CacheStatus::Hit,
                            text_provided: true,
                            winning_provider: None,
                            attempted_providers: Vec::new(),
                            notes: Vec::new(),
                        },
                    };
                }
                None => cache_status = CacheStatus::Miss,
            }
        }

        let mut attempted: Vec<String> = Vec::new();
        let mut notes: Vec<String> = Vec::new();

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                notes.push(format!("unparseable url: {}", err));
                return self.exhausted(ctx, cache_mode, cache_status, attempted, notes);
            }
        };

        for provider in self.chain_for(kind) {
            if !provider.can_handle(&parsed, kind) {
                continue;
            }
            attempted.push(provider.name().to_string());
            debug!(provider = provider.name(), url, "attempting transcript provider");

            let result = provider.fetch_transcript(&parsed, ctx).await;
            attempted.extend(result.attempted.iter().cloned());
            if let Some(note) = result.note {
                notes.push(format!("{}: {}", provider.name(), note));
            }

            let text = match result.text {
                Some(text) if !text.trim().is_empty() => text,
                _ => continue,
            };
            let source = result.source.unwrap_or(TranscriptSource::Captions);

            if cache_mode == CacheMode::Default {
                cache.set(
                    &key,
                    CacheValue {
                        content: text.clone(),
                        source: Some(source),
                        metadata: result.metadata.clone(),
                    },
                    ttl,
                );
            }

            emit(
                ctx.sink.as_ref(),
                ProgressEvent::TranscriptDone {
                    source: Some(source),
                },
            );
            return TranscriptResolution {
                text: Some(text),
                source: Some(source),
                metadata: result.metadata,
                diagnostics: TranscriptDiagnostics {
                    cache_mode,
                    cache_status,
                    text_provided: true,
                    winning_provider: Some(provider.name().to_string()),
                    attempted_providers: attempted,
                    notes,
                },
            };
        }

        self.exhausted(ctx, cache_mode, cache_status, attempted, notes)
    }

    fn exhausted(
        &self,
        ctx: &ProviderContext,
        cache_mode: CacheMode,
        cache_status: CacheStatus,
        attempted: Vec<String>,
        notes: Vec<String>,
    ) -> TranscriptResolution {
        emit(
            ctx.sink.as_ref(),
            ProgressEvent::TranscriptDone {
                source: Some(TranscriptSource::Unavailable),
            },
        );
        TranscriptResolution {
            text: None,
            source: Some(TranscriptSource::Unavailable),
            metadata: None,
            diagnostics: TranscriptDiagnostics {
                cache_mode,
                cache_status,
                text_provided: false,
                winning_provider: None,
                attempted_providers: attempted,
                notes,
            },
        }
    }
}

/// Chain slot for the managed transcript-extraction service
pub struct ManagedTranscriptProvider;

#[async_trait]
impl TranscriptProvider for ManagedTranscriptProvider {
    fn name(&self) -> &'static str {
        "managed-transcript"
    }

    fn can_handle(&self, _url: &Url, kind: SourceKind) -> bool {
        kind == SourceKind::VideoPlatform
    }

    async fn fetch_transcript(&self, url: &Url, ctx: &ProviderContext) -> ProviderResult {
        let service = match ctx.transcript_service.as_ref() {
            Some(service) => service,
            None => return ProviderResult::skip("transcript service not configured"),
        };
        match service.fetch_transcript(url.as_str(), ctx.timeout).await {
            Ok(Some(text)) => ProviderResult::success(text, TranscriptSource::ManagedDownload),
            Ok(None) => ProviderResult::skip("transcript service had no transcript"),
            Err(err) => ProviderResult::skip(err.to_string()),
        }
    }
}
