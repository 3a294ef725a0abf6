//! LinkPreview - content and transcript resolution for pasted links
//!
//! This crate turns a URL (or a local HTML file) into normalized,
//! length-bounded text suitable for summarization: it classifies the URL,
//! fetches and extracts the page, and for media-bearing links walks an
//! ordered chain of transcript providers until one yields text.
//!
//! ## Provider System
//!
//! Transcript resolution uses a pluggable provider system: each
//! [`SourceKind`] has a fixed, ordered chain of [`TranscriptProvider`]s that
//! the [`TranscriptEngine`] tries strictly in sequence, recording every
//! attempt in the result's diagnostics. Exhausting a chain is a normal
//! outcome (`TranscriptSource::Unavailable`), never an error.
//!
//! Built-in providers:
//! - [`CaptionsProvider`] - caption tracks published with the video page
//! - [`ManagedTranscriptProvider`] - hosted transcript-extraction service
//! - [`MediaTranscriptProvider`] - media download plus speech-to-text
//! - [`PodcastProvider`] - feed transcripts and episode enclosures
//! - [`SocialReaderProvider`] / [`SocialMirrorProvider`] - social post text

pub mod budget;
pub mod cache;
mod classify;
pub mod client;
mod convert;
mod error;
pub mod extract;
mod fetch;
pub mod progress;
mod scrape;
pub mod transcript;
mod types;

pub use budget::{apply_budget, normalize_text, BudgetedContent};
pub use cache::{CacheKey, CacheValue, CacheStats, ContentCache, DEFAULT_CACHE_BYTES};
pub use classify::{classify_url, UrlKind};
pub use client::{LinkPreview, LinkPreviewBuilder};
pub use convert::{html_to_markdown, ConvertError, ConvertInput, MarkdownConverter};
pub use error::{PreviewError, ProviderError};
pub use extract::ExtractorConfig;
pub use fetch::{build_client, fetch_html, FetchedPage};
pub use progress::{ProgressEvent, ProgressSink};
pub use scrape::{ScrapeError, ScrapeService, ScrapedMetadata, ScrapedPage};
pub use transcript::{
    detect_source_kind, CaptionsProvider, ManagedTranscriptProvider, MediaDownloader,
    MediaTranscriptProvider, PodcastProvider, SocialMirrorProvider, SocialPost, SocialReader,
    SocialReaderProvider, SpeechToText, TranscriptEngine, TranscriptProvider, TranscriptService,
};
pub use types::{
    CacheMode, CacheStatus, DetectedVideo, ExtractedLinkContent, ExtractionDiagnostics,
    ExtractionRequest, ExtractionStrategy, MarkdownMode, OutputFormat, ScrapeFallbackMode,
    SourceKind, TranscriptDiagnostics, TranscriptResolution, TranscriptSource,
    VideoTranscriptMode, DEFAULT_TIMEOUT_MS,
};

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = "Everruns LinkPreview/1.0";
