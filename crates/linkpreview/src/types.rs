//! Core types for the link preview pipeline

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Desired output format for extracted content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text segments
    #[default]
    Text,
    /// Markdown output
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err("Invalid format: must be text or markdown".to_string()),
        }
    }
}

/// When to invoke the managed scrape fallback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeFallbackMode {
    /// Never scrape
    Off,
    /// Scrape when direct extraction is thin or the page looks bot-blocked
    #[default]
    Auto,
    /// Always scrape, skipping direct extraction
    Always,
}

impl FromStr for ScrapeFallbackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(ScrapeFallbackMode::Off),
            "auto" => Ok(ScrapeFallbackMode::Auto),
            "always" => Ok(ScrapeFallbackMode::Always),
            _ => Err("Invalid scrape mode: must be off, auto, or always".to_string()),
        }
    }
}

/// How markdown output is produced when [`OutputFormat::Markdown`] is requested
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MarkdownMode {
    /// Markdown disabled; fall back to plain text segments
    Off,
    /// Reuse scrape markdown, else the configured converter, else readability
    #[default]
    Auto,
    /// Require the external HTML-to-markdown converter
    Llm,
    /// Local readability-style conversion only
    Readability,
}

impl FromStr for MarkdownMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(MarkdownMode::Off),
            "auto" => Ok(MarkdownMode::Auto),
            "llm" => Ok(MarkdownMode::Llm),
            "readability" => Ok(MarkdownMode::Readability),
            _ => Err("Invalid markdown mode: must be off, auto, llm, or readability".to_string()),
        }
    }
}

/// Whether transcript resolution runs for media-bearing pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VideoTranscriptMode {
    /// Skip the transcript chain entirely
    Off,
    /// Resolve transcripts for media-bearing sources
    #[default]
    Auto,
}

impl FromStr for VideoTranscriptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(VideoTranscriptMode::Off),
            "auto" => Ok(VideoTranscriptMode::Auto),
            _ => Err("Invalid transcript mode: must be off or auto".to_string()),
        }
    }
}

/// Cache behavior for a single request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Read and write the shared cache
    #[default]
    Default,
    /// Skip reads and writes; existing entries are untouched
    Bypass,
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(CacheMode::Default),
            "bypass" => Ok(CacheMode::Bypass),
            _ => Err("Invalid cache mode: must be default or bypass".to_string()),
        }
    }
}

/// Default per-request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Request to extract content from a URL or local file
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionRequest {
    /// The URL or local file path to extract (required)
    pub url: String,

    /// Desired output format (default text)
    #[serde(default)]
    pub format: OutputFormat,

    /// Scrape-fallback mode (default auto)
    #[serde(default)]
    pub scrape_fallback: ScrapeFallbackMode,

    /// Markdown conversion mode (default auto)
    #[serde(default)]
    pub markdown_mode: MarkdownMode,

    /// Transcript resolution mode (default auto)
    #[serde(default)]
    pub video_transcripts: VideoTranscriptMode,

    /// Cache mode (default: read and write)
    #[serde(default)]
    pub cache_mode: CacheMode,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum characters in the final content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chars: Option<usize>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ExtractionRequest {
    /// Create a new request with the given URL and defaults
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: OutputFormat::default(),
            scrape_fallback: ScrapeFallbackMode::default(),
            markdown_mode: MarkdownMode::default(),
            video_transcripts: VideoTranscriptMode::default(),
            cache_mode: CacheMode::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_chars: None,
        }
    }

    /// Set the output format
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the scrape-fallback mode
    pub fn scrape_fallback(mut self, mode: ScrapeFallbackMode) -> Self {
        self.scrape_fallback = mode;
        self
    }

    /// Set the markdown mode
    pub fn markdown_mode(mut self, mode: MarkdownMode) -> Self {
        self.markdown_mode = mode;
        self
    }

    /// Set the transcript mode
    pub fn video_transcripts(mut self, mode: VideoTranscriptMode) -> Self {
        self.video_transcripts = mode;
        self
    }

    /// Set the cache mode
    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    /// Set the per-call timeout
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the character budget
    pub fn max_chars(mut self, max: usize) -> Self {
        self.max_chars = Some(max);
        self
    }

    /// Per-call timeout as a [`std::time::Duration`]
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ExtractionRequest {
    fn default() -> Self {
        Self::new("")
    }
}

/// Where a resolved transcript came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriptSource {
    /// Platform-native caption tracks
    Captions,
    /// Managed transcript-extraction service
    ManagedDownload,
    /// Downloaded media transcribed by a speech-to-text backend
    SpeechToText,
    /// Transcript or audio located via an RSS feed or embedded player
    FeedEmbed,
    /// Social-post reader output
    SocialReader,
    /// Chain exhausted without text
    Unavailable,
}

impl std::fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TranscriptSource::Captions => "captions",
            TranscriptSource::ManagedDownload => "managed-download",
            TranscriptSource::SpeechToText => "speech-to-text",
            TranscriptSource::FeedEmbed => "feed-embed",
            TranscriptSource::SocialReader => "social-reader",
            TranscriptSource::Unavailable => "unavailable",
        };
        write!(f, "{}", s)
    }
}

/// Broad shape of the source URL, used to pick a transcript chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// YouTube-like video platform page
    VideoPlatform,
    /// Podcast RSS feed or embedded-player page
    PodcastFeed,
    /// Social post
    SocialPost,
    /// Anything else
    Generic,
}

/// A media source detected on or as the requested page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DetectedVideo {
    /// What kind of source this is
    pub kind: SourceKind,
    /// The media URL
    pub url: String,
}

/// Which extraction strategy produced the content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    /// Direct DOM parse of the fetched page
    Html,
    /// Managed scrape fallback output
    Scrape,
    /// Direct asset short-circuit; no HTML was parsed
    Asset,
}

/// Cache interaction outcome for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from the cache
    Hit,
    /// Looked up, not found (or expired)
    Miss,
    /// Cache disabled for this request
    Bypassed,
}

/// Audit record for one transcript resolution
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptDiagnostics {
    /// Cache mode the request ran with
    pub cache_mode: CacheMode,
    /// Whether the cache was hit, missed, or bypassed
    pub cache_status: CacheStatus,
    /// True when the resolution produced text
    pub text_provided: bool,
    /// Provider that produced the winning result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_provider: Option<String>,
    /// Every provider whose `can_handle` matched, in chain order
    pub attempted_providers: Vec<String>,
    /// Free-text notes from skipped or failed providers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Outcome of running a transcript chain
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptResolution {
    /// The transcript text, when any provider produced one
    pub text: Option<String>,
    /// Where the text came from; `Unavailable` when the chain was exhausted.
    /// Non-null whenever `text` is non-null.
    pub source: Option<TranscriptSource>,
    /// Free-form provider metadata (track language, model name, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    /// Audit trail
    pub diagnostics: TranscriptDiagnostics,
}

/// Diagnostics for one extraction request
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionDiagnostics {
    /// Strategy that produced the content
    pub strategy: ExtractionStrategy,
    /// Whether the managed scrape fallback ran and was used
    pub scrape_fallback_used: bool,
    /// Whether markdown conversion ran
    pub markdown_converted: bool,
    /// Transcript audit trail, when the transcript chain ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<TranscriptDiagnostics>,
}

/// Normalized, length-bounded content extracted from one URL
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedLinkContent {
    /// Final URL after redirects
    pub url: String,
    /// Page title, if any
    pub title: Option<String>,
    /// Page description, if any
    pub description: Option<String>,
    /// Site name (social-card tag or hostname fallback)
    pub site_name: Option<String>,
    /// Normalized content, within budget
    pub content: String,
    /// True when the budget clipped the content
    pub truncated: bool,
    /// Character count of the content before budgeting
    pub total_characters: usize,
    /// Word count of the final (possibly clipped) content
    pub word_count: usize,
    /// Character count of the resolved transcript, if one was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_characters: Option<usize>,
    /// Where the transcript came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_source: Option<TranscriptSource>,
    /// Specific backend that transcribed the media, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_provider: Option<String>,
    /// Free-form transcript metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_metadata: Option<HashMap<String, String>>,
    /// Primary media source detected for this page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_video: Option<DetectedVideo>,
    /// True when the page itself carried no substantial text
    pub is_video_only: bool,
    /// What the pipeline actually did
    pub diagnostics: ExtractionDiagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = ExtractionRequest::new("https://example.com")
            .format(OutputFormat::Markdown)
            .scrape_fallback(ScrapeFallbackMode::Always)
            .cache_mode(CacheMode::Bypass)
            .timeout_ms(5_000)
            .max_chars(1_000);
        assert_eq!(req.url, "https://example.com");
        assert_eq!(req.format, OutputFormat::Markdown);
        assert_eq!(req.scrape_fallback, ScrapeFallbackMode::Always);
        assert_eq!(req.cache_mode, CacheMode::Bypass);
        assert_eq!(req.timeout_ms, 5_000);
        assert_eq!(req.max_chars, Some(1_000));
    }

    #[test]
    fn test_request_defaults() {
        let req = ExtractionRequest::new("https://example.com");
        assert_eq!(req.format, OutputFormat::Text);
        assert_eq!(req.scrape_fallback, ScrapeFallbackMode::Auto);
        assert_eq!(req.markdown_mode, MarkdownMode::Auto);
        assert_eq!(req.cache_mode, CacheMode::Default);
        assert_eq!(req.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(req.max_chars.is_none());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("markdown".parse::<OutputFormat>(), Ok(OutputFormat::Markdown));
        assert_eq!("md".parse::<OutputFormat>(), Ok(OutputFormat::Markdown));
        assert_eq!(
            "always".parse::<ScrapeFallbackMode>(),
            Ok(ScrapeFallbackMode::Always)
        );
        assert_eq!("bypass".parse::<CacheMode>(), Ok(CacheMode::Bypass));
        assert!("nope".parse::<MarkdownMode>().is_err());
    }

    #[test]
    fn test_transcript_source_serde_names() {
        let json = serde_json::to_string(&TranscriptSource::ManagedDownload).unwrap();
        assert_eq!(json, "\"managed-download\"");
        let json = serde_json::to_string(&TranscriptSource::SpeechToText).unwrap();
        assert_eq!(json, "\"speech-to-text\"");
    }
}
