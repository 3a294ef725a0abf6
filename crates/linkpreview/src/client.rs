//! Link preview client
//!
//! The façade composing the whole pipeline: classify, fetch, select an
//! extraction strategy, optionally resolve a transcript, budget. One call in,
//! one structured result (or one typed fetch error) out.

use crate::budget::{apply_budget, normalize_text};
use crate::cache::{CacheKey, CacheValue, ContentCache, PAGE_CONTENT_TTL, TRANSCRIPT_TTL};
use crate::classify::{classify_url, UrlKind};
use crate::convert::MarkdownConverter;
use crate::error::PreviewError;
use crate::extract::{extract_page, ExtractorConfig, PageMetadata};
use crate::fetch::{build_client, fetch_html, FetchedPage};
use crate::progress::ProgressSink;
use crate::scrape::ScrapeService;
use crate::transcript::{
    detect_source_kind, MediaDownloader, ProviderContext, SocialReader, SpeechToText,
    TranscriptEngine, TranscriptService,
};
use crate::types::{
    CacheMode, DetectedVideo, ExtractedLinkContent, ExtractionDiagnostics, ExtractionRequest,
    ExtractionStrategy, SourceKind, TranscriptResolution, VideoTranscriptMode,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Cache namespace for assembled page results
const PAGE_SERVICE: &str = "page";

/// The link preview pipeline
///
/// Construct once per process via [`LinkPreview::builder`], share by
/// reference; the cache handle inside is shared state for all callers.
pub struct LinkPreview {
    http: reqwest::Client,
    cache: Arc<ContentCache>,
    engine: TranscriptEngine,
    extractor: ExtractorConfig,
    sink: Option<ProgressSink>,
    scrape: Option<Arc<dyn ScrapeService>>,
    converter: Option<Arc<dyn MarkdownConverter>>,
    transcript_service: Option<Arc<dyn TranscriptService>>,
    downloader: Option<Arc<dyn MediaDownloader>>,
    speech_to_text: Vec<Arc<dyn SpeechToText>>,
    social_reader: Option<Arc<dyn SocialReader>>,
    transcript_ttl: Duration,
}

/// Builder for [`LinkPreview`]
#[derive(Default)]
pub struct LinkPreviewBuilder {
    user_agent: Option<String>,
    cache: Option<Arc<ContentCache>>,
    extractor: Option<ExtractorConfig>,
    sink: Option<ProgressSink>,
    scrape: Option<Arc<dyn ScrapeService>>,
    converter: Option<Arc<dyn MarkdownConverter>>,
    transcript_service: Option<Arc<dyn TranscriptService>>,
    downloader: Option<Arc<dyn MediaDownloader>>,
    speech_to_text: Vec<Arc<dyn SpeechToText>>,
    social_reader: Option<Arc<dyn SocialReader>>,
    transcript_ttl: Option<Duration>,
}

impl LinkPreviewBuilder {
    /// Custom User-Agent for all outgoing requests
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Share an existing cache handle
    pub fn cache(mut self, cache: Arc<ContentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Override the extraction thresholds
    pub fn extractor_config(mut self, config: ExtractorConfig) -> Self {
        self.extractor = Some(config);
        self
    }

    /// Attach a progress sink
    pub fn progress_sink(mut self, sink: ProgressSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Attach the managed scrape service
    pub fn scrape_service(mut self, service: Arc<dyn ScrapeService>) -> Self {
        self.scrape = Some(service);
        self
    }

    /// Attach the external HTML-to-markdown converter
    pub fn markdown_converter(mut self, converter: Arc<dyn MarkdownConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Attach the managed transcript-extraction service
    pub fn transcript_service(mut self, service: Arc<dyn TranscriptService>) -> Self {
        self.transcript_service = Some(service);
        self
    }

    /// Attach the external media downloader
    pub fn media_downloader(mut self, downloader: Arc<dyn MediaDownloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Append a speech-to-text backend; order is the escalation order
    pub fn speech_to_text(mut self, backend: Arc<dyn SpeechToText>) -> Self {
        self.speech_to_text.push(backend);
        self
    }

    /// Attach the social-post reader command
    pub fn social_reader(mut self, reader: Arc<dyn SocialReader>) -> Self {
        self.social_reader = Some(reader);
        self
    }

    /// TTL for cached transcripts
    pub fn transcript_ttl(mut self, ttl: Duration) -> Self {
        self.transcript_ttl = Some(ttl);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<LinkPreview, PreviewError> {
        Ok(LinkPreview {
            http: build_client(self.user_agent.as_deref())?,
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(ContentCache::with_defaults())),
            engine: TranscriptEngine::new(),
            extractor: self.extractor.unwrap_or_default(),
            sink: self.sink,
            scrape: self.scrape,
            converter: self.converter,
            transcript_service: self.transcript_service,
            downloader: self.downloader,
            speech_to_text: self.speech_to_text,
            social_reader: self.social_reader,
            transcript_ttl: self.transcript_ttl.unwrap_or(TRANSCRIPT_TTL),
        })
    }
}

impl LinkPreview {
    /// Start building a client
    pub fn builder() -> LinkPreviewBuilder {
        LinkPreviewBuilder::default()
    }

    /// A client with no collaborators and a fresh default cache
    pub fn new() -> Result<Self, PreviewError> {
        Self::builder().build()
    }

    /// The shared cache handle
    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Release shared resources; call once at shutdown
    pub fn close(&self) {
        self.cache.close();
    }

    /// Turn a URL or local file into normalized, budgeted content
    pub async fn preview(
        &self,
        req: ExtractionRequest,
    ) -> Result<ExtractedLinkContent, PreviewError> {
        if req.url.is_empty() {
            return Err(PreviewError::MissingUrl);
        }

        // Local files skip classification and the network entirely.
        if let Some(path) = local_file_path(&req.url) {
            let html = tokio::fs::read_to_string(&path)
                .await
                .map_err(PreviewError::FileRead)?;
            let page = FetchedPage {
                final_url: req.url.clone(),
                html,
                status: 200,
                content_type: Some("text/html".to_string()),
            };
            return Ok(self.assemble(&req, page, None).await);
        }

        if !req.url.starts_with("http://") && !req.url.starts_with("https://") {
            return Err(PreviewError::InvalidUrlScheme);
        }

        if let Some(cached) = self.cached_result(&req) {
            debug!(url = %req.url, "page result cache hit");
            return Ok(cached);
        }

        if let UrlKind::DirectAsset { content_type } = classify_url(&self.http, &req.url).await {
            return Ok(asset_result(&req, &content_type));
        }

        let page = fetch_html(&self.http, &req.url, req.timeout(), self.sink.as_ref()).await?;

        let kind = Url::parse(&page.final_url)
            .map(|u| detect_source_kind(&u))
            .unwrap_or(SourceKind::Generic);
        let resolution = if kind != SourceKind::Generic
            && req.video_transcripts == VideoTranscriptMode::Auto
        {
            Some(self.resolve_transcript(&req, &page.final_url, kind).await)
        } else {
            None
        };

        let result = self.assemble(&req, page, resolution).await;
        self.store_result(&req, &result);
        Ok(result)
    }

    async fn resolve_transcript(
        &self,
        req: &ExtractionRequest,
        final_url: &str,
        kind: SourceKind,
    ) -> TranscriptResolution {
        let ctx = ProviderContext {
            http: self.http.clone(),
            timeout: req.timeout(),
            sink: self.sink.clone(),
            transcript_service: self.transcript_service.clone(),
            downloader: self.downloader.clone(),
            speech_to_text: self.speech_to_text.clone(),
            scrape: self.scrape.clone(),
            social_reader: self.social_reader.clone(),
        };
        self.engine
            .resolve(
                final_url,
                kind,
                &ctx,
                &self.cache,
                req.cache_mode,
                self.transcript_ttl,
            )
            .await
    }

    /// Extract, merge the transcript, budget, and build the result
    async fn assemble(
        &self,
        req: &ExtractionRequest,
        page: FetchedPage,
        resolution: Option<TranscriptResolution>,
    ) -> ExtractedLinkContent {
        let outcome = extract_page(
            req,
            &page,
            self.scrape.as_deref(),
            self.converter.as_deref(),
            &self.extractor,
            self.sink.as_ref(),
        )
        .await;

        let kind = Url::parse(&page.final_url)
            .map(|u| detect_source_kind(&u))
            .unwrap_or(SourceKind::Generic);
        let primary_video = (kind != SourceKind::Generic).then(|| DetectedVideo {
            kind,
            url: page.final_url.clone(),
        });

        let transcript_text = resolution
            .as_ref()
            .and_then(|r| r.text.as_deref())
            .map(normalize_text)
            .filter(|t| !t.is_empty());
        let transcript_characters = transcript_text.as_ref().map(|t| t.chars().count());

        let combined = match &transcript_text {
            Some(transcript) if outcome.content.trim().is_empty() => transcript.clone(),
            Some(transcript) => format!("{}\n\n{}", outcome.content, transcript),
            None => outcome.content.clone(),
        };
        let budgeted = apply_budget(&combined, req.max_chars);

        let is_video_only = primary_video.is_some() && outcome.thin_page;
        let transcription_provider = resolution.as_ref().and_then(|r| {
            r.metadata
                .as_ref()
                .and_then(|m| m.get("backend").cloned())
                .or_else(|| r.diagnostics.winning_provider.clone())
        });

        let PageMetadata {
            title,
            description,
            site_name,
        } = outcome.metadata;

        ExtractedLinkContent {
            url: page.final_url,
            title,
            description,
            site_name,
            content: budgeted.content,
            truncated: budgeted.truncated,
            total_characters: budgeted.total_characters,
            word_count: budgeted.word_count,
            transcript_characters,
            transcript_source: resolution.as_ref().and_then(|r| r.source),
            transcription_provider: transcript_text.as_ref().and(transcription_provider),
            transcript_metadata: resolution.as_ref().and_then(|r| r.metadata.clone()),
            primary_video,
            is_video_only,
            diagnostics: ExtractionDiagnostics {
                strategy: outcome.strategy,
                scrape_fallback_used: outcome.scrape_fallback_used,
                markdown_converted: outcome.markdown_converted,
                transcript: resolution.map(|r| r.diagnostics),
            },
        }
    }

    fn result_cache_key(&self, req: &ExtractionRequest) -> CacheKey {
        // Every mode that changes the assembled result must be part of the
        // key, or a cached entry could answer a request it contradicts.
        let resource = format!(
            "{:?}:{:?}:{:?}:{:?}:{:?}",
            req.format, req.markdown_mode, req.scrape_fallback, req.video_transcripts, req.max_chars
        );
        CacheKey::new(req.url.as_str(), PAGE_SERVICE, resource.to_lowercase())
    }

    fn cached_result(&self, req: &ExtractionRequest) -> Option<ExtractedLinkContent> {
        if req.cache_mode == CacheMode::Bypass {
            return None;
        }
        let value = self.cache.get(&self.result_cache_key(req))?;
        serde_json::from_str(&value.content).ok()
    }

    fn store_result(&self, req: &ExtractionRequest, result: &ExtractedLinkContent) {
        if req.cache_mode == CacheMode::Bypass {
            return;
        }
        if let Ok(serialized) = serde_json::to_string(result) {
            self.cache.set(
                &self.result_cache_key(req),
                CacheValue {
                    content: serialized,
                    source: None,
                    metadata: None,
                },
                PAGE_CONTENT_TTL,
            );
        }
    }
}

/// Treat `file://` URLs and existing plain paths as local files
fn local_file_path(url: &str) -> Option<std::path::PathBuf> {
    if let Some(stripped) = url.strip_prefix("file://") {
        return Some(std::path::PathBuf::from(stripped));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return None;
    }
    let path = Path::new(url);
    path.exists().then(|| path.to_path_buf())
}

/// Minimal result for a direct asset; the HTML/transcript path is skipped
fn asset_result(req: &ExtractionRequest, content_type: &str) -> ExtractedLinkContent {
    let filename = Url::parse(&req.url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|mut s| s.next_back().map(|s| s.to_string()))
            .filter(|s| !s.is_empty())
    });
    let site_name = Url::parse(&req.url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.strip_prefix("www.").unwrap_or(h).to_string()));
    let is_media = content_type.starts_with("video/") || content_type.starts_with("audio/");

    ExtractedLinkContent {
        url: req.url.clone(),
        title: filename,
        description: None,
        site_name,
        content: String::new(),
        truncated: false,
        total_characters: 0,
        word_count: 0,
        transcript_characters: None,
        transcript_source: None,
        transcription_provider: None,
        transcript_metadata: None,
        primary_video: None,
        is_video_only: is_media,
        diagnostics: ExtractionDiagnostics {
            strategy: ExtractionStrategy::Asset,
            scrape_fallback_used: false,
            markdown_converted: false,
            transcript: None,
        },
    }
}
