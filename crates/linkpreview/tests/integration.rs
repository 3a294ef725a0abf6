//! Integration tests for the link preview pipeline using wiremock

use linkpreview::{
    CacheMode, CacheStatus, ContentCache, ExtractionRequest, ExtractionStrategy, LinkPreview,
    PreviewError, ProgressEvent, ProgressSink, ScrapeError, ScrapeFallbackMode, ScrapeService,
    ScrapedPage, SourceKind, TranscriptEngine, TranscriptSource,
};
use linkpreview::transcript::ProviderContext;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// HEAD probes against the mock server should classify as a website
async fn mount_head_probe(server: &MockServer) {
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
        .mount(server)
        .await;
}

fn article_html() -> String {
    let paragraph = "Rust builds fast native tools with strong guarantees. ".repeat(6);
    format!(
        r#"<html><head>
            <title>Fallback Title</title>
            <meta property="og:title" content="Hello Article">
            <meta property="og:description" content="A page about things.">
            <meta property="og:site_name" content="Example Site">
        </head><body>
            <h1>Hello</h1>
            <p>{paragraph}</p>
        </body></html>"#
    )
}

#[tokio::test]
async fn test_direct_extraction_of_article() {
    let server = MockServer::start().await;
    mount_head_probe(&server).await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(html_response(&article_html()))
        .mount(&server)
        .await;

    let client = LinkPreview::new().unwrap();
    let req = ExtractionRequest::new(format!("{}/article", server.uri()));
    let result = client.preview(req).await.unwrap();

    assert_eq!(result.diagnostics.strategy, ExtractionStrategy::Html);
    assert!(!result.diagnostics.scrape_fallback_used);
    assert!(result.content.contains("Hello"));
    assert!(result.content.contains("Rust builds fast native tools"));
    assert_eq!(result.title.as_deref(), Some("Hello Article"));
    assert_eq!(result.description.as_deref(), Some("A page about things."));
    assert_eq!(result.site_name.as_deref(), Some("Example Site"));
    assert!(!result.truncated);
    assert!(result.word_count > 10);
    assert!(result.transcript_source.is_none());
}

#[tokio::test]
async fn test_redirect_reports_final_url() {
    let server = MockServer::start().await;
    mount_head_probe(&server).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html_response(&article_html()))
        .mount(&server)
        .await;

    let client = LinkPreview::new().unwrap();
    let req = ExtractionRequest::new(format!("{}/old", server.uri()));
    let result = client.preview(req).await.unwrap();

    assert!(result.url.ends_with("/new"));
    assert!(result.content.contains("Rust builds fast native tools"));
}

#[tokio::test]
async fn test_short_headings_and_list_items_dropped() {
    let server = MockServer::start().await;
    mount_head_probe(&server).await;
    let paragraph = "This long paragraph carries the substance of the page content. ".repeat(5);
    let body = format!(
        "<html><body><h2>Short</h2><ul><li>tiny item</li></ul><p>{paragraph}</p></body></html>"
    );
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html_response(&body))
        .mount(&server)
        .await;

    let client = LinkPreview::new().unwrap();
    let req = ExtractionRequest::new(format!("{}/page", server.uri()));
    let result = client.preview(req).await.unwrap();

    assert!(!result.content.contains("Short"));
    assert!(!result.content.contains("tiny item"));
    assert!(result.content.contains("carries the substance"));
}

#[tokio::test]
async fn test_character_budget_clips_at_sentence_boundary() {
    let server = MockServer::start().await;
    mount_head_probe(&server).await;
    let paragraph = "Every sentence here has the exact same shape and length. ".repeat(20);
    let body = format!("<html><body><p>{paragraph}</p></body></html>");
    Mock::given(method("GET"))
        .and(path("/long"))
        .respond_with(html_response(&body))
        .mount(&server)
        .await;

    let client = LinkPreview::new().unwrap();
    let req = ExtractionRequest::new(format!("{}/long", server.uri())).max_chars(300);
    let result = client.preview(req).await.unwrap();

    assert!(result.truncated);
    assert!(result.content.chars().count() <= 300);
    assert!(result.content.ends_with('.'));
    assert!(result.total_characters > 300);
}

struct FixedScrape {
    page: ScrapedPage,
    calls: Mutex<Vec<CacheMode>>,
}

#[async_trait::async_trait]
impl ScrapeService for FixedScrape {
    async fn scrape(
        &self,
        _url: &str,
        cache_mode: CacheMode,
        _timeout: Duration,
    ) -> Result<Option<ScrapedPage>, ScrapeError> {
        self.calls.lock().unwrap().push(cache_mode);
        Ok(Some(self.page.clone()))
    }
}

#[tokio::test]
async fn test_scrape_fallback_on_bot_challenge() {
    let server = MockServer::start().await;
    mount_head_probe(&server).await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(html_response(
            "<html><head><title>Just a moment...</title></head><body>Checking your browser</body></html>",
        ))
        .mount(&server)
        .await;

    let scrape = Arc::new(FixedScrape {
        page: ScrapedPage {
            markdown: None,
            html: Some("<p>hi</p>".to_string()),
            metadata: None,
        },
        calls: Mutex::new(Vec::new()),
    });
    let client = LinkPreview::builder()
        .scrape_service(Arc::clone(&scrape) as Arc<dyn ScrapeService>)
        .build()
        .unwrap();

    let req = ExtractionRequest::new(format!("{}/blocked", server.uri()))
        .cache_mode(CacheMode::Bypass);
    let result = client.preview(req).await.unwrap();

    assert_eq!(result.diagnostics.strategy, ExtractionStrategy::Scrape);
    assert!(result.diagnostics.scrape_fallback_used);
    assert!(result.content.contains("hi"));
    // Bypass is forwarded to the collaborator.
    assert_eq!(scrape.calls.lock().unwrap().as_slice(), &[CacheMode::Bypass]);
}

#[tokio::test]
async fn test_result_cache_keyed_on_modes() {
    let server = MockServer::start().await;
    mount_head_probe(&server).await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(html_response(
            "<html><head><title>Just a moment...</title></head><body>Checking your browser</body></html>",
        ))
        .mount(&server)
        .await;

    let scrape = Arc::new(FixedScrape {
        page: ScrapedPage {
            markdown: None,
            html: Some("<p>hi</p>".to_string()),
            metadata: None,
        },
        calls: Mutex::new(Vec::new()),
    });
    let client = LinkPreview::builder()
        .scrape_service(Arc::clone(&scrape) as Arc<dyn ScrapeService>)
        .build()
        .unwrap();
    let url = format!("{}/blocked", server.uri());

    // First request may scrape; its cached result must not answer a
    // request that forbids scraping.
    let first = client.preview(ExtractionRequest::new(url.clone())).await.unwrap();
    assert_eq!(first.diagnostics.strategy, ExtractionStrategy::Scrape);

    let second = client
        .preview(ExtractionRequest::new(url).scrape_fallback(ScrapeFallbackMode::Off))
        .await
        .unwrap();
    assert_eq!(second.diagnostics.cache_status, CacheStatus::Miss);
    assert_ne!(second.diagnostics.strategy, ExtractionStrategy::Scrape);
    assert!(!second.diagnostics.scrape_fallback_used);
}

#[tokio::test]
async fn test_asset_url_short_circuits() {
    // Extension fast-path; no request leaves the process.
    let client = LinkPreview::new().unwrap();
    let req = ExtractionRequest::new("https://cdn.example.com/media/clip.mp4");
    let result = client.preview(req).await.unwrap();

    assert_eq!(result.diagnostics.strategy, ExtractionStrategy::Asset);
    assert_eq!(result.title.as_deref(), Some("clip.mp4"));
    assert!(result.content.is_empty());
    assert!(result.is_video_only);
}

#[tokio::test]
async fn test_unsupported_content_type_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "application/json"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .insert_header("content-type", "application/json"),
        )
        .mount(&server)
        .await;

    let client = LinkPreview::new().unwrap();
    let req = ExtractionRequest::new(format!("{}/data", server.uri()));
    let err = client.preview(req).await.unwrap_err();

    assert!(matches!(err, PreviewError::UnsupportedContentType(_)));
}

#[tokio::test]
async fn test_local_file_preview() {
    let mut file = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
    write!(file, "{}", article_html()).unwrap();

    let client = LinkPreview::new().unwrap();
    let req = ExtractionRequest::new(file.path().to_string_lossy().to_string());
    let result = client.preview(req).await.unwrap();

    assert!(result.content.contains("Rust builds fast native tools"));
    assert_eq!(result.title.as_deref(), Some("Hello Article"));
}

#[tokio::test]
async fn test_progress_events_for_fetch() {
    let server = MockServer::start().await;
    mount_head_probe(&server).await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(html_response(&article_html()))
        .mount(&server)
        .await;

    let seen: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let sink: ProgressSink = Arc::new(move |event| {
        seen_clone.lock().unwrap().push(event);
    });

    let client = LinkPreview::builder().progress_sink(sink).build().unwrap();
    let req = ExtractionRequest::new(format!("{}/article", server.uri()));
    client.preview(req).await.unwrap();

    let events = seen.lock().unwrap();
    assert!(matches!(events.first(), Some(ProgressEvent::FetchStart { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, ProgressEvent::FetchDone { .. })));
}

fn caption_page(track_url: &str) -> String {
    format!(
        r#"<html><body>player config: "captionTracks":[{{"baseUrl":"{track_url}","languageCode":"en"}}]</body></html>"#
    )
}

#[tokio::test]
async fn test_caption_chain_resolves_and_caches() {
    let server = MockServer::start().await;
    let track_url = format!("{}/timedtext", server.uri());
    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(html_response(&caption_page(&track_url)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/timedtext"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<transcript><text start="0">welcome to the</text><text start="2">deep dive</text></transcript>"#,
        ))
        .mount(&server)
        .await;

    let engine = TranscriptEngine::new();
    let cache = ContentCache::with_defaults();
    let ctx = ProviderContext::new(reqwest::Client::new(), Duration::from_secs(5));
    let url = format!("{}/watch", server.uri());

    let first = engine
        .resolve(
            &url,
            SourceKind::VideoPlatform,
            &ctx,
            &cache,
            CacheMode::Default,
            Duration::from_secs(60),
        )
        .await;
    assert_eq!(first.text.as_deref(), Some("welcome to the deep dive"));
    assert_eq!(first.source, Some(TranscriptSource::Captions));
    assert_eq!(first.diagnostics.cache_status, CacheStatus::Miss);
    assert_eq!(
        first.diagnostics.winning_provider.as_deref(),
        Some("captions")
    );
    assert_eq!(first.diagnostics.attempted_providers, vec!["captions"]);
    assert_eq!(
        first
            .metadata
            .as_ref()
            .and_then(|m| m.get("language"))
            .map(String::as_str),
        Some("en")
    );

    let second = engine
        .resolve(
            &url,
            SourceKind::VideoPlatform,
            &ctx,
            &cache,
            CacheMode::Default,
            Duration::from_secs(60),
        )
        .await;
    assert_eq!(second.text.as_deref(), Some("welcome to the deep dive"));
    assert_eq!(second.diagnostics.cache_status, CacheStatus::Hit);
    assert!(second.diagnostics.attempted_providers.is_empty());
}

#[tokio::test]
async fn test_exhausted_chain_is_unavailable_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(html_response("<html><body>just a video player</body></html>"))
        .mount(&server)
        .await;

    let engine = TranscriptEngine::new();
    let cache = ContentCache::with_defaults();
    // No collaborators: managed service and media download report unavailable.
    let ctx = ProviderContext::new(reqwest::Client::new(), Duration::from_secs(5));
    let url = format!("{}/watch", server.uri());

    let resolution = engine
        .resolve(
            &url,
            SourceKind::VideoPlatform,
            &ctx,
            &cache,
            CacheMode::Default,
            Duration::from_secs(60),
        )
        .await;

    assert!(resolution.text.is_none());
    assert_eq!(resolution.source, Some(TranscriptSource::Unavailable));
    assert!(!resolution.diagnostics.text_provided);
    assert_eq!(
        resolution.diagnostics.attempted_providers,
        vec!["captions", "managed-transcript", "media-download", "unsupported"]
    );
    assert!(!resolution.diagnostics.notes.is_empty());
}

#[tokio::test]
async fn test_cache_bypass_never_reads_or_writes() {
    let server = MockServer::start().await;
    let track_url = format!("{}/timedtext", server.uri());
    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(html_response(&caption_page(&track_url)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/timedtext"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<text>hello world again</text>"))
        .mount(&server)
        .await;

    let engine = TranscriptEngine::new();
    let cache = ContentCache::with_defaults();
    let ctx = ProviderContext::new(reqwest::Client::new(), Duration::from_secs(5));
    let url = format!("{}/watch", server.uri());

    for _ in 0..2 {
        let resolution = engine
            .resolve(
                &url,
                SourceKind::VideoPlatform,
                &ctx,
                &cache,
                CacheMode::Bypass,
                Duration::from_secs(60),
            )
            .await;
        assert_eq!(resolution.diagnostics.cache_status, CacheStatus::Bypassed);
        assert_eq!(resolution.diagnostics.attempted_providers, vec!["captions"]);
    }
    assert_eq!(cache.stats().entries, 0);
}

#[tokio::test]
async fn test_page_result_cache_round_trip() {
    let server = MockServer::start().await;
    mount_head_probe(&server).await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(html_response(&article_html()))
        .expect(1)
        .mount(&server)
        .await;

    let client = LinkPreview::new().unwrap();
    let url = format!("{}/article", server.uri());

    let first = client
        .preview(ExtractionRequest::new(url.as_str()))
        .await
        .unwrap();
    let second = client
        .preview(ExtractionRequest::new(url.as_str()))
        .await
        .unwrap();

    assert_eq!(first.content, second.content);
    assert_eq!(first.title, second.title);
}
