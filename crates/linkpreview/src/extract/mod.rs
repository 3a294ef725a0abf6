//! Extraction strategy selection
//!
//! Decides between direct HTML parsing, the managed scrape fallback, and
//! markdown conversion, and records the decision in diagnostics. Scrape runs
//! when the mode says `always`, or in `auto` when direct extraction is
//! implausibly thin or the page trips the bot-challenge heuristics.

mod html;

pub use html::{
    extract_segments, looks_bot_blocked, page_metadata, sanitize_html, ExtractorConfig,
    PageMetadata, BOT_CHALLENGE_MARKERS,
};

use crate::convert::{html_to_markdown, ConvertInput, MarkdownConverter};
use crate::fetch::FetchedPage;
use crate::progress::{emit, ProgressEvent, ProgressSink};
use crate::scrape::ScrapeService;
use crate::types::{ExtractionRequest, ExtractionStrategy, MarkdownMode, OutputFormat, ScrapeFallbackMode};
use tracing::{debug, warn};

/// What the selector produced for one page
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// Normalized content, not yet budgeted
    pub content: String,
    /// Strategy that produced the content
    pub strategy: ExtractionStrategy,
    /// Whether scrape-fallback output was used
    pub scrape_fallback_used: bool,
    /// Whether an HTML-to-markdown conversion ran
    pub markdown_converted: bool,
    /// Merged metadata
    pub metadata: PageMetadata,
    /// True when direct extraction found no substantial segments
    pub thin_page: bool,
}

/// Turn a fetched page into normalized content
pub async fn extract_page(
    req: &ExtractionRequest,
    page: &FetchedPage,
    scrape: Option<&dyn ScrapeService>,
    converter: Option<&dyn MarkdownConverter>,
    config: &ExtractorConfig,
    sink: Option<&ProgressSink>,
) -> ExtractionOutcome {
    let mut metadata = page_metadata(&page.html, &page.final_url);

    let segments = if req.scrape_fallback == ScrapeFallbackMode::Always {
        Vec::new()
    } else {
        extract_segments(&page.html, config)
    };
    let direct_chars: usize = segments.iter().map(|s| s.chars().count()).sum();
    let thin = segments.is_empty() || direct_chars < config.thin_content_chars;
    let blocked = looks_bot_blocked(&page.html, &config.bot_challenge_markers);

    let want_scrape = match req.scrape_fallback {
        ScrapeFallbackMode::Always => true,
        ScrapeFallbackMode::Auto => thin || blocked,
        ScrapeFallbackMode::Off => false,
    };

    if want_scrape {
        if let Some(service) = scrape {
            emit(
                sink,
                ProgressEvent::ScrapeFallbackStart {
                    url: page.final_url.clone(),
                },
            );
            match service
                .scrape(&page.final_url, req.cache_mode, req.timeout())
                .await
            {
                Ok(Some(scraped)) => {
                    emit(sink, ProgressEvent::ScrapeFallbackDone { succeeded: true });
                    if let Some(ref scraped_meta) = scraped.metadata {
                        metadata.merge_missing_from(&PageMetadata {
                            title: scraped_meta.title.clone(),
                            description: scraped_meta.description.clone(),
                            site_name: scraped_meta.site_name.clone(),
                        });
                    }

                    // Prefer the service's markdown; fall back to its HTML.
                    let (content, markdown_converted) = match (&scraped.markdown, &scraped.html) {
                        (Some(md), _) if !md.trim().is_empty() => {
                            (finish_scraped_markdown(req, md), false)
                        }
                        (_, Some(html)) => render_html(req, html, converter, config, &metadata).await,
                        _ => (String::new(), false),
                    };

                    if !content.is_empty() {
                        return ExtractionOutcome {
                            content,
                            strategy: ExtractionStrategy::Scrape,
                            scrape_fallback_used: true,
                            markdown_converted,
                            metadata,
                            thin_page: thin,
                        };
                    }
                    warn!(url = %page.final_url, "scrape returned an empty page, keeping direct extraction");
                }
                Ok(None) => {
                    emit(sink, ProgressEvent::ScrapeFallbackDone { succeeded: false });
                    debug!(url = %page.final_url, "scrape had nothing for this page");
                }
                Err(err) => {
                    emit(sink, ProgressEvent::ScrapeFallbackDone { succeeded: false });
                    warn!(url = %page.final_url, error = %err, "scrape fallback failed");
                }
            }
        }
    }

    // Direct extraction path.
    let (content, markdown_converted) =
        render_direct(req, page, &segments, converter, config, &metadata).await;
    ExtractionOutcome {
        content,
        strategy: ExtractionStrategy::Html,
        scrape_fallback_used: false,
        markdown_converted,
        metadata,
        thin_page: thin,
    }
}

/// Scrape markdown is reused as-is for markdown output, or kept as plain
/// textual content for text output (it is already readable text).
fn finish_scraped_markdown(req: &ExtractionRequest, markdown: &str) -> String {
    let _ = req;
    markdown.trim().to_string()
}

/// Render from the scrape service's HTML field
async fn render_html(
    req: &ExtractionRequest,
    html: &str,
    converter: Option<&dyn MarkdownConverter>,
    config: &ExtractorConfig,
    metadata: &PageMetadata,
) -> (String, bool) {
    if wants_markdown_output(req) {
        convert_to_markdown(req, html, converter, metadata).await
    } else {
        (extract_segments(html, config).join("\n\n"), false)
    }
}

/// Render the direct-extraction result for the requested format
async fn render_direct(
    req: &ExtractionRequest,
    page: &FetchedPage,
    segments: &[String],
    converter: Option<&dyn MarkdownConverter>,
    config: &ExtractorConfig,
    metadata: &PageMetadata,
) -> (String, bool) {
    // `Always` mode skipped direct segment collection up front; recover it
    // when scrape produced nothing.
    let segments = if segments.is_empty() {
        extract_segments(&page.html, config)
    } else {
        segments.to_vec()
    };

    if wants_markdown_output(req) {
        convert_to_markdown(req, &page.html, converter, metadata).await
    } else {
        (segments.join("\n\n"), false)
    }
}

fn wants_markdown_output(req: &ExtractionRequest) -> bool {
    req.format == OutputFormat::Markdown && req.markdown_mode != MarkdownMode::Off
}

/// Produce markdown per the markdown mode
///
/// `llm` requires the external converter and degrades to readability with a
/// warning when it is absent or fails; `auto` uses the converter when one is
/// configured; `readability` always converts locally.
async fn convert_to_markdown(
    req: &ExtractionRequest,
    html: &str,
    converter: Option<&dyn MarkdownConverter>,
    metadata: &PageMetadata,
) -> (String, bool) {
    let sanitized = sanitize_html(html);

    let use_converter = match req.markdown_mode {
        MarkdownMode::Llm => true,
        MarkdownMode::Auto => converter.is_some(),
        _ => false,
    };

    if use_converter {
        if let Some(converter) = converter {
            let input = ConvertInput {
                url: req.url.clone(),
                html: sanitized.clone(),
                title: metadata.title.clone(),
                site_name: metadata.site_name.clone(),
                timeout: req.timeout(),
            };
            match converter.convert(input).await {
                Ok(markdown) if !markdown.trim().is_empty() => {
                    return (markdown.trim().to_string(), true);
                }
                Ok(_) => warn!("converter returned empty markdown, falling back"),
                Err(err) => warn!(error = %err, "markdown converter failed, falling back"),
            }
        } else {
            warn!("markdown mode llm requested but no converter configured");
        }
    }

    (html_to_markdown(&sanitized), true)
}
