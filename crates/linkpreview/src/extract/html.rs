//! Direct HTML extraction
//!
//! Sanitizes the page to a safe allow-list, parses it into a DOM, and
//! collects text segments from heading/paragraph/list/blockquote/code
//! elements. Boilerplate (navigation, scripts, styles) never survives
//! sanitization. Short segments are dropped as noise; when nothing survives,
//! whole-body text is the fallback.

use crate::budget::normalize_text;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Tunable extraction thresholds
///
/// The values are tuned constants, not correctness properties.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Headings shorter than this are dropped
    pub min_heading_chars: usize,
    /// List items shorter than this are dropped
    pub min_list_item_chars: usize,
    /// Paragraph-like segments shorter than this are dropped
    pub min_segment_chars: usize,
    /// Direct extraction below this total is "implausibly thin"
    pub thin_content_chars: usize,
    /// Lowercase needles that mark a bot-challenge page
    pub bot_challenge_markers: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_heading_chars: 10,
            min_list_item_chars: 20,
            min_segment_chars: 30,
            thin_content_chars: 200,
            bot_challenge_markers: BOT_CHALLENGE_MARKERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Default bot-challenge needles, matched against lowercased HTML
pub const BOT_CHALLENGE_MARKERS: &[&str] = &[
    "just a moment",
    "verify you are human",
    "enable javascript and cookies",
    "attention required",
    "access denied",
    "captcha",
];

/// Tags that survive sanitization for segment extraction
const ALLOWED_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "ul", "ol", "li", "blockquote", "pre", "code",
    "br", "b", "strong", "i", "em", "a", "body", "html", "title",
];

/// Page metadata merged from social-card tags, the title element, and a
/// hostname fallback
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub site_name: Option<String>,
}

impl PageMetadata {
    /// Fill empty fields from another source; existing values win
    pub fn merge_missing_from(&mut self, other: &PageMetadata) {
        if self.title.is_none() {
            self.title = other.title.clone();
        }
        if self.description.is_none() {
            self.description = other.description.clone();
        }
        if self.site_name.is_none() {
            self.site_name = other.site_name.clone();
        }
    }
}

/// Sanitize HTML to the extraction allow-list
pub fn sanitize_html(html: &str) -> String {
    ammonia::Builder::default()
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .clean(html)
        .to_string()
}

/// Does the page look like a bot challenge rather than content?
pub fn looks_bot_blocked(html: &str, markers: &[String]) -> bool {
    let lowered = html.to_lowercase();
    markers.iter().any(|needle| lowered.contains(needle))
}

/// Extract text segments from raw HTML
///
/// Returns segments in document order; list items carry a `- ` bullet.
pub fn extract_segments(html: &str, config: &ExtractorConfig) -> Vec<String> {
    let sanitized = sanitize_html(html);
    let document = Html::parse_document(&sanitized);

    let selector = Selector::parse("h1, h2, h3, h4, h5, h6, p, li, blockquote, pre")
        .expect("static selector");

    let mut segments = Vec::new();
    for element in document.select(&selector) {
        // A paragraph nested in a list item or quote is already covered by
        // the enclosing segment.
        if has_container_ancestor(&element) {
            continue;
        }

        let tag = element.value().name();
        let text = normalize_text(&element.text().collect::<Vec<_>>().join(" "));
        let chars = text.chars().count();
        if text.is_empty() {
            continue;
        }

        match tag {
            // The top-level heading is the page's own title and is kept even
            // when short; lower headings below the floor are noise.
            "h1" => segments.push(text),
            "h2" | "h3" | "h4" | "h5" | "h6" => {
                if chars >= config.min_heading_chars {
                    segments.push(text);
                }
            }
            "li" => {
                if chars >= config.min_list_item_chars {
                    segments.push(format!("- {}", text));
                }
            }
            _ => {
                if chars >= config.min_segment_chars {
                    segments.push(text);
                }
            }
        }
    }

    if segments.is_empty() {
        let body = whole_body_text(&document);
        if !body.is_empty() {
            segments.push(body);
        }
    }

    segments
}

fn has_container_ancestor(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| matches!(a.value().name(), "li" | "blockquote" | "pre"))
}

/// Whole-body text fallback when no segment survives
fn whole_body_text(document: &Html) -> String {
    let body = Selector::parse("body").expect("static selector");
    document
        .select(&body)
        .next()
        .map(|el| normalize_text(&el.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default()
}

/// Resolve title/description/site name from the raw (unsanitized) page
///
/// Order per field: social-card meta tags, then the `<title>` element, then a
/// hostname-derived fallback for site name. First non-empty wins.
pub fn page_metadata(html: &str, final_url: &str) -> PageMetadata {
    let document = Html::parse_document(html);

    let title = meta_content(&document, &["og:title", "twitter:title"])
        .or_else(|| title_element(&document));
    let description = meta_content(
        &document,
        &["og:description", "twitter:description", "description"],
    );
    let site_name =
        meta_content(&document, &["og:site_name"]).or_else(|| hostname_site_name(final_url));

    PageMetadata {
        title,
        description,
        site_name,
    }
}

fn meta_content(document: &Html, names: &[&str]) -> Option<String> {
    for name in names {
        for attr in ["property", "name"] {
            let raw = format!(r#"meta[{}="{}"]"#, attr, name);
            let selector = match Selector::parse(&raw) {
                Ok(s) => s,
                Err(_) => continue,
            };
            if let Some(content) = document
                .select(&selector)
                .filter_map(|el| el.value().attr("content"))
                .map(str::trim)
                .find(|c| !c.is_empty())
            {
                return Some(content.to_string());
            }
        }
    }
    None
}

fn title_element(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").expect("static selector");
    document
        .select(&selector)
        .next()
        .map(|el| normalize_text(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

fn hostname_site_name(final_url: &str) -> Option<String> {
    let parsed = Url::parse(final_url).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}
