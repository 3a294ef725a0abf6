//! HTML to Markdown conversion
//!
//! Two paths exist: a local readability-style renderer used by
//! `MarkdownMode::Readability` (and as the last resort in `Auto`), and the
//! [`MarkdownConverter`] seam for an external text-generation service used by
//! `MarkdownMode::Llm`. Text mode never touches either.

use async_trait::async_trait;
use ego_tree::NodeRef;
use scraper::{Html, Node};
use std::time::Duration;
use thiserror::Error;

/// External conversion failed
#[derive(Debug, Error)]
#[error("markdown conversion failed: {0}")]
pub struct ConvertError(pub String);

/// Input handed to the external converter
#[derive(Debug, Clone)]
pub struct ConvertInput {
    pub url: String,
    pub html: String,
    pub title: Option<String>,
    pub site_name: Option<String>,
    pub timeout: Duration,
}

/// External HTML-to-markdown converter (LLM-backed in production)
#[async_trait]
pub trait MarkdownConverter: Send + Sync {
    async fn convert(&self, input: ConvertInput) -> Result<String, ConvertError>;
}

/// Elements whose subtrees are never rendered
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "head", "nav", "template",
];

/// Convert HTML to markdown with a local, deterministic renderer
pub fn html_to_markdown(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    let mut ctx = RenderContext::default();
    for child in document.tree.root().children() {
        render_node(child, &mut out, &mut ctx);
    }
    collapse_newlines(&out)
}

#[derive(Default)]
struct RenderContext {
    list_depth: usize,
    in_pre: bool,
}

fn render_node(node: NodeRef<'_, Node>, out: &mut String, ctx: &mut RenderContext) {
    match node.value() {
        Node::Text(text) => {
            if ctx.in_pre {
                out.push_str(&text.text);
            } else {
                let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if !collapsed.is_empty() {
                    if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                        out.push(' ');
                    }
                    out.push_str(&collapsed);
                }
            }
        }
        Node::Element(element) => {
            let tag = element.name();
            if SKIP_TAGS.contains(&tag) {
                return;
            }
            match tag {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    let level = tag[1..].parse::<usize>().unwrap_or(1);
                    out.push_str("\n\n");
                    out.push_str(&"#".repeat(level));
                    out.push(' ');
                    render_children(node, out, ctx);
                    out.push_str("\n\n");
                }
                "p" | "div" | "section" | "article" | "main" | "header" | "footer"
                | "table" | "tr" => {
                    render_children(node, out, ctx);
                    out.push_str("\n\n");
                }
                "br" => out.push('\n'),
                "hr" => out.push_str("\n\n---\n\n"),
                "ul" | "ol" => {
                    ctx.list_depth += 1;
                    out.push('\n');
                    render_children(node, out, ctx);
                    ctx.list_depth -= 1;
                    out.push('\n');
                }
                "li" => {
                    out.push('\n');
                    out.push_str(&"  ".repeat(ctx.list_depth.saturating_sub(1)));
                    out.push_str("- ");
                    render_children(node, out, ctx);
                }
                "blockquote" => {
                    let mut inner = String::new();
                    render_children(node, &mut inner, ctx);
                    out.push('\n');
                    for line in collapse_newlines(&inner).lines() {
                        out.push_str("> ");
                        out.push_str(line);
                        out.push('\n');
                    }
                    out.push('\n');
                }
                "pre" => {
                    ctx.in_pre = true;
                    out.push_str("\n\n```\n");
                    render_children(node, out, ctx);
                    ctx.in_pre = false;
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str("```\n\n");
                }
                "code" if !ctx.in_pre => push_inline(node, out, ctx, "`", "`"),
                "strong" | "b" => push_inline(node, out, ctx, "**", "**"),
                "em" | "i" => push_inline(node, out, ctx, "*", "*"),
                "a" => {
                    let href = element.attr("href").unwrap_or("");
                    let mut label = String::new();
                    render_children(node, &mut label, ctx);
                    let label = label.trim();
                    if label.is_empty() {
                        // nothing to link
                    } else if href.is_empty() || href.starts_with('#') {
                        push_separated(out, label);
                    } else {
                        push_separated(out, &format!("[{}]({})", label, href));
                    }
                }
                "img" => {
                    if let Some(alt) = element.attr("alt") {
                        if !alt.is_empty() {
                            push_separated(out, &format!("![{}]", alt));
                        }
                    }
                }
                _ => render_children(node, out, ctx),
            }
        }
        _ => {
            for child in node.children() {
                render_node(child, out, ctx);
            }
        }
    }
}

fn render_children(node: NodeRef<'_, Node>, out: &mut String, ctx: &mut RenderContext) {
    for child in node.children() {
        render_node(child, out, ctx);
    }
}

/// Render an inline span with its markers flush against the text
fn push_inline(node: NodeRef<'_, Node>, out: &mut String, ctx: &mut RenderContext, open: &str, close: &str) {
    let mut inner = String::new();
    render_children(node, &mut inner, ctx);
    let inner = inner.trim();
    if !inner.is_empty() {
        push_separated(out, &format!("{}{}{}", open, inner, close));
    }
}

fn push_separated(out: &mut String, text: &str) {
    if !out.is_empty() && !out.ends_with(char::is_whitespace) {
        out.push(' ');
    }
    out.push_str(text);
}

/// Cap runs of newlines at one blank line and trim the edges
pub fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            continue;
        }
        if newlines > 0 {
            if !out.is_empty() {
                out.push('\n');
                if newlines > 1 {
                    out.push('\n');
                }
            }
            newlines = 0;
        }
        out.push(c);
    }
    out.trim_matches(|c: char| c == '\n' || c == ' ').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_and_paragraphs() {
        let html = "<h1>Title</h1><p>First.</p><h2>Sub</h2><p>Second.</p>";
        let md = html_to_markdown(html);
        assert!(md.contains("# Title"));
        assert!(md.contains("## Sub"));
        assert!(md.contains("First."));
        assert!(md.contains("Second."));
    }

    #[test]
    fn test_lists_get_bullets() {
        let html = "<ul><li>Item 1</li><li>Item 2</li></ul>";
        let md = html_to_markdown(html);
        assert!(md.contains("- Item 1"));
        assert!(md.contains("- Item 2"));
    }

    #[test]
    fn test_inline_markup() {
        let html = "<p>Some <strong>bold</strong> and <em>italic</em> and <code>code</code>.</p>";
        let md = html_to_markdown(html);
        assert!(md.contains("Some **bold** and"));
        assert!(md.contains("*italic*"));
        assert!(md.contains("`code`"));
    }

    #[test]
    fn test_inline_markers_stay_flush() {
        let html = "<p>A <strong> padded </strong> span and an <em></em> empty one.</p>";
        let md = html_to_markdown(html);
        assert!(md.contains("A **padded** span"));
        assert!(!md.contains("** padded"));
        assert!(md.contains("an empty one."));
        assert!(!md.contains("**empty"));
    }

    #[test]
    fn test_links_rendered() {
        let html = r#"<p>See <a href="https://example.com">the docs</a>.</p>"#;
        let md = html_to_markdown(html);
        assert!(md.contains("[the docs](https://example.com)"));
    }

    #[test]
    fn test_scripts_and_nav_skipped() {
        let html = "<nav>Menu</nav><script>alert(1)</script><p>Body text</p>";
        let md = html_to_markdown(html);
        assert!(!md.contains("Menu"));
        assert!(!md.contains("alert"));
        assert!(md.contains("Body text"));
    }

    #[test]
    fn test_pre_becomes_fence() {
        let html = "<pre>let x = 1;\nlet y = 2;</pre>";
        let md = html_to_markdown(html);
        assert!(md.contains("```\nlet x = 1;\nlet y = 2;\n```"));
    }

    #[test]
    fn test_blockquote_prefixed() {
        let html = "<blockquote><p>Quoted words</p></blockquote>";
        let md = html_to_markdown(html);
        assert!(md.contains("> Quoted words"));
    }

    #[test]
    fn test_collapse_newlines() {
        assert_eq!(collapse_newlines("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_newlines("\n\na\n"), "a");
    }
}
