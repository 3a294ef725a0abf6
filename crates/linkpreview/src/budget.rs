//! Text normalization and character budgeting
//!
//! Extracted text is normalized (entities decoded, whitespace collapsed) and
//! then clipped to a caller-supplied character budget. Clipping prefers the
//! latest sentence boundary found after at least half the budget so the tail
//! of the content stays readable.

/// Result of applying a character budget
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetedContent {
    /// Final content, within budget, trailing whitespace trimmed
    pub content: String,
    /// True when the budget clipped the text
    pub truncated: bool,
    /// Character count of the input before clipping
    pub total_characters: usize,
    /// Word count of the final content
    pub word_count: usize,
}

/// Sentence boundaries, checked in the clipped prefix
const SENTENCE_BOUNDARIES: &[&str] = &[". ", "! ", "? ", "\n\n"];

/// Minimum share of the budget a sentence boundary must sit past
const BOUNDARY_MIN_RATIO: f64 = 0.5;

/// Clip text to at most `max_chars` characters
///
/// Under budget, the text is returned as-is (trimmed). Over budget, the clip
/// lands on the latest sentence-ending punctuation or blank line found after
/// at least 50% of the budget; with no such boundary, the text is hard-cut at
/// the budget. Word count is always reported on the final text.
pub fn apply_budget(text: &str, max_chars: Option<usize>) -> BudgetedContent {
    let trimmed = text.trim_end();
    let total_characters = trimmed.chars().count();

    let max = match max_chars {
        Some(max) if total_characters > max => max,
        _ => {
            return BudgetedContent {
                content: trimmed.to_string(),
                truncated: false,
                total_characters,
                word_count: count_words(trimmed),
            };
        }
    };

    // Floor the budget to a char boundary before scanning for boundaries.
    let prefix_end = trimmed
        .char_indices()
        .nth(max)
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    let prefix = &trimmed[..prefix_end];

    let half = (prefix.len() as f64 * BOUNDARY_MIN_RATIO) as usize;
    let clip_at = SENTENCE_BOUNDARIES
        .iter()
        .filter_map(|pat| {
            prefix.rfind(pat).map(|idx| {
                // Keep the punctuation, drop the separator.
                if *pat == "\n\n" {
                    idx
                } else {
                    idx + 1
                }
            })
        })
        .filter(|&end| end >= half)
        .max();

    let content = match clip_at {
        Some(end) => prefix[..end].trim_end().to_string(),
        None => prefix.trim_end().to_string(),
    };

    let word_count = count_words(&content);
    BudgetedContent {
        content,
        truncated: true,
        total_characters,
        word_count,
    }
}

/// Count whitespace-separated words
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Normalize extracted text for budgeting
///
/// Decodes the common named entities, collapses runs of spaces and tabs, and
/// caps consecutive newlines at one blank line.
pub fn normalize_text(text: &str) -> String {
    let decoded = decode_entities(text);

    let mut out = String::with_capacity(decoded.len());
    let mut pending_spaces = 0usize;
    let mut pending_newlines = 0usize;

    for c in decoded.chars() {
        match c {
            '\n' => {
                pending_newlines += 1;
                pending_spaces = 0;
            }
            ' ' | '\t' | '\r' => {
                if pending_newlines == 0 {
                    pending_spaces += 1;
                }
            }
            _ => {
                if pending_newlines > 0 {
                    if !out.is_empty() {
                        out.push('\n');
                        if pending_newlines > 1 {
                            out.push('\n');
                        }
                    }
                } else if pending_spaces > 0 && !out.is_empty() && !out.ends_with('\n') {
                    out.push(' ');
                }
                pending_newlines = 0;
                pending_spaces = 0;
                out.push(c);
            }
        }
    }

    out.trim().to_string()
}

/// Decode the named entities that survive HTML stripping
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
