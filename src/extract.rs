//! HTML to plain-text extraction.
//!
//! Two passes: a readability-style harvest of article-shaped content, then a naive
//! strip-everything fallback for pages the first pass cannot handle. Pages that yield no
//! text in either pass are rejected so the rest of the pipeline never sees empty documents.

use scraper::{Html, Selector};
use thiserror::Error;

use crate::chunker::compute_content_hash;

/// Extracted results shorter than this are usually extraction failures in disguise.
const MIN_VIABLE_TEXT_CHARS: usize = 300;

/// Errors raised while converting HTML into plain text.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Neither extraction pass produced any text.
    #[error("no document could be extracted from {url}")]
    NoContent {
        /// URL of the page that produced no text.
        url: String,
    },
}

/// Normalized output of the extraction stage.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Final URL of the extracted page.
    pub url: String,
    /// Page title, falling back to the caller-supplied default.
    pub title: String,
    /// Plain-text body.
    pub plain_text: String,
    /// Stable hash of `plain_text`, used for change detection.
    pub content_hash: String,
}

impl ExtractedDocument {
    /// True when the extracted text falls below the minimum-viable threshold.
    ///
    /// Such results are frequently extraction failures disguised as success; the
    /// coordinator skips them rather than indexing noise.
    pub fn is_below_viable_length(&self) -> bool {
        self.plain_text.chars().count() < MIN_VIABLE_TEXT_CHARS
    }
}

/// Convert raw HTML into a titled plain-text document with a content hash.
///
/// `fallback_title` (typically the URL) is used when the page carries no usable `<title>`.
pub fn extract_document(
    url: &str,
    html: &str,
    fallback_title: &str,
) -> Result<ExtractedDocument, ExtractError> {
    let document = Html::parse_document(html);

    let mut plain_text = readability_text(&document);
    if plain_text.trim().is_empty() {
        plain_text = stripped_text(&document);
    }
    if plain_text.trim().is_empty() {
        return Err(ExtractError::NoContent {
            url: url.to_string(),
        });
    }

    let char_count = plain_text.chars().count();
    if char_count < MIN_VIABLE_TEXT_CHARS {
        tracing::warn!(
            url,
            chars = char_count,
            "Extracted text is suspiciously short"
        );
    }

    let title = page_title(&document)
        .unwrap_or_else(|| fallback_title.to_string());
    let content_hash = compute_content_hash(&plain_text);

    Ok(ExtractedDocument {
        url: url.to_string(),
        title,
        plain_text,
        content_hash,
    })
}

/// Readability-style pass: harvest paragraph-shaped text, preferring article containers.
fn readability_text(document: &Html) -> String {
    let scoped = Selector::parse("article p, main p, [role=\"main\"] p")
        .expect("static selector parses");
    let general = Selector::parse("p, h1, h2, h3, li").expect("static selector parses");

    let mut paragraphs = collect_paragraphs(document, &scoped);
    if paragraphs.is_empty() {
        paragraphs = collect_paragraphs(document, &general);
    }
    paragraphs.join("\n")
}

fn collect_paragraphs(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(|element| normalize_whitespace(&element.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Fallback pass: concatenate every text node outside script/style/noscript subtrees.
fn stripped_text(document: &Html) -> String {
    let body = Selector::parse("body").expect("static selector parses");
    let any = Selector::parse("*").expect("static selector parses");

    let mut parts: Vec<String> = Vec::new();
    for root in document.select(&body) {
        for element in root.select(&any) {
            if matches!(element.value().name(), "script" | "style" | "noscript") {
                continue;
            }
            for child in element.children() {
                if let Some(text) = child.value().as_text() {
                    let normalized = normalize_whitespace(text);
                    if !normalized.is_empty() {
                        parts.push(normalized);
                    }
                }
            }
        }
    }
    parts.join(" ")
}

fn page_title(document: &Html) -> Option<String> {
    let title = Selector::parse("title").expect("static selector parses");
    document
        .select(&title)
        .next()
        .map(|element| normalize_whitespace(&element.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
