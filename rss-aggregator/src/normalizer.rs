//! Turns one raw feed entry into a canonical [`Article`].
//!
//! Everything here is pure: no I/O, and the ingestion time is passed in.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use uuid::Uuid;

use crate::sources::Source;
use crate::types::{Article, MediaRef, ParsedEntry};
use crate::utils::text::{take_chars, title_case, truncate_with_marker};

pub const SUMMARY_MAX_CHARS: usize = 500;
pub const CONTENT_MAX_CHARS: usize = 1000;
/// Length of the summary derived from content when the feed has none.
pub const DERIVED_SUMMARY_CHARS: usize = 200;
pub const TRUNCATION_MARKER: &str = "...";
pub const MAX_TAGS: usize = 5;

/// Matched by case-insensitive substring, emitted in this order.
pub const TAG_VOCABULARY: [&str; 29] = [
    "AI",
    "artificial intelligence",
    "machine learning",
    "blockchain",
    "cryptocurrency",
    "bitcoin",
    "ethereum",
    "startup",
    "venture capital",
    "google",
    "apple",
    "microsoft",
    "amazon",
    "meta",
    "tesla",
    "openai",
    "cybersecurity",
    "data",
    "cloud",
    "mobile",
    "app",
    "software",
    "hardware",
    "gaming",
    "vr",
    "ar",
    "iot",
    "robotics",
    "drone",
];

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("entry has no title")]
    MissingTitle,

    #[error("entry has no link")]
    MissingLink,
}

/// Permissive markup stripper: drops anything shaped like a tag, then
/// decodes entities, then collapses whitespace. Not an HTML parser.
///
/// Escaped text such as `a &lt; b` is decoded after stripping, so it survives
/// as literal `<`/`>` instead of being mistaken for a tag.
pub fn clean_html(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let without_tags = TAG_RE.replace_all(input, " ");
    let decoded = html_escape::decode_html_entities(&without_tags);
    WHITESPACE_RE
        .replace_all(&decoded, " ")
        .trim()
        .to_string()
}

type ImageStrategy = fn(&ParsedEntry) -> Option<String>;

/// Tried in order; the first hit wins.
const IMAGE_STRATEGIES: [ImageStrategy; 3] = [media_attachment, image_enclosure, first_inline_image];

pub fn extract_image(entry: &ParsedEntry) -> Option<String> {
    IMAGE_STRATEGIES.iter().find_map(|strategy| strategy(entry))
}

fn is_image_type(media_type: &str) -> bool {
    media_type.trim().to_ascii_lowercase().starts_with("image/")
}

fn non_empty_url(media: &MediaRef) -> Option<String> {
    let url = media.url.trim();
    (!url.is_empty()).then(|| url.to_string())
}

/// Media attachments with no declared type are assumed to be images.
fn media_attachment(entry: &ParsedEntry) -> Option<String> {
    entry
        .media
        .iter()
        .filter(|media| media.media_type.as_deref().map_or(true, is_image_type))
        .find_map(non_empty_url)
}

fn image_enclosure(entry: &ParsedEntry) -> Option<String> {
    entry
        .enclosures
        .iter()
        .filter(|enclosure| enclosure.media_type.as_deref().is_some_and(is_image_type))
        .find_map(non_empty_url)
}

fn first_inline_image(entry: &ParsedEntry) -> Option<String> {
    let markup = raw_content(entry);
    if markup.is_empty() {
        return None;
    }

    let fragment = Html::parse_fragment(markup);
    let src = fragment
        .select(&IMG_SELECTOR)
        .next()?
        .value()
        .attr("src")?
        .trim();
    (!src.is_empty()).then(|| src.to_string())
}

/// Body markup of the entry: its content, or its summary when it has none.
fn raw_content(entry: &ParsedEntry) -> &str {
    entry
        .content
        .as_deref()
        .or(entry.summary.as_deref())
        .unwrap_or_default()
}

/// Vocabulary keywords found in `title` or `content`, title-cased, at most
/// [`MAX_TAGS`]. Vocabulary order, not relevance.
pub fn extract_tags(title: &str, content: &str) -> Vec<String> {
    let haystack = format!("{} {}", title, content).to_lowercase();

    TAG_VOCABULARY
        .iter()
        .filter(|keyword| haystack.contains(&keyword.to_lowercase()))
        .take(MAX_TAGS)
        .map(|keyword| title_case(keyword))
        .collect()
}

/// Published, else updated, else `now`.
pub fn resolve_published(entry: &ParsedEntry, now: DateTime<Utc>) -> DateTime<Utc> {
    entry.published_at.or(entry.updated_at).unwrap_or(now)
}

pub fn normalize(entry: &ParsedEntry, source: &Source, now: DateTime<Utc>) -> Result<Article, NormalizeError> {
    let title = entry
        .title
        .as_deref()
        .map(clean_html)
        .filter(|title| !title.is_empty())
        .ok_or(NormalizeError::MissingTitle)?;

    let url = entry
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or(NormalizeError::MissingLink)?
        .to_string();

    let content_text = clean_html(raw_content(entry));

    let summary_text = entry
        .summary
        .as_deref()
        .map(clean_html)
        .filter(|summary| !summary.is_empty())
        .unwrap_or_else(|| {
            format!(
                "{}{}",
                take_chars(&content_text, DERIVED_SUMMARY_CHARS),
                TRUNCATION_MARKER
            )
        });

    let tags = extract_tags(&title, &content_text);

    Ok(Article {
        id: Uuid::new_v4(),
        title,
        summary: truncate_with_marker(&summary_text, SUMMARY_MAX_CHARS, TRUNCATION_MARKER),
        content: truncate_with_marker(&content_text, CONTENT_MAX_CHARS, TRUNCATION_MARKER),
        url,
        image_url: extract_image(entry),
        source: source.key.clone(),
        source_name: source.name.clone(),
        source_color: source.color.clone(),
        category: source.category.clone(),
        published_date: resolve_published(entry, now),
        created_at: now,
        tags,
    })
}
