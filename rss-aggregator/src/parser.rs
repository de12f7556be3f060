use crate::types::{AggregatorError, MediaRef, ParsedEntry, ParsedFeed, Result};
use feed_rs::model::{Entry, Link};
use feed_rs::parser;
use tracing::debug;

pub struct FeedParser {
    max_entries: usize,
}

impl FeedParser {
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }

    /// Parses an RSS or Atom document from raw bytes, keeping the first
    /// `max_entries` entries in document order.
    pub fn parse_feed(&self, content: &[u8]) -> Result<ParsedFeed> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content)
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed: {}", e)))?;

        let title = feed.title.map(|t| t.content);
        let total_entries = feed.entries.len();

        let entries: Vec<ParsedEntry> = feed
            .entries
            .into_iter()
            .take(self.max_entries)
            .map(Self::parse_entry)
            .collect();

        debug!(
            "Parsed feed with {} entries, keeping {}",
            total_entries,
            entries.len()
        );

        Ok(ParsedFeed {
            title,
            total_entries,
            entries,
        })
    }

    fn parse_entry(entry: Entry) -> ParsedEntry {
        let url = Self::primary_link(&entry.links).map(|link| link.href.clone());

        let enclosures = entry
            .links
            .iter()
            .filter(|link| link.rel.as_deref() == Some("enclosure"))
            .map(|link| MediaRef::new(link.href.clone(), link.media_type.as_deref()))
            .collect();

        // RSS <enclosure> elements end up here as well as media:content.
        let mut media = Vec::new();
        for object in &entry.media {
            for content in &object.content {
                if let Some(url) = &content.url {
                    let media_type = content.content_type.as_ref().map(|mime| mime.to_string());
                    media.push(MediaRef::new(url.to_string(), media_type.as_deref()));
                }
            }
            for thumbnail in &object.thumbnails {
                media.push(MediaRef::new(thumbnail.image.uri.clone(), None));
            }
        }

        ParsedEntry {
            title: entry.title.map(|t| t.content),
            url,
            summary: entry.summary.map(|s| s.content),
            content: entry.content.and_then(|c| c.body),
            media,
            enclosures,
            published_at: entry.published,
            updated_at: entry.updated,
        }
    }

    /// The alternate link, falling back to the first non-enclosure link.
    fn primary_link(links: &[Link]) -> Option<&Link> {
        links
            .iter()
            .find(|link| matches!(link.rel.as_deref(), None | Some("alternate")))
            .or_else(|| {
                links
                    .iter()
                    .find(|link| link.rel.as_deref() != Some("enclosure"))
            })
    }
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new(10)
    }
}
