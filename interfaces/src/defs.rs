use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical, immutable record of one feed entry.
///
/// `source_name`, `source_color` and `category` are copied from the source
/// registry when the article is ingested and are never re-synced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub content: String,
    /// Dedup key. No two stored articles share a url.
    pub url: String,
    pub image_url: Option<String>,
    pub source: String,
    pub source_name: String,
    pub source_color: String,
    pub category: String,
    pub published_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

impl Article {
    /// Ordering used by every listing: newest `published_date` first, then
    /// newest `created_at`.
    pub fn newest_first(a: &Article, b: &Article) -> Ordering {
        b.published_date
            .cmp(&a.published_date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    }
}

/// Conjunction of optional predicates over stored articles.
///
/// `search` is itself a disjunction: a case-insensitive substring of the
/// title or summary, or a whole tag compared case-insensitively (`AI`
/// matches the stored tag `Ai`, `A` does not).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleFilter {
    pub source: Option<String>,
    pub category: Option<String>,
    pub published_since: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl ArticleFilter {
    pub fn matches(&self, article: &Article) -> bool {
        if let Some(source) = &self.source {
            if &article.source != source {
                return false;
            }
        }

        if let Some(category) = &self.category {
            if &article.category != category {
                return false;
            }
        }

        if let Some(since) = self.published_since {
            if article.published_date < since {
                return false;
            }
        }

        if let Some(term) = &self.search {
            let needle = term.to_lowercase();
            let in_text = article.title.to_lowercase().contains(&needle)
                || article.summary.to_lowercase().contains(&needle);
            if !in_text && !article.tags.iter().any(|tag| tag.to_lowercase() == needle) {
                return false;
            }
        }

        true
    }
}

/// Article count for one `source_name`. Serialized with the `_id` key the
/// stats endpoint exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    #[serde(rename = "_id")]
    pub source_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another record already holds this url. Not an error.
    AlreadyPresent,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached at all (connection refused, pool closed).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage handle shared by the ingestion side (sole writer) and the query
/// side (readers).
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn find_by_url(&self, url: &str) -> StoreResult<Option<Article>>;

    /// Inserts unless an article with the same url exists. Must be atomic per
    /// record so overlapping ingestion cycles cannot create duplicates.
    async fn insert_if_absent(&self, article: &Article) -> StoreResult<InsertOutcome>;

    /// Matching articles ordered by [`Article::newest_first`].
    async fn find(&self, filter: &ArticleFilter, skip: u64, limit: u64) -> StoreResult<Vec<Article>>;

    async fn count(&self, filter: &ArticleFilter) -> StoreResult<u64>;

    /// Article counts grouped by `source_name`, largest first.
    async fn count_by_source_name(&self) -> StoreResult<Vec<SourceCount>>;
}
