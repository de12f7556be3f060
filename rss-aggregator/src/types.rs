use chrono::{DateTime, Utc};
use serde::Serialize;

pub use interfaces::defs::{
    Article, ArticleFilter, ArticleStore, InsertOutcome, SourceCount, StoreError, StoreResult,
};

/// Some feed origins reject default client identifiers.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Entries processed per source per cycle; the rest of the feed is ignored.
    pub max_entries: usize,
    /// Extra attempts after the first one. Zero means a single retrieval.
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout_seconds: 30,
            max_entries: 10,
            max_retries: 0,
            retry_delay_seconds: 5,
            max_redirects: 5,
        }
    }
}

#[derive(Debug)]
pub struct ParsedFeed {
    pub title: Option<String>,
    /// Entry count of the whole document, before `max_entries` is applied.
    pub total_entries: usize,
    pub entries: Vec<ParsedEntry>,
}

/// One raw feed item, still carrying markup.
#[derive(Debug, Clone, Default)]
pub struct ParsedEntry {
    pub title: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    /// media:content / media:thumbnail attachments and RSS enclosures.
    pub media: Vec<MediaRef>,
    /// Links declared with `rel="enclosure"`.
    pub enclosures: Vec<MediaRef>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub url: String,
    pub media_type: Option<String>,
}

impl MediaRef {
    pub fn new(url: impl Into<String>, media_type: Option<&str>) -> Self {
        Self {
            url: url.into(),
            media_type: media_type.map(str::to_string),
        }
    }
}

/// An entry that could not be normalized and was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct EntryFailure {
    pub title: String,
    pub reason: String,
}

/// Everything one source produced during a cycle.
#[derive(Debug)]
pub struct SourceBatch {
    pub source: String,
    pub articles: Vec<Article>,
    pub entry_failures: Vec<EntryFailure>,
    /// Set when the whole source failed (transport or unparsable body).
    pub error: Option<AggregatorError>,
}

impl SourceBatch {
    pub fn empty(source: &str) -> Self {
        Self {
            source: source.to_string(),
            articles: Vec::new(),
            entry_failures: Vec::new(),
            error: None,
        }
    }

    pub fn failed(source: &str, error: AggregatorError) -> Self {
        Self {
            error: Some(error),
            ..Self::empty(source)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub articles: usize,
    pub skipped_entries: usize,
    pub error: Option<String>,
}

impl From<&SourceBatch> for SourceReport {
    fn from(batch: &SourceBatch) -> Self {
        Self {
            source: batch.source.clone(),
            articles: batch.articles.len(),
            skipped_entries: batch.entry_failures.len(),
            error: batch.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Outcome of one ingestion cycle.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    /// Articles produced by all fetchers.
    pub fetched: usize,
    pub inserted: usize,
    /// Already stored, by url.
    pub skipped: usize,
    /// Record-level storage failures.
    pub failed: usize,
}

impl IngestReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            sources: Vec::new(),
            fetched: 0,
            inserted: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid source registry: {0}")]
    InvalidRegistry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
