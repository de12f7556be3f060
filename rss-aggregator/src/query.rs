//! Read side: filtered listings, statistics and the source directory.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sources::SourceRegistry;
use crate::types::{Article, ArticleFilter, ArticleStore, SourceCount, StoreError};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;
pub const MIN_HOURS: i64 = 1;
/// One week.
pub const MAX_HOURS: i64 = 168;
pub const RECENT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Malformed parameters; never reaches storage.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `/articles` parameters exactly as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleQueryParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub source: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub hours: Option<i64>,
}

/// Validated `/articles` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleQuery {
    pub page: u64,
    pub per_page: u64,
    pub source: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub hours: Option<u32>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn check_range(name: &str, value: i64, min: i64, max: Option<i64>) -> Result<(), QueryError> {
    if value < min {
        return Err(QueryError::Validation(format!(
            "{name} must be greater than or equal to {min}"
        )));
    }
    if let Some(max) = max {
        if value > max {
            return Err(QueryError::Validation(format!(
                "{name} must be less than or equal to {max}"
            )));
        }
    }
    Ok(())
}

impl ArticleQueryParams {
    pub fn validate(self) -> Result<ArticleQuery, QueryError> {
        let page = self.page.unwrap_or(DEFAULT_PAGE);
        check_range("page", page, 1, None)?;

        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        check_range("per_page", per_page, 1, Some(MAX_PER_PAGE))?;

        if let Some(hours) = self.hours {
            check_range("hours", hours, MIN_HOURS, Some(MAX_HOURS))?;
        }

        Ok(ArticleQuery {
            page: page as u64,
            per_page: per_page as u64,
            source: non_empty(self.source),
            category: non_empty(self.category),
            search: non_empty(self.search),
            hours: self.hours.map(|h| h as u32),
        })
    }
}

impl ArticleQuery {
    pub fn filter_at(&self, now: DateTime<Utc>) -> ArticleFilter {
        ArticleFilter {
            source: self.source.clone(),
            category: self.category.clone(),
            published_since: self.hours.map(|h| now - Duration::hours(i64::from(h))),
            search: self.search.clone(),
        }
    }

    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_articles: u64,
    pub recent_articles_24h: u64,
    pub by_source: Vec<SourceCount>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub key: String,
    pub name: String,
    pub category: String,
    pub color: String,
    pub article_count: u64,
}

pub struct QueryService {
    store: Arc<dyn ArticleStore>,
    registry: SourceRegistry,
}

impl QueryService {
    pub fn new(store: Arc<dyn ArticleStore>, registry: SourceRegistry) -> Self {
        Self { store, registry }
    }

    pub async fn list_articles(&self, query: &ArticleQuery) -> Result<ArticlePage, QueryError> {
        self.list_articles_at(query, Utc::now()).await
    }

    /// [`QueryService::list_articles`] with `now` as the reference for the
    /// `hours` window.
    pub async fn list_articles_at(&self, query: &ArticleQuery, now: DateTime<Utc>) -> Result<ArticlePage, QueryError> {
        let filter = query.filter_at(now);
        debug!("Listing articles with {:?}", filter);

        let total = self.store.count(&filter).await?;
        let articles = self
            .store
            .find(&filter, query.skip(), query.per_page)
            .await?;

        Ok(ArticlePage {
            articles,
            total,
            page: query.page,
            per_page: query.per_page,
        })
    }

    pub async fn stats(&self) -> Result<Stats, QueryError> {
        self.stats_at(Utc::now()).await
    }

    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<Stats, QueryError> {
        let total_articles = self.store.count(&ArticleFilter::default()).await?;

        let recent = ArticleFilter {
            published_since: Some(now - Duration::hours(RECENT_WINDOW_HOURS)),
            ..Default::default()
        };
        let recent_articles_24h = self.store.count(&recent).await?;

        let mut by_source = self.store.count_by_source_name().await?;
        by_source.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.source_name.cmp(&b.source_name))
        });

        Ok(Stats {
            total_articles,
            recent_articles_24h,
            by_source,
            last_updated: now,
        })
    }

    /// Every registry entry with its live article count.
    pub async fn sources(&self) -> Result<Vec<SourceSummary>, QueryError> {
        let mut summaries = Vec::with_capacity(self.registry.len());

        for source in self.registry.iter() {
            let filter = ArticleFilter {
                source: Some(source.key.clone()),
                ..Default::default()
            };
            let article_count = self.store.count(&filter).await?;

            summaries.push(SourceSummary {
                key: source.key.clone(),
                name: source.name.clone(),
                category: source.category.clone(),
                color: source.color.clone(),
                article_count,
            });
        }

        Ok(summaries)
    }
}
