use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::defs::{
    Article, ArticleFilter, ArticleStore, InsertOutcome, SourceCount, StoreError, StoreResult,
};

/// In-process [`ArticleStore`]. Holds everything behind one lock, so the
/// url check and the insert happen atomically.
#[derive(Debug, Default)]
pub struct MemoryArticleStore {
    articles: RwLock<Vec<Article>>,
    unavailable: AtomicBool,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`],
    /// the way a dropped database connection would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> Vec<Article> {
        self.articles.read().await.clone()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn find_by_url(&self, url: &str) -> StoreResult<Option<Article>> {
        self.check_available()?;
        let articles = self.articles.read().await;
        Ok(articles.iter().find(|article| article.url == url).cloned())
    }

    async fn insert_if_absent(&self, article: &Article) -> StoreResult<InsertOutcome> {
        self.check_available()?;
        let mut articles = self.articles.write().await;
        if articles.iter().any(|existing| existing.url == article.url) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        articles.push(article.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn find(&self, filter: &ArticleFilter, skip: u64, limit: u64) -> StoreResult<Vec<Article>> {
        self.check_available()?;
        let articles = self.articles.read().await;
        let mut matching: Vec<Article> = articles
            .iter()
            .filter(|article| filter.matches(article))
            .cloned()
            .collect();
        matching.sort_by(Article::newest_first);

        Ok(matching
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count(&self, filter: &ArticleFilter) -> StoreResult<u64> {
        self.check_available()?;
        let articles = self.articles.read().await;
        Ok(articles.iter().filter(|article| filter.matches(article)).count() as u64)
    }

    async fn count_by_source_name(&self) -> StoreResult<Vec<SourceCount>> {
        self.check_available()?;
        let articles = self.articles.read().await;

        let mut counts: HashMap<&str, u64> = HashMap::new();
        for article in articles.iter() {
            *counts.entry(article.source_name.as_str()).or_default() += 1;
        }

        let mut grouped: Vec<SourceCount> = counts
            .into_iter()
            .map(|(source_name, count)| SourceCount {
                source_name: source_name.to_string(),
                count,
            })
            .collect();
        grouped.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.source_name.cmp(&b.source_name))
        });
        Ok(grouped)
    }
}
