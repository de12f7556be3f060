use crate::sources::SourceRegistry;
use crate::types::{
    Article, ArticleStore, InsertOutcome, IngestReport, Result, SourceBatch, SourceReport,
    StoreResult,
};
use crate::utils::text::take_chars;
use crate::Fetcher;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Runs ingestion cycles: fetch every source, keep unseen urls, insert them.
///
/// The startup run, the timer and manual refreshes all go through
/// [`RssAggregator::run_cycle`].
pub struct RssAggregator {
    registry: SourceRegistry,
    fetcher: Arc<Fetcher>,
    store: Arc<dyn ArticleStore>,
}

impl RssAggregator {
    pub fn new(registry: SourceRegistry, fetcher: Fetcher, store: Arc<dyn ArticleStore>) -> Self {
        Self {
            registry,
            fetcher: Arc::new(fetcher),
            store,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// One full ingestion cycle. Safe to run while another cycle is in
    /// flight: the store's insert-if-absent keeps urls unique.
    ///
    /// Fails only when the store is unreachable; per-source and per-record
    /// problems are logged and counted in the report.
    pub async fn run_cycle(&self) -> Result<IngestReport> {
        let mut report = IngestReport::new(Utc::now());
        info!(
            "Starting RSS feed update cycle across {} sources",
            self.registry.len()
        );

        let batches = self.fetch_all_sources().await;

        let mut articles = Vec::new();
        for batch in batches {
            report.sources.push(SourceReport::from(&batch));
            articles.extend(batch.articles);
        }
        report.fetched = articles.len();

        for article in &articles {
            match self.store_article(article).await {
                Ok(InsertOutcome::Inserted) => {
                    report.inserted += 1;
                    info!("Inserted new article: {}...", take_chars(&article.title, 50));
                }
                Ok(InsertOutcome::AlreadyPresent) => {
                    report.skipped += 1;
                }
                Err(e) if e.is_unavailable() => {
                    error!("Aborting update cycle, store unavailable: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    report.failed += 1;
                    error!("Error inserting article {}: {}", article.url, e);
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            "RSS feed update completed. Processed {} articles: {} new, {} already stored, {} failed",
            report.fetched, report.inserted, report.skipped, report.failed
        );
        Ok(report)
    }

    /// Fetches every registered source concurrently.
    pub async fn fetch_all_sources(&self) -> Vec<SourceBatch> {
        join_all(
            self.registry
                .iter()
                .map(|source| self.fetcher.fetch_source(source)),
        )
        .await
    }

    async fn store_article(&self, article: &Article) -> StoreResult<InsertOutcome> {
        if self.store.find_by_url(&article.url).await?.is_some() {
            debug!("Skipping already stored article: {}", article.url);
            return Ok(InsertOutcome::AlreadyPresent);
        }

        self.store.insert_if_absent(article).await
    }
}
