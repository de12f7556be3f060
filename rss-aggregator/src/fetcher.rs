use crate::normalizer::normalize;
use crate::parser::FeedParser;
use crate::sources::Source;
use crate::types::{AggregatorError, EntryFailure, FetchConfig, Result, SourceBatch};
use crate::utils::text::take_chars;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use chrono::Utc;
use bytes::Bytes;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Characters of an entry title kept in diagnostics.
const LOG_TITLE_CHARS: usize = 50;

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    parser: FeedParser,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        let parser = FeedParser::new(config.max_entries);

        Ok(Self {
            client,
            config,
            parser,
        })
    }

    /// Fetches, parses and normalizes one source. Never fails: transport and
    /// parse problems end up in [`SourceBatch::error`], bad entries in
    /// [`SourceBatch::entry_failures`].
    pub async fn fetch_source(&self, source: &Source) -> SourceBatch {
        info!("Fetching RSS feed for {}", source.name);

        let body = match self.fetch_feed(&source.url).await {
            Ok(body) => body,
            Err(e) => {
                error!("Error fetching RSS feed for {}: {}", source.name, e);
                return SourceBatch::failed(&source.key, e);
            }
        };

        let parsed = match self.parser.parse_feed(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("Error parsing RSS feed for {}: {}", source.name, e);
                return SourceBatch::failed(&source.key, e);
            }
        };

        if parsed.entries.is_empty() {
            warn!("No entries found for {}", source.name);
            return SourceBatch::empty(&source.key);
        }

        debug!(
            "{} ({}) delivered {} entries, processing {}",
            source.name,
            parsed.title.as_deref().unwrap_or("untitled feed"),
            parsed.total_entries,
            parsed.entries.len()
        );

        let mut batch = SourceBatch::empty(&source.key);
        for entry in &parsed.entries {
            match normalize(entry, source, Utc::now()) {
                Ok(article) => batch.articles.push(article),
                Err(e) => {
                    let title = take_chars(entry.title.as_deref().unwrap_or("<untitled>"), LOG_TITLE_CHARS);
                    warn!("Error processing entry from {} ({}): {}", source.name, title, e);
                    batch.entry_failures.push(EntryFailure {
                        title: title.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Successfully fetched {} articles from {}",
            batch.articles.len(),
            source.name
        );
        batch
    }

    /// Retrieves the raw feed body, undecoded: the feed parser picks the
    /// charset from the XML declaration. Retries only when `max_retries > 0`.
    pub async fn fetch_feed(&self, url: &str) -> Result<Bytes> {
        let start_time = Instant::now();

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => {
                    debug!(
                        "Fetched {} ({} bytes) in {}ms",
                        url,
                        body.len(),
                        start_time.elapsed().as_millis()
                    );
                    return Ok(body);
                }
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| Duration::from_secs(self.config.retry_delay_seconds));
                    warn!("Attempt {} failed for {}: {}, retrying in {:?}", attempt, url, e, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Bytes> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(AggregatorError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.bytes().await?)
    }
}
