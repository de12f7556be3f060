pub mod types;
pub mod sources;
pub mod utils;
pub mod normalizer;
pub mod parser;
pub mod fetcher;
pub mod aggregator;
pub mod scheduler;
pub mod store;
pub mod query;
pub mod config;
pub mod api;

pub use types::*;
pub use sources::{Source, SourceRegistry};
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use aggregator::RssAggregator;
pub use scheduler::RefreshLoop;
pub use store::PgArticleStore;
pub use query::QueryService;
pub use config::AppConfig;
pub use interfaces::MemoryArticleStore;
