pub mod defs;
pub mod state;

pub use defs::{
    Article, ArticleFilter, ArticleStore, InsertOutcome, SourceCount, StoreError, StoreResult,
};
pub use state::MemoryArticleStore;
