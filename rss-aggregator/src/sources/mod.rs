pub mod tech;

use std::collections::HashSet;

use serde::Serialize;

use crate::types::{AggregatorError, Result};
use crate::utils::url::is_valid_feed_url;

/// Static metadata for one syndicated feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub key: String,
    pub url: String,
    pub name: String,
    pub category: String,
    pub color: String,
}

impl Source {
    pub fn new(
        key: impl Into<String>,
        url: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
            name: name.into(),
            category: category.into(),
            color: color.into(),
        }
    }
}

/// Ordered set of sources, unique by key.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Source>) -> Result<Self> {
        let mut seen = HashSet::new();
        for source in &sources {
            if !seen.insert(source.key.as_str()) {
                return Err(AggregatorError::InvalidRegistry(format!(
                    "duplicate source key: {}",
                    source.key
                )));
            }
            if !is_valid_feed_url(&source.url) {
                return Err(AggregatorError::InvalidRegistry(format!(
                    "source {} has a non-http(s) url: {}",
                    source.key, source.url
                )));
            }
        }

        Ok(Self { sources })
    }

    /// The tech outlets the aggregator ships with.
    pub fn builtin() -> Self {
        Self {
            sources: tech::builtin_sources(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Source> {
        self.sources.iter().find(|source| source.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
