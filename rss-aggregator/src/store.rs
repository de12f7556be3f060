use crate::types::{
    Article, ArticleFilter, ArticleStore, InsertOutcome, Result, SourceCount, StoreError,
    StoreResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const ARTICLE_COLUMNS: &str = "id, title, summary, content, url, image_url, source, source_name, \
     source_color, category, published_date, created_at, tags";

/// PostgreSQL-backed [`ArticleStore`]. Schema lives in `migrations/`.
pub struct PgArticleStore {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct ArticleRow {
    id: Uuid,
    title: String,
    summary: String,
    content: String,
    url: String,
    image_url: Option<String>,
    source: String,
    source_name: String,
    source_color: String,
    category: String,
    published_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    tags: Vec<String>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            summary: row.summary,
            content: row.content,
            url: row.url,
            image_url: row.image_url,
            source: row.source,
            source_name: row.source_name,
            source_color: row.source_color,
            category: row.category,
            published_date: row.published_date,
            created_at: row.created_at,
            tags: row.tags,
        }
    }
}

/// Connection-level failures make the whole store unusable; anything else is
/// scoped to the statement that hit it.
fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        _ => StoreError::Backend(err.to_string()),
    }
}

/// Escapes LIKE wildcards so search terms match literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ArticleFilter) {
    builder.push(" WHERE TRUE");

    if let Some(source) = &filter.source {
        builder.push(" AND source = ").push_bind(source.clone());
    }

    if let Some(category) = &filter.category {
        builder.push(" AND category = ").push_bind(category.clone());
    }

    if let Some(since) = filter.published_since {
        builder.push(" AND published_date >= ").push_bind(since);
    }

    if let Some(term) = &filter.search {
        let pattern = format!("%{}%", escape_like(term));
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR summary ILIKE ")
            .push_bind(pattern)
            .push(" OR EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE lower(tag) = lower(")
            .push_bind(term.clone())
            .push(")))");
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl PgArticleStore {
    /// Connects to `database_url`. `database_name`, when given, replaces the
    /// database named in the URL.
    pub async fn connect(database_url: &str, database_name: Option<&str>, max_connections: u32) -> Result<Self> {
        let mut options = PgConnectOptions::from_str(database_url)?;
        if let Some(name) = database_name {
            options = options.database(name);
        }

        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        Ok(Self { db })
    }

    /// Creates the `articles` table with its unique url constraint and the
    /// published_date / source indexes.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn find_by_url(&self, url: &str) -> StoreResult<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE url = $1"
        ))
        .bind(url)
        .fetch_optional(&self.db)
        .await
        .map_err(store_error)?;

        Ok(row.map(Article::from))
    }

    async fn insert_if_absent(&self, article: &Article) -> StoreResult<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (id, title, summary, content, url, image_url, source, source_name,
                                  source_color, category, published_date, created_at, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(article.id)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.content)
        .bind(&article.url)
        .bind(&article.image_url)
        .bind(&article.source)
        .bind(&article.source_name)
        .bind(&article.source_color)
        .bind(&article.category)
        .bind(article.published_date)
        .bind(article.created_at)
        .bind(&article.tags)
        .execute(&self.db)
        .await
        .map_err(store_error)?;

        if result.rows_affected() > 0 {
            Ok(InsertOutcome::Inserted)
        } else {
            debug!("Url already stored: {}", article.url);
            Ok(InsertOutcome::AlreadyPresent)
        }
    }

    async fn find(&self, filter: &ArticleFilter, skip: u64, limit: u64) -> StoreResult<Vec<Article>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {ARTICLE_COLUMNS} FROM articles"));
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY published_date DESC, created_at DESC OFFSET ")
            .push_bind(to_i64(skip))
            .push(" LIMIT ")
            .push_bind(to_i64(limit));

        let rows = builder
            .build_query_as::<ArticleRow>()
            .fetch_all(&self.db)
            .await
            .map_err(store_error)?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    async fn count(&self, filter: &ArticleFilter) -> StoreResult<u64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM articles");
        push_filter(&mut builder, filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await
            .map_err(store_error)?;

        Ok(count.max(0) as u64)
    }

    async fn count_by_source_name(&self) -> StoreResult<Vec<SourceCount>> {
        let rows = sqlx::query(
            r#"
            SELECT source_name, COUNT(*) AS count
            FROM articles
            GROUP BY source_name
            ORDER BY count DESC, source_name ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(store_error)?;

        rows.into_iter()
            .map(|row| {
                let count: i64 = row.try_get("count")?;
                Ok(SourceCount {
                    source_name: row.try_get("source_name")?,
                    count: count.max(0) as u64,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .map_err(store_error)
    }
}
