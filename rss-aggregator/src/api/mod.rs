//! HTTP surface, mounted under `/api`.

pub mod error;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::query::QueryService;
use crate::RssAggregator;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<RssAggregator>,
    pub queries: Arc<QueryService>,
}

impl AppState {
    pub fn new(aggregator: Arc<RssAggregator>, queries: Arc<QueryService>) -> Self {
        Self { aggregator, queries }
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api", get(handlers::root))
        .route("/api/", get(handlers::root))
        .route("/api/articles", get(handlers::list_articles))
        .route("/api/sources", get(handlers::list_sources))
        .route("/api/stats", get(handlers::stats))
        .route("/api/refresh", post(handlers::refresh))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api_routes()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
