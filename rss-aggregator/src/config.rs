use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::scheduler::DEFAULT_REFRESH_INTERVAL;

/// Runtime settings. Every flag can also come from the environment (and so
/// from a `.env` file).
#[derive(Debug, Clone, Parser)]
#[command(name = "rss-aggregator", version, about = "Tech news RSS/Atom aggregator")]
pub struct AppConfig {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Database to use instead of the one named in the connection string
    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8001")]
    pub bind: SocketAddr,

    #[arg(long, env = "REFRESH_INTERVAL_MINUTES", default_value_t = DEFAULT_REFRESH_INTERVAL.as_secs() / 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_interval_minutes: u64,

    /// Wait one full interval before the first ingestion cycle
    #[arg(long, env = "SKIP_INITIAL_REFRESH", default_value_t = false)]
    pub skip_initial_refresh: bool,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
}

impl AppConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes * 60)
    }
}
