use crate::RssAggregator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};

/// Default period between timer-driven cycles.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Background task firing [`RssAggregator::run_cycle`] on a fixed period.
pub struct RefreshLoop {
    task: JoinHandle<()>,
    completed_cycles: Arc<AtomicU64>,
}

impl RefreshLoop {
    /// Starts the loop. With `run_immediately` the first cycle starts now,
    /// otherwise after one full `period`.
    pub fn spawn(aggregator: Arc<RssAggregator>, period: Duration, run_immediately: bool) -> Self {
        let completed_cycles = Arc::new(AtomicU64::new(0));
        let counter = completed_cycles.clone();

        let task = tokio::spawn(async move {
            let start = if run_immediately {
                Instant::now()
            } else {
                Instant::now() + period
            };
            let mut timer = tokio::time::interval_at(start, period);
            // A cycle that outlives the period delays the next one instead of
            // triggering a burst.
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                timer.tick().await;
                match aggregator.run_cycle().await {
                    Ok(report) => info!(
                        "Scheduled refresh finished: {} new of {} fetched",
                        report.inserted, report.fetched
                    ),
                    Err(e) => error!("Scheduled refresh failed: {}", e),
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        info!("RSS update scheduler started ({:?} interval)", period);
        Self {
            task,
            completed_cycles,
        }
    }

    pub fn completed_cycles(&self) -> u64 {
        self.completed_cycles.load(Ordering::SeqCst)
    }

    pub fn shutdown(self) {
        self.task.abort();
        info!("RSS update scheduler stopped");
    }
}
