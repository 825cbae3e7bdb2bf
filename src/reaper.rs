use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::Engine;

const REAP_EVERY: Duration = Duration::from_secs(60);
const COMPACT_CHECK_EVERY: Duration = Duration::from_secs(30);

/// Expires digital keys whose stay has ended and evicts stale cache entries.
pub async fn run_reaper(engine: Arc<Engine>) {
    let mut interval = tokio::time::interval(REAP_EVERY);
    loop {
        interval.tick().await;
        reap_once(&engine, chrono::Utc::now().date_naive()).await;
    }
}

async fn reap_once(engine: &Engine, today: chrono::NaiveDate) {
    if let Err(e) = engine.expire_keys(today).await {
        warn!("key reaper failed: {e}");
    }
    let swept = engine.sweep_cache();
    if swept > 0 {
        debug!(swept, "expired availability entries evicted");
    }
}

/// Rewrites the journal once `threshold` appends have accumulated.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_EVERY);
    loop {
        interval.tick().await;
        match engine.compact_if_needed(threshold).await {
            Ok(true) => {}
            Ok(false) => debug!("compactor skip: below {threshold} appends"),
            Err(e) => warn!("journal compaction failed: {e}"),
        }
    }
}
