use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::engine::Engine;

const REAPER_INTERVAL: Duration = Duration::from_secs(60 * 60);
const COMPACTOR_INTERVAL: Duration = Duration::from_secs(30);

/// Oldest booking date still kept when `today` is the current date.
pub fn retention_cutoff(today: NaiveDate, retention_days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(retention_days)))
        .unwrap_or(NaiveDate::MIN)
}

/// One reaper pass: purge bookings dated before the retention window.
pub async fn reap_once(engine: &Engine, today: NaiveDate, retention_days: u32) -> usize {
    let cutoff = retention_cutoff(today, retention_days);
    match engine.purge_bookings_before(cutoff).await {
        Ok(0) => {
            debug!("reaper: nothing before {cutoff}");
            0
        }
        Ok(n) => {
            info!("reaped {n} bookings dated before {cutoff}");
            metrics::counter!(crate::observability::BOOKINGS_PURGED_TOTAL).increment(n as u64);
            n
        }
        Err(e) => {
            warn!("reaper failed: {e}");
            0
        }
    }
}

/// Background task that periodically purges expired temporary bookings.
pub async fn run_reaper(engine: Arc<Engine>, retention_days: u32) {
    let mut interval = tokio::time::interval(REAPER_INTERVAL);
    loop {
        interval.tick().await;
        reap_once(&engine, Local::now().date_naive(), retention_days).await;
    }
}

/// Background task that rewrites the journal once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACTOR_INTERVAL);
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!("compacted journal after {appends} appends"),
            Err(e) => warn!("compaction failed: {e}"),
        }
    }
}
