//! Expiry scheduler: closes balloons whose window has elapsed
//!
//! One long-running loop, started once at process boot, never per-request.
//! Each tick is a single batch UPDATE; balloons where both members have
//! already messaged are exempt and can only be closed by explicit user
//! actions. Tick failures are logged and the loop continues on schedule.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::models::{BalloonState, CloseReason};
use crate::rules;

/// Default sweep cadence.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Close every ACTIVE balloon past its expiry with no bidirectional
/// communication, as one batch. Returns the number of balloons closed.
///
/// `now` is a parameter so ticks stay testable; the run loop passes the
/// current time.
pub async fn sweep_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE matches SET balloon_state = ?, close_reason = ?, closed_at = ?
         WHERE balloon_state = ?
           AND closed_at IS NULL
           AND both_messaged_at IS NULL
           AND expires_at <= ?",
    )
    .bind(BalloonState::Closed.as_str())
    .bind(CloseReason::Expire.as_str())
    .bind(now)
    .bind(BalloonState::Active.as_str())
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to close expired balloons")?;

    Ok(result.rows_affected())
}

/// Run the sweep on a fixed cadence until `shutdown` fires.
///
/// A tick either fully commits or leaves nothing behind; shutdown is only
/// observed mid-sleep, so a half-applied batch is impossible.
pub async fn run(pool: SqlitePool, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log::info!("Expiry scheduler started (interval {:?})", interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep_expired(&pool, rules::now_utc()).await {
                    Ok(0) => log::debug!("Expiry sweep: nothing to close"),
                    Ok(count) => log::info!("Expiry sweep closed {} balloon(s)", count),
                    Err(e) => log::error!("Expiry sweep failed: {:#}", e),
                }
            }
            _ = shutdown.changed() => {
                log::info!("Expiry scheduler shutting down");
                break;
            }
        }
    }
}
