//! Daily interaction budget ledger
//!
//! Gates and records a user's spend against two nested caps (5 total, 2
//! pending) plus a separate games counter (2 per day). Each attempt is one
//! transaction: read (or lazily create) today's record, check the cap,
//! increment, commit. Under concurrent attempts for the same user and day the
//! store rejects one of the two transactions; the caller owns the decision to
//! retry — nothing here retries internally.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::models::{DailyInteractionRecord, GameSpendResult, SpendDenyReason, SpendResult, SpendType};
use crate::rules;

/// Attempt to spend one unit of today's budget for `user_id`.
///
/// Denials (cap reached) are returned in the result with counters unchanged.
/// Storage conflicts propagate as errors; the failed transaction left no
/// partial state, so retrying the whole call is safe.
pub async fn try_spend(pool: &SqlitePool, user_id: i64, spend_type: SpendType) -> Result<SpendResult> {
    let day = rules::today_utc();
    let now = rules::now_utc();

    let mut tx = pool.begin().await.context("Failed to begin spend transaction")?;

    let row: Option<(i64, i64)> = sqlx::query_as(
        "SELECT total_used, pending_used FROM daily_interactions
         WHERE user_id = ? AND date_utc = ?",
    )
    .bind(user_id)
    .bind(day)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to read daily interaction record")?;

    let (total_used, pending_used) = match row {
        Some(counters) => counters,
        None => {
            // First spend of the day: persist the zeroed record inside the
            // transaction so concurrent readers observe it after commit.
            sqlx::query(
                "INSERT INTO daily_interactions (user_id, date_utc, total_used, pending_used, games_initiated, updated_at)
                 VALUES (?, ?, 0, 0, 0, ?)",
            )
            .bind(user_id)
            .bind(day)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to create daily interaction record")?;
            (0, 0)
        }
    };

    if total_used >= rules::DAILY_TOTAL_CAP {
        tx.rollback().await.context("Failed to roll back spend transaction")?;
        return Ok(SpendResult::denied(SpendDenyReason::DailyTotalCapReached, total_used, pending_used));
    }
    if spend_type == SpendType::Pending && pending_used >= rules::DAILY_PENDING_CAP {
        tx.rollback().await.context("Failed to roll back spend transaction")?;
        return Ok(SpendResult::denied(SpendDenyReason::DailyPendingCapReached, total_used, pending_used));
    }

    let new_total = total_used + 1;
    let new_pending = match spend_type {
        SpendType::Pending => pending_used + 1,
        SpendType::Moment => pending_used,
    };

    sqlx::query(
        "UPDATE daily_interactions SET total_used = ?, pending_used = ?, updated_at = ?
         WHERE user_id = ? AND date_utc = ?",
    )
    .bind(new_total)
    .bind(new_pending)
    .bind(now)
    .bind(user_id)
    .bind(day)
    .execute(&mut *tx)
    .await
    .context("Failed to increment daily counters")?;

    tx.commit().await.context("Failed to commit spend transaction")?;

    log::debug!(
        "User {} spent {:?}: total {}/{}, pending {}/{}",
        user_id, spend_type, new_total, rules::DAILY_TOTAL_CAP, new_pending, rules::DAILY_PENDING_CAP
    );

    Ok(SpendResult::allowed(new_total, new_pending))
}

/// Attempt to record one game initiation for `user_id` today.
///
/// Same transaction discipline as [`try_spend`]; games do not consume the
/// total or pending counters.
pub async fn try_record_game(pool: &SqlitePool, user_id: i64) -> Result<GameSpendResult> {
    let day = rules::today_utc();
    let now = rules::now_utc();

    let mut tx = pool.begin().await.context("Failed to begin game spend transaction")?;

    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT games_initiated FROM daily_interactions
         WHERE user_id = ? AND date_utc = ?",
    )
    .bind(user_id)
    .bind(day)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to read daily interaction record")?;

    let games_initiated = match row {
        Some((games,)) => games,
        None => {
            sqlx::query(
                "INSERT INTO daily_interactions (user_id, date_utc, total_used, pending_used, games_initiated, updated_at)
                 VALUES (?, ?, 0, 0, 0, ?)",
            )
            .bind(user_id)
            .bind(day)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to create daily interaction record")?;
            0
        }
    };

    if games_initiated >= rules::DAILY_GAMES_CAP {
        tx.rollback().await.context("Failed to roll back game spend transaction")?;
        return Ok(GameSpendResult {
            allowed: false,
            deny_reason: Some(SpendDenyReason::DailyGamesCapReached),
            games_initiated,
        });
    }

    let new_games = games_initiated + 1;

    sqlx::query(
        "UPDATE daily_interactions SET games_initiated = ?, updated_at = ?
         WHERE user_id = ? AND date_utc = ?",
    )
    .bind(new_games)
    .bind(now)
    .bind(user_id)
    .bind(day)
    .execute(&mut *tx)
    .await
    .context("Failed to increment games counter")?;

    tx.commit().await.context("Failed to commit game spend transaction")?;

    log::debug!("User {} initiated game {}/{}", user_id, new_games, rules::DAILY_GAMES_CAP);

    Ok(GameSpendResult { allowed: true, deny_reason: None, games_initiated: new_games })
}

/// Read-only view of today's record for `user_id`. An absent record reads as
/// all-zero counters.
pub async fn remaining_budget(pool: &SqlitePool, user_id: i64) -> Result<DailyInteractionRecord> {
    let day = rules::today_utc();

    let row: Option<(i64, i64, i64, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
        "SELECT total_used, pending_used, games_initiated, updated_at FROM daily_interactions
         WHERE user_id = ? AND date_utc = ?",
    )
    .bind(user_id)
    .bind(day)
    .fetch_optional(pool)
    .await
    .context("Failed to read daily interaction record")?;

    Ok(match row {
        Some((total_used, pending_used, games_initiated, updated_at)) => DailyInteractionRecord {
            user_id,
            date_utc: day,
            total_used,
            pending_used,
            games_initiated,
            updated_at,
        },
        None => DailyInteractionRecord {
            user_id,
            date_utc: day,
            total_used: 0,
            pending_used: 0,
            games_initiated: 0,
            updated_at: rules::now_utc(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_moment_spend_sequence_hits_total_cap() {
        let pool = db::test_pool().await;

        for expected in 1..=5 {
            let result = try_spend(&pool, 1, SpendType::Moment).await.unwrap();
            assert!(result.allowed);
            assert_eq!(result.total_used, expected);
            assert_eq!(result.pending_used, 0);
        }

        let result = try_spend(&pool, 1, SpendType::Moment).await.unwrap();
        assert!(!result.allowed);
        assert_eq!(result.deny_reason, Some(SpendDenyReason::DailyTotalCapReached));
        assert_eq!(result.deny_reason.unwrap().message(), "daily total cap reached");
        assert_eq!(result.total_used, 5);

        // Counters unchanged in storage
        let record = remaining_budget(&pool, 1).await.unwrap();
        assert_eq!(record.total_used, 5);
        assert_eq!(record.pending_used, 0);
    }

    #[tokio::test]
    async fn test_pending_cap_is_nested_inside_total_cap() {
        let pool = db::test_pool().await;

        for expected in 1..=2 {
            let result = try_spend(&pool, 2, SpendType::Pending).await.unwrap();
            assert!(result.allowed);
            assert_eq!(result.pending_used, expected);
        }

        // Third pending is denied even though total_used is only 2
        let result = try_spend(&pool, 2, SpendType::Pending).await.unwrap();
        assert!(!result.allowed);
        assert_eq!(result.deny_reason, Some(SpendDenyReason::DailyPendingCapReached));
        assert_eq!(result.deny_reason.unwrap().message(), "daily pending cap reached");
        assert_eq!(result.total_used, 2);
        assert_eq!(result.pending_used, 2);

        // Moment spends still work until the total cap
        for expected in 3..=5 {
            let result = try_spend(&pool, 2, SpendType::Moment).await.unwrap();
            assert!(result.allowed);
            assert_eq!(result.total_used, expected);
        }
        let result = try_spend(&pool, 2, SpendType::Moment).await.unwrap();
        assert!(!result.allowed);
        assert_eq!(result.deny_reason, Some(SpendDenyReason::DailyTotalCapReached));
    }

    #[tokio::test]
    async fn test_games_counter_independent_of_spend_counters() {
        let pool = db::test_pool().await;

        for expected in 1..=2 {
            let result = try_record_game(&pool, 3).await.unwrap();
            assert!(result.allowed);
            assert_eq!(result.games_initiated, expected);
        }

        let result = try_record_game(&pool, 3).await.unwrap();
        assert!(!result.allowed);
        assert_eq!(result.deny_reason, Some(SpendDenyReason::DailyGamesCapReached));
        assert_eq!(result.games_initiated, 2);

        // Games never consumed the spend budget
        let record = remaining_budget(&pool, 3).await.unwrap();
        assert_eq!(record.total_used, 0);
        assert_eq!(record.games_initiated, 2);
    }

    #[tokio::test]
    async fn test_remaining_budget_reads_zero_for_absent_record() {
        let pool = db::test_pool().await;
        let record = remaining_budget(&pool, 99).await.unwrap();
        assert_eq!(record.total_used, 0);
        assert_eq!(record.pending_used, 0);
        assert_eq!(record.games_initiated, 0);
    }

    #[tokio::test]
    async fn test_concurrent_spends_cannot_exceed_total_cap() {
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
        use std::time::Duration as StdDuration;

        // Two separate connections to the same file, like two service
        // instances sharing one store.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("budget.db");

        let mut pools = Vec::new();
        for _ in 0..2 {
            let options = SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(StdDuration::from_secs(5));
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await
                .unwrap();
            pools.push(pool);
        }
        crate::db::schema::ensure_schema(&pools[0]).await.unwrap();

        // Bring the user to one spend below the total cap
        for _ in 0..4 {
            assert!(try_spend(&pools[0], 7, SpendType::Moment).await.unwrap().allowed);
        }

        let (r1, r2) = tokio::join!(
            try_spend(&pools[0], 7, SpendType::Moment),
            try_spend(&pools[1], 7, SpendType::Moment),
        );

        // At most one racer gets the last unit; the other is denied or
        // aborted by the store as a transient conflict the caller may retry.
        let allowed = [&r1, &r2]
            .into_iter()
            .filter(|r| r.as_ref().map(|res| res.allowed).unwrap_or(false))
            .count();
        assert!(allowed <= 1);

        // The stored counter never passed its cap
        let (total_used,): (i64,) =
            sqlx::query_as("SELECT total_used FROM daily_interactions WHERE user_id = 7")
                .fetch_one(&pools[0])
                .await
                .unwrap();
        assert!(total_used <= 5);

        // Whatever the race outcome, further spends stop exactly at the cap
        loop {
            let result = try_spend(&pools[0], 7, SpendType::Moment).await.unwrap();
            if !result.allowed {
                assert_eq!(result.deny_reason, Some(SpendDenyReason::DailyTotalCapReached));
                assert_eq!(result.total_used, 5);
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_budgets_are_per_user() {
        let pool = db::test_pool().await;

        for _ in 0..5 {
            assert!(try_spend(&pool, 10, SpendType::Moment).await.unwrap().allowed);
        }
        assert!(!try_spend(&pool, 10, SpendType::Moment).await.unwrap().allowed);

        // A different user is unaffected
        let result = try_spend(&pool, 11, SpendType::Moment).await.unwrap();
        assert!(result.allowed);
        assert_eq!(result.total_used, 1);
    }
}
