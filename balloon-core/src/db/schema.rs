//! Table and index creation
//!
//! The CHECK constraints mirror the data-model invariants so that no writer,
//! inside this crate or outside it, can persist an inconsistent row. The
//! partial unique index is what makes "at most one ACTIVE match per
//! normalized pair" hold under concurrent inserts.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

/// Create all tables and indexes if they do not exist. Idempotent.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_interactions (
            user_id INTEGER NOT NULL,
            date_utc TEXT NOT NULL,
            total_used INTEGER NOT NULL DEFAULT 0 CHECK (total_used BETWEEN 0 AND 5),
            pending_used INTEGER NOT NULL DEFAULT 0 CHECK (pending_used BETWEEN 0 AND 2),
            games_initiated INTEGER NOT NULL DEFAULT 0 CHECK (games_initiated BETWEEN 0 AND 2),
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, date_utc),
            CHECK (pending_used <= total_used)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create daily_interactions table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            id TEXT PRIMARY KEY,
            user_a_id INTEGER NOT NULL,
            user_b_id INTEGER NOT NULL,
            match_type TEXT NOT NULL CHECK (match_type IN ('pure', 'edge')),
            edge_owner_id INTEGER,
            balloon_state TEXT NOT NULL CHECK (balloon_state IN ('active', 'closed')),
            close_reason TEXT CHECK (close_reason IN ('pop', 'expire', 'unmatch', 'block')),
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            closed_at TEXT,
            both_messaged_at TEXT,
            find_love_at TEXT,
            trial_state TEXT,
            trial_expires_at TEXT,
            CHECK (user_a_id < user_b_id),
            CHECK (expires_at > created_at),
            CHECK (
                (balloon_state = 'active' AND close_reason IS NULL AND closed_at IS NULL)
                OR (balloon_state = 'closed' AND close_reason IS NOT NULL AND closed_at IS NOT NULL)
            ),
            CHECK (
                (match_type = 'pure' AND edge_owner_id IS NULL)
                OR (match_type = 'edge' AND edge_owner_id IS NOT NULL
                    AND edge_owner_id IN (user_a_id, user_b_id))
            )
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create matches table")?;

    // At most one ACTIVE balloon per normalized pair.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_matches_active_pair
         ON matches (user_a_id, user_b_id) WHERE balloon_state = 'active'",
    )
    .execute(pool)
    .await
    .context("Failed to create active-pair index")?;

    // Covers the expiry sweep's scan.
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_matches_expiry
         ON matches (expires_at) WHERE balloon_state = 'active' AND both_messaged_at IS NULL",
    )
    .execute(pool)
    .await
    .context("Failed to create expiry index")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let pool = crate::db::test_pool().await;
        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_constraints_reject_inconsistent_rows() {
        let pool = crate::db::test_pool().await;

        // Unnormalized pair
        let res = sqlx::query(
            "INSERT INTO matches (id, user_a_id, user_b_id, match_type, balloon_state, created_at, expires_at)
             VALUES ('m1', 9, 3, 'pure', 'active', '2025-01-01 00:00:00', '2025-01-02 12:00:00')",
        )
        .execute(&pool)
        .await;
        assert!(res.is_err());

        // Closed without a reason
        let res = sqlx::query(
            "INSERT INTO matches (id, user_a_id, user_b_id, match_type, balloon_state, created_at, expires_at, closed_at)
             VALUES ('m2', 3, 9, 'pure', 'closed', '2025-01-01 00:00:00', '2025-01-02 12:00:00', '2025-01-01 01:00:00')",
        )
        .execute(&pool)
        .await;
        assert!(res.is_err());

        // Edge owner outside the pair
        let res = sqlx::query(
            "INSERT INTO matches (id, user_a_id, user_b_id, match_type, edge_owner_id, balloon_state, created_at, expires_at)
             VALUES ('m3', 3, 9, 'edge', 42, 'active', '2025-01-01 00:00:00', '2025-01-02 12:00:00')",
        )
        .execute(&pool)
        .await;
        assert!(res.is_err());

        // Counter above its cap
        let res = sqlx::query(
            "INSERT INTO daily_interactions (user_id, date_utc, total_used, pending_used, games_initiated, updated_at)
             VALUES (1, '2025-01-01', 6, 0, 0, '2025-01-01 00:00:00')",
        )
        .execute(&pool)
        .await;
        assert!(res.is_err());
    }
}
