//! Match lifecycle: creation and explicit closes
//!
//! Creation validates its input before touching storage, normalizes the pair,
//! then runs a check-then-insert inside one transaction. The partial unique
//! index on (user_a_id, user_b_id, ACTIVE) backs the same guarantee at the
//! storage level, so a racer that slips past the read is folded into the
//! "active match already exists" denial rather than surfacing as a fault.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{
    BalloonState, CloseOutcome, CloseReason, CreateMatchDenial, CreateMatchResult, Match, MatchType,
};
use crate::rules;

/// Create an ACTIVE match between two users.
///
/// Expected denials (bad input, duplicate active match) come back in the
/// result; storage conflicts propagate as errors and are safe to retry.
pub async fn create_active_match(
    pool: &SqlitePool,
    user1: i64,
    user2: i64,
    match_type: MatchType,
    edge_owner_id: Option<i64>,
) -> Result<CreateMatchResult> {
    if user1 == user2 {
        return Ok(CreateMatchResult::denied(CreateMatchDenial::SelfMatch));
    }
    match (match_type, edge_owner_id) {
        (MatchType::Pure, Some(_)) => {
            return Ok(CreateMatchResult::denied(CreateMatchDenial::PureWithEdgeOwner));
        }
        (MatchType::Edge, None) => {
            return Ok(CreateMatchResult::denied(CreateMatchDenial::EdgeWithoutOwner));
        }
        (MatchType::Edge, Some(owner)) if owner != user1 && owner != user2 => {
            return Ok(CreateMatchResult::denied(CreateMatchDenial::EdgeOwnerNotInPair));
        }
        _ => {}
    }

    let (user_a_id, user_b_id) = rules::normalize_pair(user1, user2);

    let mut tx = pool.begin().await.context("Failed to begin match transaction")?;

    let existing: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM matches WHERE user_a_id = ? AND user_b_id = ? AND balloon_state = ?",
    )
    .bind(user_a_id)
    .bind(user_b_id)
    .bind(BalloonState::Active.as_str())
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to check for existing active match")?;

    if existing.is_some() {
        tx.rollback().await.context("Failed to roll back match transaction")?;
        return Ok(CreateMatchResult::denied(CreateMatchDenial::ActiveMatchExists));
    }

    let now = rules::now_utc();
    let match_row = Match {
        id: Uuid::new_v4(),
        user_a_id,
        user_b_id,
        match_type,
        edge_owner_id,
        balloon_state: BalloonState::Active,
        close_reason: None,
        created_at: now,
        expires_at: rules::compute_expires_at(now),
        closed_at: None,
        both_messaged_at: None,
        find_love_at: None,
        trial_state: None,
        trial_expires_at: None,
    };

    let insert = sqlx::query(
        "INSERT INTO matches (id, user_a_id, user_b_id, match_type, edge_owner_id, balloon_state, created_at, expires_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(match_row.id.to_string())
    .bind(match_row.user_a_id)
    .bind(match_row.user_b_id)
    .bind(match_row.match_type.as_str())
    .bind(match_row.edge_owner_id)
    .bind(match_row.balloon_state.as_str())
    .bind(match_row.created_at)
    .bind(match_row.expires_at)
    .execute(&mut *tx)
    .await;

    match insert {
        Ok(_) => {}
        // A racer committed its insert between our read and write; same
        // outcome as having observed it in the read.
        Err(e) if is_unique_violation(&e) => {
            tx.rollback().await.context("Failed to roll back match transaction")?;
            return Ok(CreateMatchResult::denied(CreateMatchDenial::ActiveMatchExists));
        }
        Err(e) => return Err(e).context("Failed to insert match"),
    }

    tx.commit().await.context("Failed to commit match transaction")?;

    log::info!(
        "Created {} balloon {} for pair ({}, {})",
        match_row.match_type.as_str(), match_row.id, user_a_id, user_b_id
    );

    Ok(CreateMatchResult::created(match_row))
}

/// Close an ACTIVE match on behalf of an explicit user action.
///
/// `CloseReason::Expire` is reserved for the expiry scheduler and is refused
/// here. Closing an already-closed match is a no-op outcome, never a second
/// transition.
pub async fn close_match(pool: &SqlitePool, match_id: Uuid, reason: CloseReason) -> Result<CloseOutcome> {
    if reason == CloseReason::Expire {
        return Ok(CloseOutcome::SchedulerOnlyReason);
    }

    let mut tx = pool.begin().await.context("Failed to begin close transaction")?;

    let row = sqlx::query("SELECT * FROM matches WHERE id = ?")
        .bind(match_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to read match")?;

    let Some(row) = row else {
        tx.rollback().await.context("Failed to roll back close transaction")?;
        return Ok(CloseOutcome::NotFound);
    };
    let mut match_row = match_from_row(&row)?;

    if match_row.balloon_state == BalloonState::Closed {
        tx.rollback().await.context("Failed to roll back close transaction")?;
        return Ok(CloseOutcome::AlreadyClosed);
    }

    let now = rules::now_utc();
    sqlx::query(
        "UPDATE matches SET balloon_state = ?, close_reason = ?, closed_at = ?
         WHERE id = ? AND balloon_state = ?",
    )
    .bind(BalloonState::Closed.as_str())
    .bind(reason.as_str())
    .bind(now)
    .bind(match_id.to_string())
    .bind(BalloonState::Active.as_str())
    .execute(&mut *tx)
    .await
    .context("Failed to close match")?;

    tx.commit().await.context("Failed to commit close transaction")?;

    match_row.balloon_state = BalloonState::Closed;
    match_row.close_reason = Some(reason);
    match_row.closed_at = Some(now);

    log::info!("Closed balloon {} ({})", match_id, reason.as_str());

    Ok(CloseOutcome::Closed(match_row))
}

/// Record that both members have messaged, exempting the balloon from expiry.
///
/// Write surface for the chat collaborator; this crate never computes the
/// signal itself. Idempotent: returns true only when the timestamp was set by
/// this call.
pub async fn mark_both_messaged(
    pool: &SqlitePool,
    match_id: Uuid,
    at: chrono::DateTime<chrono::Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE matches SET both_messaged_at = ?
         WHERE id = ? AND both_messaged_at IS NULL AND balloon_state = ?",
    )
    .bind(at)
    .bind(match_id.to_string())
    .bind(BalloonState::Active.as_str())
    .execute(pool)
    .await
    .context("Failed to mark both messaged")?;

    Ok(result.rows_affected() > 0)
}

/// Fetch a match by id.
pub async fn find_match(pool: &SqlitePool, match_id: Uuid) -> Result<Option<Match>> {
    let row = sqlx::query("SELECT * FROM matches WHERE id = ?")
        .bind(match_id.to_string())
        .fetch_optional(pool)
        .await
        .context("Failed to read match")?;

    row.as_ref().map(match_from_row).transpose()
}

/// Fetch the ACTIVE match for a pair, if any. Accepts the ids in either order.
pub async fn active_match_for_pair(pool: &SqlitePool, u1: i64, u2: i64) -> Result<Option<Match>> {
    let (user_a_id, user_b_id) = rules::normalize_pair(u1, u2);

    let row = sqlx::query(
        "SELECT * FROM matches WHERE user_a_id = ? AND user_b_id = ? AND balloon_state = ?",
    )
    .bind(user_a_id)
    .bind(user_b_id)
    .bind(BalloonState::Active.as_str())
    .fetch_optional(pool)
    .await
    .context("Failed to read active match for pair")?;

    row.as_ref().map(match_from_row).transpose()
}

/// Map a matches row to its struct.
pub(crate) fn match_from_row(row: &SqliteRow) -> Result<Match> {
    let id: String = row.try_get("id")?;
    let match_type: String = row.try_get("match_type")?;
    let balloon_state: String = row.try_get("balloon_state")?;
    let close_reason: Option<String> = row.try_get("close_reason")?;

    Ok(Match {
        id: Uuid::parse_str(&id).context("Invalid match id")?,
        user_a_id: row.try_get("user_a_id")?,
        user_b_id: row.try_get("user_b_id")?,
        match_type: MatchType::parse(&match_type)?,
        edge_owner_id: row.try_get("edge_owner_id")?,
        balloon_state: BalloonState::parse(&balloon_state)?,
        close_reason: close_reason.as_deref().map(CloseReason::parse).transpose()?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        closed_at: row.try_get("closed_at")?,
        both_messaged_at: row.try_get("both_messaged_at")?,
        find_love_at: row.try_get("find_love_at")?,
        trial_state: row.try_get("trial_state")?,
        trial_expires_at: row.try_get("trial_expires_at")?,
    })
}

/// SQLite unique/primary-key constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("2067") | Some("1555"))
        }
        _ => false,
    }
}
