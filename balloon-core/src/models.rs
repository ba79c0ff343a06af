//! Row structs, persisted enums and typed operation results
//!
//! State, reason and type fields are persisted as stable lowercase strings so
//! that already-stored rows stay readable across releases. Expected outcomes
//! of the atomic operations (cap reached, duplicate match) are modelled as
//! typed deny reasons, never as errors.

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a match was formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    /// No owner; neither side initiated via an edge.
    Pure,
    /// One member of the pair owns the connection.
    Edge,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Pure => "pure",
            MatchType::Edge => "edge",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pure" => Ok(MatchType::Pure),
            "edge" => Ok(MatchType::Edge),
            other => bail!("Unknown match type: '{}'", other),
        }
    }
}

/// Lifecycle state of a balloon. ACTIVE → CLOSED exactly once; CLOSED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalloonState {
    Active,
    Closed,
}

impl BalloonState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalloonState::Active => "active",
            BalloonState::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(BalloonState::Active),
            "closed" => Ok(BalloonState::Closed),
            other => bail!("Unknown balloon state: '{}'", other),
        }
    }
}

/// Why a balloon was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    Pop,
    /// Reserved for the expiry scheduler.
    Expire,
    Unmatch,
    Block,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Pop => "pop",
            CloseReason::Expire => "expire",
            CloseReason::Unmatch => "unmatch",
            CloseReason::Block => "block",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pop" => Ok(CloseReason::Pop),
            "expire" => Ok(CloseReason::Expire),
            "unmatch" => Ok(CloseReason::Unmatch),
            "block" => Ok(CloseReason::Block),
            other => bail!("Unknown close reason: '{}'", other),
        }
    }
}

/// Which daily counter a spend consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpendType {
    /// Counts against the total cap only.
    Moment,
    /// Counts against both the total cap and the pending cap.
    Pending,
}

/// One balloon relationship between two distinct users.
///
/// `user_a_id < user_b_id` always holds (normalized pair). The trial fields
/// belong to a different subsystem and are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub user_a_id: i64,
    pub user_b_id: i64,
    pub match_type: MatchType,
    pub edge_owner_id: Option<i64>,
    pub balloon_state: BalloonState,
    pub close_reason: Option<CloseReason>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Set by the chat collaborator once both members have sent a message.
    /// Never written by this crate's scheduler; read as an expiry exemption.
    pub both_messaged_at: Option<DateTime<Utc>>,
    pub find_love_at: Option<DateTime<Utc>>,
    pub trial_state: Option<String>,
    pub trial_expires_at: Option<DateTime<Utc>>,
}

/// One user's quota consumption for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyInteractionRecord {
    pub user_id: i64,
    pub date_utc: NaiveDate,
    pub total_used: i64,
    pub pending_used: i64,
    pub games_initiated: i64,
    pub updated_at: DateTime<Utc>,
}

/// Why a budget spend was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpendDenyReason {
    DailyTotalCapReached,
    DailyPendingCapReached,
    DailyGamesCapReached,
}

impl SpendDenyReason {
    pub fn message(&self) -> &'static str {
        match self {
            SpendDenyReason::DailyTotalCapReached => "daily total cap reached",
            SpendDenyReason::DailyPendingCapReached => "daily pending cap reached",
            SpendDenyReason::DailyGamesCapReached => "daily games cap reached",
        }
    }
}

/// Outcome of a budget spend attempt. Counters are post-increment on success,
/// unchanged on denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendResult {
    pub allowed: bool,
    pub deny_reason: Option<SpendDenyReason>,
    pub total_used: i64,
    pub pending_used: i64,
}

impl SpendResult {
    pub fn allowed(total_used: i64, pending_used: i64) -> Self {
        Self { allowed: true, deny_reason: None, total_used, pending_used }
    }

    pub fn denied(reason: SpendDenyReason, total_used: i64, pending_used: i64) -> Self {
        Self { allowed: false, deny_reason: Some(reason), total_used, pending_used }
    }
}

/// Outcome of a game-initiation spend attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSpendResult {
    pub allowed: bool,
    pub deny_reason: Option<SpendDenyReason>,
    pub games_initiated: i64,
}

/// Why a match creation was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateMatchDenial {
    SelfMatch,
    PureWithEdgeOwner,
    EdgeWithoutOwner,
    EdgeOwnerNotInPair,
    ActiveMatchExists,
}

impl CreateMatchDenial {
    pub fn message(&self) -> &'static str {
        match self {
            CreateMatchDenial::SelfMatch => "cannot match self",
            CreateMatchDenial::PureWithEdgeOwner => "pure cannot have edge owner",
            CreateMatchDenial::EdgeWithoutOwner => "edge requires edge owner",
            CreateMatchDenial::EdgeOwnerNotInPair => "edge owner not in pair",
            CreateMatchDenial::ActiveMatchExists => "active match already exists",
        }
    }
}

/// Outcome of a match creation attempt.
#[derive(Debug, Clone)]
pub struct CreateMatchResult {
    pub created: bool,
    pub match_row: Option<Match>,
    pub reason: Option<CreateMatchDenial>,
}

impl CreateMatchResult {
    pub fn created(match_row: Match) -> Self {
        Self { created: true, match_row: Some(match_row), reason: None }
    }

    pub fn denied(reason: CreateMatchDenial) -> Self {
        Self { created: false, match_row: None, reason: Some(reason) }
    }
}

/// Outcome of an explicit close request (pop / unmatch / block).
#[derive(Debug, Clone)]
pub enum CloseOutcome {
    /// The ACTIVE → CLOSED transition happened now.
    Closed(Match),
    /// The match was already closed; CLOSED is terminal, nothing changed.
    AlreadyClosed,
    /// No match with that id.
    NotFound,
    /// `CloseReason::Expire` is only written by the expiry scheduler.
    SchedulerOnlyReason,
}
