//! Core of the balloon match system: the time-boxed, mutually-exclusive match
//! relationship between pairs of users and the per-user daily budget that
//! throttles it.
//!
//! Three operations matter here and all of them lean on the store's
//! serializable isolation instead of in-process locks:
//!
//! - [`services::budget::try_spend`] — atomic, capped consumption of the
//!   daily interaction budget
//! - [`services::lifecycle::create_active_match`] — atomic creation of a
//!   match with duplicate prevention per normalized pair
//! - [`services::scheduler::run`] — the background loop that closes balloons
//!   whose window elapsed without bidirectional communication
//!
//! Everything else (chat transport, candidate ranking, identity) lives in
//! collaborating services that call into this crate in-process.

pub mod config;
pub mod db;
pub mod models;
pub mod rules;
pub mod services;

pub use config::Config;
pub use models::{
    BalloonState, CloseOutcome, CloseReason, CreateMatchDenial, CreateMatchResult,
    DailyInteractionRecord, GameSpendResult, Match, MatchType, SpendDenyReason, SpendResult,
    SpendType,
};
