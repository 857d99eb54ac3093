//! Domain layer - Pure logic for slot scheduling and block assembly
//!
//! Nothing in here touches a collaborator directly except
//! [`LeaderSchedule::block_for_time_exists`], which takes the ledger port
//! as an argument.
//!
//! ## Contents
//!
//! - [`LeaderSchedule`]: round-robin slot ownership
//! - [`ResourceLimiter`]: per-block quotas with `Ok` / `Skip` / `Stop` verdicts
//! - [`LocalBanTable`]: cool-down bans for producers of bad blocks
//! - [`invariants`]: structural checks on a candidate block

pub mod ban_table;
mod entities;
pub mod invariants;
pub mod limits;
pub mod schedule;

pub use ban_table::{LocalBan, LocalBanTable};
pub use entities::*;
pub use invariants::validate_candidate;
pub use limits::{LimitError, LimitVerdict, Limiter, ResourceLimiter};
pub use schedule::LeaderSchedule;
