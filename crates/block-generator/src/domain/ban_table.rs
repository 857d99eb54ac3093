//! # Local Ban Table
//!
//! Node-local record of producers caught publishing a bad block.
//!
//! A local ban is a short cool-down: the producer's blocks and hosts are
//! ignored by this node until the entry expires. Expired entries are
//! removed lazily on lookup, so the table never needs a sweeper task.
//! Network-wide (global) bans are recorded on chain and live in the
//! producer registry, not here.

use chrono::{DateTime, Utc};
use shared_types::{BlockId, KeyId};
use std::collections::HashMap;

/// One active local ban
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalBan {
    /// Ban ends at this instant
    pub until: DateTime<Utc>,
    /// Block that triggered the ban
    pub block_id: BlockId,
    /// Why the block was rejected
    pub reason: String,
}

/// Producer key -> active local ban
#[derive(Debug, Default)]
pub struct LocalBanTable {
    bans: HashMap<KeyId, LocalBan>,
}

impl LocalBanTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ban `producer` until `until`.
    ///
    /// Returns `false` if an unexpired ban is already in place; the existing
    /// entry is kept unchanged.
    pub fn ban(
        &mut self,
        producer: KeyId,
        until: DateTime<Utc>,
        block_id: BlockId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.is_banned(producer, now) {
            return false;
        }
        self.bans.insert(
            producer,
            LocalBan {
                until,
                block_id,
                reason: reason.into(),
            },
        );
        true
    }

    /// Whether `producer` is locally banned at `now`. Drops the entry once expired.
    pub fn is_banned(&mut self, producer: KeyId, now: DateTime<Utc>) -> bool {
        match self.bans.get(&producer) {
            Some(ban) if now < ban.until => true,
            Some(_) => {
                self.bans.remove(&producer);
                false
            }
            None => false,
        }
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.bans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bans.is_empty()
    }

    /// Drop every entry that has expired at `now`
    pub fn prune_expired(&mut self, now: DateTime<Utc>) {
        self.bans.retain(|_, ban| now < ban.until);
    }
}
