//! Round-robin leader schedule
//!
//! Time since the first block is cut into equal slots. Slot `n` belongs to
//! the producer at position `n mod producers`, so every node computes the
//! same owner for a given instant without talking to the others (clocks are
//! assumed to be loosely synchronised).
//!
//! ```text
//!  first block
//!      │ slot 0 │ slot 1 │ slot 2 │ slot 3 │ slot 4 │ ...
//!      │ pos 0  │ pos 1  │ pos 2  │ pos 0  │ pos 1  │
//! ```

use crate::config::ScheduleConfig;
use crate::error::{GeneratorError, Result};
use crate::ports::BlockLedger;
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Deterministic slot assignment over the ordered producer set
#[derive(Clone, Debug)]
pub struct LeaderSchedule {
    first_block_time: DateTime<Utc>,
    slot_ms: i64,
    producers: i64,
}

impl LeaderSchedule {
    /// Create a schedule. Zero producers or a zero slot is a configuration error.
    pub fn new(
        first_block_time: DateTime<Utc>,
        slot_duration: Duration,
        producers: usize,
    ) -> Result<Self> {
        if producers == 0 {
            return Err(GeneratorError::Schedule("producer list is empty".to_string()));
        }
        let slot_ms = i64::try_from(slot_duration.as_millis()).unwrap_or(i64::MAX);
        if slot_ms <= 0 {
            return Err(GeneratorError::Schedule("slot duration is zero".to_string()));
        }
        Ok(Self {
            first_block_time,
            slot_ms,
            producers: producers as i64,
        })
    }

    /// Build from configuration and the current producer count
    pub fn from_config(config: &ScheduleConfig, producers: usize) -> Result<Self> {
        let first = DateTime::from_timestamp(config.first_block_time, 0).ok_or_else(|| {
            GeneratorError::Schedule(format!(
                "first block time {} out of range",
                config.first_block_time
            ))
        })?;
        Self::new(first, config.slot_duration()?, producers)
    }

    fn slot_index(&self, at: DateTime<Utc>) -> Result<i64> {
        let elapsed = (at - self.first_block_time).num_milliseconds();
        if elapsed < 0 {
            return Err(GeneratorError::Schedule(format!(
                "{} is before the first block at {}",
                at, self.first_block_time
            )));
        }
        Ok(elapsed / self.slot_ms)
    }

    /// Position of the producer owning the slot that contains `at`
    pub fn slot_owner(&self, at: DateTime<Utc>) -> Result<i64> {
        Ok(self.slot_index(at)? % self.producers)
    }

    /// Whether `at` falls inside a slot assigned to `position`
    pub fn time_to_generate(&self, at: DateTime<Utc>, position: i64) -> Result<bool> {
        if position < 0 || position >= self.producers {
            return Err(GeneratorError::Schedule(format!(
                "node position {} outside producer range 0..{}",
                position, self.producers
            )));
        }
        Ok(self.slot_owner(at)? == position)
    }

    /// Start and end of the slot containing `at`
    pub fn range_by_time(&self, at: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let index = self.slot_index(at)?;
        Ok((self.slot_start(index)?, self.slot_start(index.saturating_add(1))?))
    }

    fn slot_start(&self, index: i64) -> Result<DateTime<Utc>> {
        index
            .checked_mul(self.slot_ms)
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|offset| self.first_block_time.checked_add_signed(offset))
            .ok_or_else(|| {
                GeneratorError::Schedule(format!(
                    "slot {} is outside the supported time range",
                    index
                ))
            })
    }

    /// Whether the ledger already holds a block by `position` in the current slot.
    ///
    /// Header times are whole seconds, so the lookup starts at the second the
    /// slot begins in. A block from the same second just before the slot
    /// counts as filling it.
    pub async fn block_for_time_exists<L>(
        &self,
        ledger: &L,
        at: DateTime<Utc>,
        position: i64,
    ) -> Result<bool>
    where
        L: BlockLedger + ?Sized,
    {
        let (start, end) = self.range_by_time(at)?;
        let start = DateTime::from_timestamp(start.timestamp(), 0).unwrap_or(start);
        Ok(ledger.has_node_block_in_range(start, end, position).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn schedule() -> LeaderSchedule {
        // 3 producers, 4 second slots starting at t=1000
        LeaderSchedule::new(ts(1_000), Duration::from_secs(4), 3).unwrap()
    }

    #[test]
    fn test_round_robin_assignment() {
        let s = schedule();
        assert!(s.time_to_generate(ts(1_000), 0).unwrap());
        assert!(s.time_to_generate(ts(1_003), 0).unwrap());
        assert!(s.time_to_generate(ts(1_004), 1).unwrap());
        assert!(s.time_to_generate(ts(1_009), 2).unwrap());
        // wraps around
        assert!(s.time_to_generate(ts(1_012), 0).unwrap());
        assert!(!s.time_to_generate(ts(1_012), 1).unwrap());
    }

    #[test]
    fn test_exactly_one_owner_per_instant() {
        let s = schedule();
        for t in 1_000..1_100 {
            let owners = (0..3)
                .filter(|p| s.time_to_generate(ts(t), *p).unwrap())
                .count();
            assert_eq!(owners, 1, "t={}", t);
        }
    }

    #[test]
    fn test_range_by_time() {
        let s = schedule();
        let (start, end) = s.range_by_time(ts(1_006)).unwrap();
        assert_eq!(start, ts(1_004));
        assert_eq!(end, ts(1_008));
    }

    #[test]
    fn test_sub_second_slots() {
        let s = LeaderSchedule::new(ts(0), Duration::from_millis(1_500), 2).unwrap();
        let (start, end) = s.range_by_time(ts(2)).unwrap();
        assert_eq!(start, ts(0) + TimeDelta::milliseconds(1_500));
        assert_eq!(end, ts(3));
        assert_eq!(s.slot_owner(ts(2)).unwrap(), 1);
    }

    #[test]
    fn test_huge_slot_is_an_error() {
        let s = LeaderSchedule::new(ts(0), Duration::from_secs(u64::MAX), 2).unwrap();
        assert!(matches!(
            s.range_by_time(ts(5)),
            Err(GeneratorError::Schedule(_))
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        let s = schedule();
        assert!(s.time_to_generate(ts(1_000), 3).is_err());
        assert!(s.time_to_generate(ts(1_000), -1).is_err());
        assert!(s.range_by_time(ts(999)).is_err());
        assert!(LeaderSchedule::new(ts(0), Duration::from_secs(4), 0).is_err());
        assert!(LeaderSchedule::new(ts(0), Duration::ZERO, 3).is_err());
    }
}
