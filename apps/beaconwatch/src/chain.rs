use chrono::{DateTime, TimeDelta, Utc};

use crate::config::ChainConfig;

/// Converts beacon chain slots and epochs to wall-clock time.
#[derive(Debug, Clone)]
pub struct ChainClock {
    genesis: DateTime<Utc>,
    seconds_per_slot: i64,
    slots_per_epoch: u64,
}

impl ChainClock {
    pub fn new(config: &ChainConfig) -> Self {
        Self {
            genesis: config.genesis_time,
            seconds_per_slot: config.seconds_per_slot as i64,
            slots_per_epoch: config.slots_per_epoch,
        }
    }

    /// Start of the slot, or `None` when it lies beyond the representable range.
    pub fn slot_to_time(&self, slot: u64) -> Option<DateTime<Utc>> {
        let seconds = i64::try_from(slot).ok()?.checked_mul(self.seconds_per_slot)?;
        self.genesis.checked_add_signed(TimeDelta::try_seconds(seconds)?)
    }

    /// Start of the epoch
    pub fn epoch_to_time(&self, epoch: u64) -> Option<DateTime<Utc>> {
        self.slot_to_time(epoch.checked_mul(self.slots_per_epoch)?)
    }

    /// Slot whose start is at or before `time`, used by tests to fabricate observations
    #[cfg(test)]
    pub fn time_to_slot(&self, time: DateTime<Utc>) -> u64 {
        ((time - self.genesis).num_seconds().max(0) / self.seconds_per_slot) as u64
    }
}
