//! Data freshness probes for the beacon chain and execution chain stores.

use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::probe::{Check, bounded};
use super::types::Verdict;
use crate::chain::ChainClock;
use crate::error::ProbeError;
use crate::sources::{PrimaryStore, SecondaryStore};

pub const BEACON_DATA_THRESHOLD: Duration = Duration::from_secs(15 * 60);
pub const EXECUTION_DATA_THRESHOLD: Duration = Duration::from_secs(13 * 60);
/// Blocks the indexed data table may trail the blocks table by
pub const MAX_INDEX_LAG: u64 = 32;

/// Age of `observed` if it is older than `threshold`. Observations from the
/// future count as fresh.
fn stale_by(observed: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> Option<Duration> {
    let age = (now - observed).to_std().ok()?;
    (age > threshold).then_some(age)
}

fn format_age(age: Duration) -> String {
    humantime::format_duration(Duration::from_secs(age.as_secs())).to_string()
}

fn threshold_minutes(threshold: Duration) -> u64 {
    threshold.as_secs() / 60
}

/// A chain position the clock cannot place in time is a bad observation.
fn in_range(
    what: &'static str,
    unit: &str,
    value: u64,
    time: Option<DateTime<Utc>>,
) -> Result<DateTime<Utc>, ProbeError> {
    time.ok_or_else(|| ProbeError::Observation {
        what,
        source: anyhow!("{unit} {value} is out of range"),
    })
}

/// Checks that attestations, blocks and epochs in the primary store keep up
/// with the chain head. The first stale quantity ends the iteration.
pub struct BeaconDataCheck {
    store: Arc<dyn PrimaryStore>,
    clock: ChainClock,
    store_timeout: Duration,
    threshold: Duration,
}

impl BeaconDataCheck {
    pub fn new(store: Arc<dyn PrimaryStore>, clock: ChainClock, store_timeout: Duration) -> Self {
        Self { store, clock, store_timeout, threshold: BEACON_DATA_THRESHOLD }
    }

    fn stale(&self, quantity: &str, observed: DateTime<Utc>, now: DateTime<Utc>) -> Option<Verdict> {
        stale_by(observed, now, self.threshold).map(|age| {
            Verdict::error(format!(
                "error: {quantity} is older than {} minutes: {}",
                threshold_minutes(self.threshold),
                format_age(age)
            ))
        })
    }

    pub async fn evaluate_at(&self, now: DateTime<Utc>) -> Result<Verdict, ProbeError> {
        let what = "max attestation slot from the validators table";
        let slot = bounded(what, self.store_timeout, self.store.max_attestation_slot()).await?;
        let observed = in_range(what, "slot", slot, self.clock.slot_to_time(slot))?;
        if let Some(verdict) = self.stale("max attestation slot", observed, now) {
            return Ok(verdict);
        }

        let what = "max slot from the blocks table";
        let slot = bounded(what, self.store_timeout, self.store.max_block_slot()).await?;
        let observed = in_range(what, "slot", slot, self.clock.slot_to_time(slot))?;
        if let Some(verdict) = self.stale("max slot in blocks table", observed, now) {
            return Ok(verdict);
        }

        let what = "max epoch from the epochs table";
        let epoch = bounded(what, self.store_timeout, self.store.max_epoch()).await?;
        let observed = in_range(what, "epoch", epoch, self.clock.epoch_to_time(epoch))?;
        if let Some(verdict) = self.stale("max epoch in epochs table", observed, now) {
            return Ok(verdict);
        }

        Ok(Verdict::Ok)
    }
}

#[async_trait]
impl Check for BeaconDataCheck {
    async fn check(&self) -> Verdict {
        self.evaluate_at(Utc::now()).await.unwrap_or_else(Verdict::from)
    }
}

/// Checks that the execution chain indexer is both current and not lagging
/// behind the canonical blocks table.
pub struct ExecutionDataCheck {
    store: Arc<dyn SecondaryStore>,
    store_timeout: Duration,
    threshold: Duration,
}

impl ExecutionDataCheck {
    pub fn new(store: Arc<dyn SecondaryStore>, store_timeout: Duration) -> Self {
        Self { store, store_timeout, threshold: EXECUTION_DATA_THRESHOLD }
    }

    pub async fn evaluate_at(&self, now: DateTime<Utc>) -> Result<Verdict, ProbeError> {
        let canonical = bounded(
            "latest block from the blocks table",
            self.store_timeout,
            self.store.latest_canonical_block(),
        )
        .await?;
        if let Some(age) = stale_by(canonical.time, now, self.threshold) {
            return Ok(Verdict::error(format!(
                "error: last block in blocks table is more than {} minutes old (check eth1 indexer): {}",
                threshold_minutes(self.threshold),
                format_age(age)
            )));
        }

        let indexed = bounded(
            "latest block number from the data table",
            self.store_timeout,
            self.store.latest_indexed_block_number(),
        )
        .await?;
        if indexed < canonical.number.saturating_sub(MAX_INDEX_LAG) {
            return Ok(Verdict::error(format!(
                "error: data table is lagging behind the blocks table by {} blocks (check eth1 indexer)",
                canonical.number - indexed
            )));
        }

        Ok(Verdict::Ok)
    }
}

#[async_trait]
impl Check for ExecutionDataCheck {
    async fn check(&self) -> Verdict {
        self.evaluate_at(Utc::now()).await.unwrap_or_else(Verdict::from)
    }
}
