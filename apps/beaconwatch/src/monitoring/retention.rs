//! Reclaiming old rows from the status store.
//!
//! Sweeps piggyback on the services probe; there is no separate schedule.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use super::ago;
use super::probe::bounded;
use crate::database::StatusStore;

/// Retention policy for status records
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Records older than this are deleted
    pub horizon: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { horizon: Duration::from_secs(7 * 24 * 3600) }
    }
}

impl RetentionPolicy {
    /// Oldest `reported_at` that survives a sweep at `now`
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        ago(now, self.horizon)
    }
}

/// Deletes expired status records
pub struct RetentionSweeper {
    store: Arc<dyn StatusStore>,
    policy: RetentionPolicy,
    store_timeout: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn StatusStore>, policy: RetentionPolicy, store_timeout: Duration) -> Self {
        Self { store, policy, store_timeout }
    }

    /// Delete everything past the horizon. Failures are logged and otherwise ignored.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Option<u64> {
        let cutoff = self.policy.cutoff(now);
        match bounded("expired status records", self.store_timeout, self.store.delete_older_than(cutoff))
            .await
        {
            Ok(deleted) => {
                debug!("Retention sweep deleted {} status records older than {}", deleted, cutoff);
                Some(deleted)
            }
            Err(e) => {
                error!("Error cleaning up service_status table: {e}");
                None
            }
        }
    }
}
