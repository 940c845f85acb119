use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tracing::{debug, error, warn};

use super::types::Verdict;
use crate::database::{StatusRecord, StatusStore};

/// Writes verdicts through to the status store.
///
/// Best effort: a failed or timed out write is logged and dropped, never retried.
#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<dyn StatusStore>,
    store_timeout: Duration,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn StatusStore>, store_timeout: Duration) -> Self {
        Self { store, store_timeout }
    }

    pub async fn report(&self, name: &str, verdict: &Verdict, extra: Option<serde_json::Value>) {
        if verdict.is_ok() {
            debug!(probe = name, "Check passed");
        } else {
            warn!(probe = name, "{verdict}");
        }

        let record = StatusRecord::new(name, verdict.status(), Utc::now()).with_metadata(extra);
        match tokio::time::timeout(self.store_timeout, self.store.insert(&record)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!(probe = name, "Failed to report status: {e:#}"),
            Err(_) => error!(
                probe = name,
                "Failed to report status: write timed out after {}",
                humantime::format_duration(self.store_timeout)
            ),
        }
    }
}
