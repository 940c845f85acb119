//! Aggregated liveness of the background services.
//!
//! Every service appends its own state to `service_status`. This probe reads
//! the recent window back, keeps the newest state per service and requires
//! each expected service to be `Running`.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::ago;
use super::probe::{Check, bounded};
use super::retention::RetentionSweeper;
use super::types::Verdict;
use crate::database::{StatusRecord, StatusStore};

/// State a healthy service reports for itself
pub const RUNNING: &str = "Running";

/// Services that must be reporting, in the order they are checked.
///
/// Duplicates are dropped on construction; the first occurrence keeps its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedServices(Vec<String>);

impl ExpectedServices {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for name in names.into_iter().map(Into::into) {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self(unique)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// First service, in registry order, whose state is not `Running`,
    /// paired with its state (empty when it never reported).
    pub fn first_unhealthy<'a>(&'a self, states: &'a HashMap<String, String>) -> Option<(&'a str, &'a str)> {
        self.0.iter().find_map(|name| match states.get(name).map(String::as_str) {
            Some(RUNNING) => None,
            state => Some((name.as_str(), state.unwrap_or_default())),
        })
    }
}

/// Newest state per name. `records` must be ordered newest first; later
/// entries for a name already seen are ignored.
pub fn latest_states(records: impl IntoIterator<Item = StatusRecord>) -> HashMap<String, String> {
    let mut states = HashMap::new();
    for record in records {
        states.entry(record.name).or_insert(record.status);
    }
    states
}

/// Probe deriving one verdict from the self-reported state of every service.
/// Each iteration also sweeps expired records.
pub struct ServicesCheck {
    store: Arc<dyn StatusStore>,
    expected: ExpectedServices,
    window: Duration,
    store_timeout: Duration,
    sweeper: RetentionSweeper,
}

impl ServicesCheck {
    pub fn new(
        store: Arc<dyn StatusStore>,
        expected: ExpectedServices,
        window: Duration,
        store_timeout: Duration,
        sweeper: RetentionSweeper,
    ) -> Self {
        tracing::debug!("Expecting services: {}", expected.names().join(", "));
        Self { store, expected, window, store_timeout, sweeper }
    }

    /// Verdict from the records inside the window ending at `now`.
    /// Depends only on store contents, so repeated calls agree.
    pub async fn evaluate_at(&self, now: DateTime<Utc>) -> Verdict {
        let records = match bounded(
            "service status from the service_status table",
            self.store_timeout,
            self.store.reported_since(ago(now, self.window)),
        )
        .await
        {
            Ok(records) => records,
            Err(e) => return e.into(),
        };

        let states = latest_states(records);
        match self.expected.first_unhealthy(&states) {
            Some((name, state)) => {
                Verdict::error(format!("error: service {name} has unexpected state {state}"))
            }
            None => Verdict::Ok,
        }
    }
}

#[async_trait]
impl Check for ServicesCheck {
    async fn check(&self) -> Verdict {
        let now = Utc::now();
        let verdict = self.evaluate_at(now).await;
        self.sweeper.sweep(now).await;
        verdict
    }
}
