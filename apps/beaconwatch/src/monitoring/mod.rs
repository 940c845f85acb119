/// Monitoring engine module - periodic probes and their verdicts
///
/// This module is responsible for:
/// - Running every probe on its own fixed schedule
/// - Reducing each observation to an OK / error verdict
/// - Writing verdicts to the status store
/// - Aggregating the self-reported state of the background services
pub mod checker;
pub mod freshness;
pub mod probe;
pub mod reporter;
pub mod retention;
pub mod scheduler;
pub mod services;
pub mod types;

#[cfg(test)]
mod tests;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use url::Url;

pub use probe::{Check, ScheduledProbe};
pub use reporter::StatusReporter;
pub use scheduler::MonitoringScheduler;
pub use types::Verdict;

use crate::chain::ChainClock;
use crate::config::Config;
use crate::database::StatusStore;
use crate::sources::{CacheClient, PrimaryStore, SecondaryStore};
use checker::{CacheCheck, EndpointCheck};
use freshness::{BeaconDataCheck, ExecutionDataCheck};
use retention::{RetentionPolicy, RetentionSweeper};
use services::{ExpectedServices, ServicesCheck};

pub const BEACON_DATA_PROBE: &str = "monitoring_cl_data";
pub const EXECUTION_DATA_PROBE: &str = "monitoring_el_data";
pub const CACHE_PROBE: &str = "monitoring_redis";
pub const API_PROBE: &str = "monitoring_api";
pub const APP_PROBE: &str = "monitoring_app";
pub const SERVICES_PROBE: &str = "monitoring_services";

/// `now - span`, clamped to the earliest representable instant
pub(crate) fn ago(now: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(span)
        .ok()
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// External systems the probes observe
pub struct Collaborators {
    pub primary: Arc<dyn PrimaryStore>,
    pub secondary: Arc<dyn SecondaryStore>,
    pub cache: Arc<dyn CacheClient>,
    pub status_store: Arc<dyn StatusStore>,
}

/// Build every probe from configuration.
///
/// Fails only on invalid configuration, which is fatal at startup.
pub fn build_probes(config: &Config, collaborators: Collaborators) -> Result<Vec<ScheduledProbe>> {
    let interval = config.monitoring.interval;
    let store_timeout = config.database.store_timeout;
    let site = Url::parse(&config.frontend.site_url)?;

    let sweeper = RetentionSweeper::new(
        collaborators.status_store.clone(),
        RetentionPolicy { horizon: config.monitoring.retention },
        store_timeout,
    );
    let services = ServicesCheck::new(
        collaborators.status_store,
        ExpectedServices::new(config.monitoring.expected_services.iter().cloned()),
        config.monitoring.services_window,
        store_timeout,
        sweeper,
    );

    let probe = |name: &str, check: Arc<dyn Check>| ScheduledProbe::new(name, interval, check);

    Ok(vec![
        probe(
            BEACON_DATA_PROBE,
            Arc::new(BeaconDataCheck::new(
                collaborators.primary,
                ChainClock::new(&config.chain),
                store_timeout,
            )),
        ),
        probe(EXECUTION_DATA_PROBE, Arc::new(ExecutionDataCheck::new(collaborators.secondary, store_timeout))),
        probe(CACHE_PROBE, Arc::new(CacheCheck::new(collaborators.cache, config.cache.timeout))),
        probe(API_PROBE, Arc::new(EndpointCheck::latest_epoch(&site, config.frontend.timeout)?)),
        probe(
            APP_PROBE,
            Arc::new(EndpointCheck::dashboard(
                &site,
                &config.frontend.dashboard_validators,
                config.frontend.timeout,
            )?),
        ),
        probe(SERVICES_PROBE, Arc::new(services)),
    ])
}
