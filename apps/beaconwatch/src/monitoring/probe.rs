use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::reporter::StatusReporter;
use super::types::Verdict;
use crate::error::ProbeError;

/// One observation of a signal, reduced to a verdict.
///
/// Implementations must not retry; the next scheduled iteration is the retry.
#[async_trait]
pub trait Check: Send + Sync {
    async fn check(&self) -> Verdict;
}

/// A named check run forever at a fixed interval
#[derive(Clone)]
pub struct ScheduledProbe {
    pub name: String,
    pub interval: Duration,
    pub check: Arc<dyn Check>,
}

impl ScheduledProbe {
    pub fn new(name: impl Into<String>, interval: Duration, check: Arc<dyn Check>) -> Self {
        Self { name: name.into(), interval, check }
    }

    /// Check, report, sleep, repeat.
    ///
    /// The first check runs immediately and the interval is measured from the
    /// end of one iteration to the start of the next. Only cancellation ends
    /// the loop; an in-flight check or report is abandoned.
    pub async fn run(self, reporter: StatusReporter, token: CancellationToken) {
        info!(probe = %self.name, interval = %humantime::format_duration(self.interval), "Probe started");

        let mut first_run = true;
        loop {
            if !first_run {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
            first_run = false;

            let verdict = tokio::select! {
                _ = token.cancelled() => break,
                verdict = self.check.check() => verdict,
            };

            tokio::select! {
                _ = token.cancelled() => break,
                _ = reporter.report(&self.name, &verdict, None) => {}
            }
        }

        debug!(probe = %self.name, "Probe stopped");
    }
}

/// Run a store call under `limit`, folding both failure modes into [`ProbeError`].
pub async fn bounded<T, F>(what: &'static str, limit: Duration, call: F) -> Result<T, ProbeError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(ProbeError::Observation { what, source }),
        Err(_) => Err(ProbeError::Timeout { what, after: limit }),
    }
}
