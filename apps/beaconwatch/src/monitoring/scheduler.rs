use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::probe::ScheduledProbe;
use super::reporter::StatusReporter;

/// Starts every probe as its own task. Once started, probes are on their own.
pub struct MonitoringScheduler {
    reporter: StatusReporter,
    token: CancellationToken,
}

impl MonitoringScheduler {
    /// Probes stop only when `token` is cancelled; pass a token that is never
    /// cancelled to run them for the lifetime of the process.
    pub fn new(reporter: StatusReporter, token: CancellationToken) -> Self {
        Self { reporter, token }
    }

    /// Spawn a single probe loop
    pub fn schedule_probe(&self, probe: ScheduledProbe) -> JoinHandle<()> {
        tokio::spawn(probe.run(self.reporter.clone(), self.token.child_token()))
    }

    /// Spawn every probe and return without waiting on any of them.
    ///
    /// Callers may drop the handles; they are only useful for awaiting a
    /// cancelled shutdown.
    pub fn start(&self, probes: Vec<ScheduledProbe>) -> Vec<JoinHandle<()>> {
        tracing::info!("Starting {} probes", probes.len());
        probes.into_iter().map(|probe| self.schedule_probe(probe)).collect()
    }
}
