//! Liveness sweeps over every connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::connection::LifecycleEvent;
use super::hub::LiveHub;

/// Counts from one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections sent a probe.
    pub probed: usize,
    /// Connections terminated for missing the previous probe.
    pub terminated: usize,
}

/// Periodically probes connections and terminates those that stay silent.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    hub: Arc<LiveHub>,
    interval: Duration,
}

impl HeartbeatMonitor {
    /// Create a monitor sweeping every `interval`.
    pub fn new(hub: Arc<LiveHub>, interval: Duration) -> Self {
        Self { hub, interval }
    }

    /// One pass. A connection whose alive flag is already clear missed the
    /// last probe and is terminated; the rest are cleared and probed.
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for connection in self.hub.open_connections() {
            if connection.check_alive() {
                if connection.ping() {
                    report.probed += 1;
                }
            } else if self.hub.disconnect(&connection, LifecycleEvent::HeartbeatTimeout) {
                report.terminated += 1;
            }
        }
        report
    }

    /// Sweep until `cancel` fires. The first sweep happens one interval in.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.sweep();
                    if report.terminated > 0 {
                        info!(terminated = report.terminated, probed = report.probed, "heartbeat sweep");
                    } else {
                        debug!(probed = report.probed, "heartbeat sweep");
                    }
                }
                () = cancel.cancelled() => {
                    debug!("heartbeat stopped");
                    return;
                }
            }
        }
    }
}
