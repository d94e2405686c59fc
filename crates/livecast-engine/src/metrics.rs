//! Broadcast session metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use livecast_ipc::{BroadcastQuality, NetworkHealth};

/// Point-in-time view of [`SessionMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Seconds since the broadcast went live, zero when not live.
    pub uptime_seconds: u64,

    /// Transmission stats reports received.
    pub stats_reports: u64,

    /// Reconnect attempts reported by the media engine.
    pub retries: u64,

    /// Errors reported by the media engine.
    pub errors: u64,

    /// Most recent quality report.
    pub quality: Option<BroadcastQuality>,

    /// Most recent network health report.
    pub network: Option<NetworkHealth>,
}

/// Collects counters for one session.
pub struct SessionMetrics {
    start_time: RwLock<Option<Instant>>,
    stats_reports: AtomicU64,
    retries: AtomicU64,
    errors: AtomicU64,
    last_report: RwLock<Option<(BroadcastQuality, NetworkHealth)>>,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            start_time: RwLock::new(None),
            stats_reports: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            last_report: RwLock::new(None),
        }
    }

    /// Mark the broadcast live.
    pub fn start(&self) {
        *self.start_time.write() = Some(Instant::now());
    }

    /// Mark the broadcast over.
    pub fn stop(&self) {
        *self.start_time.write() = None;
    }

    /// Record a transmission stats report.
    pub fn record_stats(&self, quality: BroadcastQuality, network: NetworkHealth) {
        self.stats_reports.fetch_add(1, Ordering::Relaxed);
        *self.last_report.write() = Some((quality, network));
    }

    /// Record a reconnect attempt.
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an engine error.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the last network health if it is at or below `threshold`.
    pub fn check_network(&self, threshold: NetworkHealth) -> Option<NetworkHealth> {
        let (_, network) = (*self.last_report.read())?;
        if network >= threshold {
            debug!(network = network.wire_name(), "Network health below threshold");
            Some(network)
        } else {
            None
        }
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime_seconds = self
            .start_time
            .read()
            .map(|start| start.elapsed().as_secs())
            .unwrap_or(0);
        let last_report = *self.last_report.read();

        MetricsSnapshot {
            uptime_seconds,
            stats_reports: self.stats_reports.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            quality: last_report.map(|(quality, _)| quality),
            network: last_report.map(|(_, network)| network),
        }
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
