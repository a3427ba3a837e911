//! Counters describing what the connector did with the snapshots it saw.
//!
//! Only counts and timestamps are kept here; no queries, refinements or
//! results are ever recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// What caused a report attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTrigger {
    /// The debounce timer expired
    Debounce,
    /// The host signalled a user interaction
    Interaction,
    /// The host is tearing down
    Teardown,
    /// A direct call from the host
    Manual,
}

impl std::fmt::Display for ReportTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReportTrigger::Debounce => "debounce",
            ReportTrigger::Interaction => "interaction",
            ReportTrigger::Teardown => "teardown",
            ReportTrigger::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Reporting statistics for the current session.
#[derive(Debug)]
pub struct ReportStats {
    /// Number of render calls
    renders: AtomicU64,
    /// Report attempts per trigger
    debounce_fires: AtomicU64,
    interaction_flushes: AtomicU64,
    teardown_flushes: AtomicU64,
    manual_flushes: AtomicU64,
    /// Sink invocations that succeeded
    reports_sent: AtomicU64,
    /// Attempts skipped because the key matched the baseline
    duplicates_suppressed: AtomicU64,
    /// Attempts with no cached snapshot
    empty_flushes: AtomicU64,
    /// Sink invocations that returned an error
    sink_failures: AtomicU64,
    /// Millisecond timestamp of the last sent report (0 = never)
    last_report_ms: AtomicI64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl ReportStats {
    pub fn new() -> Self {
        Self {
            renders: AtomicU64::new(0),
            debounce_fires: AtomicU64::new(0),
            interaction_flushes: AtomicU64::new(0),
            teardown_flushes: AtomicU64::new(0),
            manual_flushes: AtomicU64::new(0),
            reports_sent: AtomicU64::new(0),
            duplicates_suppressed: AtomicU64::new(0),
            empty_flushes: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            last_report_ms: AtomicI64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats backed by a file; existing counters are loaded from it.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("Could not load previous report stats: {e}");
        }

        stats
    }

    pub fn record_render(&self) {
        self.renders.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a report attempt started.
    pub fn record_attempt(&self, trigger: ReportTrigger) {
        let counter = match trigger {
            ReportTrigger::Debounce => &self.debounce_fires,
            ReportTrigger::Interaction => &self.interaction_flushes,
            ReportTrigger::Teardown => &self.teardown_flushes,
            ReportTrigger::Manual => &self.manual_flushes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.reports_sent.fetch_add(1, Ordering::Relaxed);
        self.last_report_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty(&self) {
        self.empty_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> ReportStatsSnapshot {
        let last_report_ms = self.last_report_ms.load(Ordering::Relaxed);
        ReportStatsSnapshot {
            renders: self.renders.load(Ordering::Relaxed),
            debounce_fires: self.debounce_fires.load(Ordering::Relaxed),
            interaction_flushes: self.interaction_flushes.load(Ordering::Relaxed),
            teardown_flushes: self.teardown_flushes.load(Ordering::Relaxed),
            manual_flushes: self.manual_flushes.load(Ordering::Relaxed),
            reports_sent: self.reports_sent.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            empty_flushes: self.empty_flushes.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            last_report_at: (last_report_ms != 0)
                .then(|| DateTime::from_timestamp_millis(last_report_ms))
                .flatten(),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds() as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        let last_report = stats
            .last_report_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        format!(
            "Report Statistics:\n\
             - Renders observed: {}\n\
             - Debounce timer fires: {}\n\
             - Interaction flushes: {}\n\
             - Teardown flushes: {}\n\
             - Manual flushes: {}\n\
             - Reports sent: {}\n\
             - Duplicates suppressed: {}\n\
             - Flushes without a snapshot: {}\n\
             - Sink failures: {}\n\
             - Last report: {}\n\
             - Session duration: {} seconds",
            stats.renders,
            stats.debounce_fires,
            stats.interaction_flushes,
            stats.teardown_flushes,
            stats.manual_flushes,
            stats.reports_sent,
            stats.duplicates_suppressed,
            stats.empty_flushes,
            stats.sink_failures,
            last_report,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.snapshot();
            let persisted = PersistedStats {
                renders: stats.renders,
                debounce_fires: stats.debounce_fires,
                interaction_flushes: stats.interaction_flushes,
                teardown_flushes: stats.teardown_flushes,
                manual_flushes: stats.manual_flushes,
                reports_sent: stats.reports_sent,
                duplicates_suppressed: stats.duplicates_suppressed,
                empty_flushes: stats.empty_flushes,
                sink_failures: stats.sink_failures,
                last_report_at: stats.last_report_at,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.renders.store(persisted.renders, Ordering::Relaxed);
                self.debounce_fires
                    .store(persisted.debounce_fires, Ordering::Relaxed);
                self.interaction_flushes
                    .store(persisted.interaction_flushes, Ordering::Relaxed);
                self.teardown_flushes
                    .store(persisted.teardown_flushes, Ordering::Relaxed);
                self.manual_flushes
                    .store(persisted.manual_flushes, Ordering::Relaxed);
                self.reports_sent
                    .store(persisted.reports_sent, Ordering::Relaxed);
                self.duplicates_suppressed
                    .store(persisted.duplicates_suppressed, Ordering::Relaxed);
                self.empty_flushes
                    .store(persisted.empty_flushes, Ordering::Relaxed);
                self.sink_failures
                    .store(persisted.sink_failures, Ordering::Relaxed);
                if let Some(at) = persisted.last_report_at {
                    self.last_report_ms
                        .store(at.timestamp_millis(), Ordering::Relaxed);
                }
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.renders,
            &self.debounce_fires,
            &self.interaction_flushes,
            &self.teardown_flushes,
            &self.manual_flushes,
            &self.reports_sent,
            &self.duplicates_suppressed,
            &self.empty_flushes,
            &self.sink_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.last_report_ms.store(0, Ordering::Relaxed);
    }
}

impl Default for ReportStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportStatsSnapshot {
    pub renders: u64,
    pub debounce_fires: u64,
    pub interaction_flushes: u64,
    pub teardown_flushes: u64,
    pub manual_flushes: u64,
    pub reports_sent: u64,
    pub duplicates_suppressed: u64,
    pub empty_flushes: u64,
    pub sink_failures: u64,
    pub last_report_at: Option<DateTime<Utc>>,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    renders: u64,
    debounce_fires: u64,
    interaction_flushes: u64,
    teardown_flushes: u64,
    manual_flushes: u64,
    reports_sent: u64,
    duplicates_suppressed: u64,
    empty_flushes: u64,
    sink_failures: u64,
    last_report_at: Option<DateTime<Utc>>,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared report stats.
pub type SharedReportStats = Arc<ReportStats>;

/// Create new shared report stats.
pub fn create_shared_stats() -> SharedReportStats {
    Arc::new(ReportStats::new())
}

/// Create new shared report stats with persistence.
pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedReportStats {
    Arc::new(ReportStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = ReportStats::new();

        stats.record_render();
        stats.record_render();
        stats.record_attempt(ReportTrigger::Debounce);
        stats.record_attempt(ReportTrigger::Interaction);
        stats.record_duplicate();
        stats.record_sent();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.renders, 2);
        assert_eq!(snapshot.debounce_fires, 1);
        assert_eq!(snapshot.interaction_flushes, 1);
        assert_eq!(snapshot.teardown_flushes, 0);
        assert_eq!(snapshot.duplicates_suppressed, 1);
        assert_eq!(snapshot.reports_sent, 1);
        assert!(snapshot.last_report_at.is_some());
    }

    #[test]
    fn test_reset() {
        let stats = ReportStats::new();
        stats.record_render();
        stats.record_sent();
        stats.record_sink_failure();
        stats.reset();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.renders, 0);
        assert_eq!(snapshot.reports_sent, 0);
        assert_eq!(snapshot.sink_failures, 0);
        assert!(snapshot.last_report_at.is_none());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let path = std::env::temp_dir()
            .join(format!("search-analytics-stats-{}", uuid::Uuid::new_v4()))
            .join("report_stats.json");

        let stats = ReportStats::with_persistence(path.clone());
        stats.record_render();
        stats.record_sent();
        stats.record_empty();
        stats.save().unwrap();

        let reloaded = ReportStats::with_persistence(path.clone());
        let snapshot = reloaded.snapshot();
        assert_eq!(snapshot.renders, 1);
        assert_eq!(snapshot.reports_sent, 1);
        assert_eq!(snapshot.empty_flushes, 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_summary_format() {
        let stats = ReportStats::new();
        let summary = stats.summary();

        assert!(summary.contains("Reports sent"));
        assert!(summary.contains("Duplicates suppressed"));
        assert!(summary.contains("Last report: never"));
    }

    #[test]
    fn test_trigger_display() {
        assert_eq!(ReportTrigger::Teardown.to_string(), "teardown");
    }
}
