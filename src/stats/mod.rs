//! Operational statistics for the connector.
//!
//! Tracks how many snapshots were observed and what became of them, so a
//! host can see that reporting works without inspecting the reports.

pub mod report_log;

// Re-export commonly used types
pub use report_log::{
    create_shared_stats, create_shared_stats_with_persistence, ReportStats, ReportStatsSnapshot,
    ReportTrigger, SharedReportStats,
};
