//! Duplicate suppression for reports.
//!
//! Two snapshots are the same report when their query and refinement
//! encoding are the same, regardless of any other state or results.

/// Build the comparison key for a query and its refinement encoding.
pub fn comparison_key(query: &str, encoded_refinements: &str) -> String {
    format!("Query: {query}, {encoded_refinements}")
}

/// Tracks the key of the last report the sink accepted.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    baseline: String,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a report with `key` differs from the last accepted one.
    pub fn should_report(&self, key: &str) -> bool {
        self.baseline != key
    }

    /// Record `key` as the last accepted report.
    pub fn commit(&mut self, key: String) {
        self.baseline = key;
    }

    /// The last accepted key (empty before the first report).
    pub fn baseline(&self) -> &str {
        &self.baseline
    }
}
