//! Search Analytics Connector - debounced analytics reporting for search UIs.
//!
//! A search UI re-renders on every keystroke and every refinement click.
//! This crate watches that stream of search states, waits for the user to
//! settle, encodes the active refinements into a compact canonical string
//! and hands it to an analytics sink, skipping reports that would repeat the
//! previous one.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Search Analytics Connector                 │
//! ├──────────────────────────────────────────────────────────────┤
//! │  render() ──▶ ┌────────────┐ expiry ┌────────────┐            │
//! │               │  Debounce  │───────▶│ Serializer │            │
//! │               │  (3s quiet)│        │ (encoding) │            │
//! │               └────────────┘        └─────┬──────┘            │
//! │  ┌─────────────┐  flush now               ▼                   │
//! │  │ Interaction │──────────────────▶┌────────────┐  changed    │
//! │  │   Source    │                   │   Change   │──────▶ Sink │
//! │  └─────────────┘                   │  Detector  │             │
//! │                                    └────────────┘             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use search_analytics_connector::{encode_state, NumericFilter, StateSnapshot};
//!
//! let mut state = StateSnapshot::new("shoes");
//! state.facet_refinements.insert("color", vec!["red".into(), "blue".into()]);
//! state.numeric_refinements.insert("price", NumericFilter::Range { lower: 10.0, upper: 20.0 });
//!
//! assert_eq!(encode_state(&state), "color=color_red+blue&price=price_10to20");
//! ```

pub mod config;
pub mod connector;
pub mod core;
pub mod interaction;
pub mod sink;
pub mod stats;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, DEFAULT_DELAY};
pub use connector::{AnalyticsConnector, ConnectorBuilder, ConnectorError, ReportOutcome, USAGE};
pub use crate::core::{
    comparison_key, encode_refinements, encode_state, ChangeDetector, NumericFilter, Report,
    ReportBuilder, ReportEnvelope, SearchSnapshot, StateSnapshot,
};
pub use interaction::{
    ChannelInteractionSource, InteractionEvent, InteractionHook, InteractionSource,
    ManualInteractionSource,
};
pub use sink::{JsonLinesSink, PushFunction, SinkError};
pub use stats::{ReportStats, ReportTrigger, SharedReportStats};

#[cfg(feature = "http-sink")]
pub use sink::{HttpSink, HttpSinkConfig};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_mentions_required_option() {
        assert!(USAGE.contains("push_function"));
        assert!(USAGE.contains("3000"));
    }
}
