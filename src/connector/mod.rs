//! The connector a search UI drives.
//!
//! The host builds one [`AnalyticsConnector`], calls [`init`] once during
//! setup, and calls [`render`] on every search-state change. The connector
//! waits for a quiet period, encodes the latest state and pushes it to the
//! configured sink unless it matches what was last pushed.
//!
//! ```no_run
//! use search_analytics_connector::{AnalyticsConnector, ManualInteractionSource, StateSnapshot};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = AnalyticsConnector::builder()
//!     .push_function(|encoded, state, _results| {
//!         println!("{} -> {encoded}", state.query);
//!         Ok(())
//!     })
//!     .delay(Duration::from_millis(1500))
//!     .trigger_on_ui_interaction(true)
//!     .build()?;
//!
//! let clicks = ManualInteractionSource::new();
//! connector.init(&clicks);
//! connector.render(StateSnapshot::new("running shoes"), serde_json::Value::Null);
//! # Ok(())
//! # }
//! ```
//!
//! [`init`]: AnalyticsConnector::init
//! [`render`]: AnalyticsConnector::render

pub mod debounce;
pub mod reporter;

pub use debounce::Debouncer;
pub use reporter::ReportOutcome;

use crate::config::{Config, DEFAULT_DELAY};
use crate::core::{SearchSnapshot, StateSnapshot};
use crate::interaction::InteractionSource;
use crate::sink::{PushFunction, SinkError};
use crate::stats::{create_shared_stats, ReportTrigger, SharedReportStats};
use reporter::Reporter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// How to build a connector.
pub const USAGE: &str = "Usage:
AnalyticsConnector::builder()
    .push_function(push_function)
    [ .delay(Duration::from_millis(3000)) ]
    [ .trigger_on_ui_interaction(false) ]
    .build()";

/// Connector errors.
#[derive(Debug)]
pub enum ConnectorError {
    /// No push function was configured; carries the usage text
    MissingPushFunction(&'static str),
    /// Built outside a tokio runtime without an explicit handle
    NoRuntime,
    /// A render payload did not have the expected shape
    InvalidPayload(String),
    /// The push function returned an error
    Sink(SinkError),
}

impl std::fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorError::MissingPushFunction(usage) => {
                write!(f, "A push function is required.\n{usage}")
            }
            ConnectorError::NoRuntime => write!(
                f,
                "No tokio runtime: build inside a runtime or pass one with .runtime(handle)"
            ),
            ConnectorError::InvalidPayload(msg) => write!(f, "Invalid render payload: {msg}"),
            ConnectorError::Sink(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ConnectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectorError::Sink(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SinkError> for ConnectorError {
    fn from(e: SinkError) -> Self {
        ConnectorError::Sink(e)
    }
}

/// Builder for [`AnalyticsConnector`].
#[derive(Default)]
pub struct ConnectorBuilder {
    push: Option<PushFunction>,
    delay: Option<Duration>,
    trigger_on_ui_interaction: Option<bool>,
    runtime: Option<Handle>,
    stats: Option<SharedReportStats>,
}

impl ConnectorBuilder {
    /// The sink called with `(encoded_refinements, state, results)`. Required.
    pub fn push_function<F>(mut self, push: F) -> Self
    where
        F: FnMut(&str, &StateSnapshot, &serde_json::Value) -> Result<(), SinkError>
            + Send
            + 'static,
    {
        self.push = Some(Box::new(push));
        self
    }

    /// Use an already boxed push function.
    pub fn boxed_push_function(mut self, push: PushFunction) -> Self {
        self.push = Some(push);
        self
    }

    /// Quiet period after the last render before reporting (default 3000 ms).
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report immediately on interaction and teardown events (default false).
    pub fn trigger_on_ui_interaction(mut self, enabled: bool) -> Self {
        self.trigger_on_ui_interaction = Some(enabled);
        self
    }

    /// Take delay and interaction settings from a loaded [`Config`].
    pub fn config(self, config: &Config) -> Self {
        self.delay(config.delay)
            .trigger_on_ui_interaction(config.trigger_on_ui_interaction)
    }

    /// Runtime for the debounce timer; defaults to the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Share statistics with the caller (e.g. for persistence).
    pub fn stats(mut self, stats: SharedReportStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn build(self) -> Result<AnalyticsConnector, ConnectorError> {
        let push = self
            .push
            .ok_or(ConnectorError::MissingPushFunction(USAGE))?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| ConnectorError::NoRuntime)?,
        };
        let delay = self.delay.unwrap_or(DEFAULT_DELAY);
        let trigger_on_ui_interaction = self.trigger_on_ui_interaction.unwrap_or(false);
        let stats = self.stats.unwrap_or_else(create_shared_stats);

        tracing::debug!(
            delay_ms = delay.as_millis() as u64,
            trigger_on_ui_interaction,
            "Analytics connector configured"
        );

        Ok(AnalyticsConnector {
            trigger_on_ui_interaction,
            reporter: Arc::new(Reporter::new(push, stats)),
            debouncer: Debouncer::new(delay, runtime),
            initialized: AtomicBool::new(false),
        })
    }
}

/// Debounced, deduplicated analytics reporting for search state.
pub struct AnalyticsConnector {
    trigger_on_ui_interaction: bool,
    reporter: Arc<Reporter>,
    debouncer: Debouncer,
    initialized: AtomicBool,
}

impl AnalyticsConnector {
    pub fn builder() -> ConnectorBuilder {
        ConnectorBuilder::default()
    }

    /// Register interaction and teardown hooks when enabled.
    ///
    /// Returns whether hooks were registered. Hooks are registered at most
    /// once per connector; later calls do nothing.
    pub fn init(&self, source: &dyn InteractionSource) -> bool {
        if !self.trigger_on_ui_interaction {
            return false;
        }
        if self.initialized.swap(true, Ordering::SeqCst) {
            tracing::debug!("Interaction hooks already registered");
            return false;
        }

        let reporter = Arc::clone(&self.reporter);
        source.on_interaction(Arc::new(move || {
            reporter.report_cached_logged(ReportTrigger::Interaction)
        }));

        let reporter = Arc::clone(&self.reporter);
        source.on_teardown(Arc::new(move || {
            reporter.report_cached_logged(ReportTrigger::Teardown)
        }));

        tracing::debug!("Interaction hooks registered");
        true
    }

    /// Cache a new search state and restart the quiet period.
    pub fn render(&self, state: StateSnapshot, results: serde_json::Value) {
        self.render_snapshot(SearchSnapshot::new(state, results));
    }

    /// Same as [`render`](Self::render) with a prebuilt snapshot.
    pub fn render_snapshot(&self, snapshot: SearchSnapshot) {
        self.reporter.cache(snapshot);
        self.reporter.stats().record_render();
        tracing::debug!(
            delay_ms = self.debouncer.delay().as_millis() as u64,
            "Search state cached, report scheduled"
        );

        let reporter = Arc::clone(&self.reporter);
        self.debouncer
            .arm(move || reporter.report_cached_logged(ReportTrigger::Debounce));
    }

    /// Render from a host payload shaped `{ "state": {...}, "results": ... }`.
    ///
    /// Fields beyond those the connector reads are ignored.
    pub fn render_json(&self, payload: serde_json::Value) -> Result<(), ConnectorError> {
        let snapshot: SearchSnapshot = serde_json::from_value(payload)
            .map_err(|e| ConnectorError::InvalidPayload(e.to_string()))?;
        self.render_snapshot(snapshot);
        Ok(())
    }

    /// Run the report path for `snapshot` right away.
    pub fn report_now(
        &self,
        snapshot: Option<&SearchSnapshot>,
    ) -> Result<ReportOutcome, ConnectorError> {
        self.reporter.report(snapshot, ReportTrigger::Manual)
    }

    /// Report the cached snapshot right away, leaving the timer armed.
    pub fn flush(&self) -> Result<ReportOutcome, ConnectorError> {
        self.reporter.report_cached(ReportTrigger::Manual)
    }

    /// Latest rendered snapshot.
    pub fn cached_snapshot(&self) -> Option<Arc<SearchSnapshot>> {
        self.reporter.cached()
    }

    /// Comparison key of the last successful report (empty before the first).
    pub fn baseline(&self) -> String {
        self.reporter.baseline()
    }

    /// Whether a debounced report is waiting to fire.
    pub fn has_pending_report(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn delay(&self) -> Duration {
        self.debouncer.delay()
    }

    pub fn trigger_on_ui_interaction(&self) -> bool {
        self.trigger_on_ui_interaction
    }

    pub fn stats(&self) -> &SharedReportStats {
        self.reporter.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_without_push_function_fails() {
        let err = AnalyticsConnector::builder()
            .delay(Duration::from_millis(10))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConnectorError::MissingPushFunction(_)));
        assert!(err.to_string().contains("push_function"));
    }

    #[test]
    fn test_build_outside_runtime_needs_handle() {
        let err = AnalyticsConnector::builder()
            .push_function(|_, _, _| Ok(()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConnectorError::NoRuntime));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let connector = AnalyticsConnector::builder()
            .push_function(|_, _, _| Ok(()))
            .runtime(runtime.handle().clone())
            .build()
            .unwrap();
        assert_eq!(connector.delay(), DEFAULT_DELAY);
        assert!(!connector.trigger_on_ui_interaction());
    }

    #[tokio::test]
    async fn test_config_applies_settings() {
        let config = Config {
            delay: Duration::from_millis(250),
            trigger_on_ui_interaction: true,
            ..Config::default()
        };
        let connector = AnalyticsConnector::builder()
            .push_function(|_, _, _| Ok(()))
            .config(&config)
            .build()
            .unwrap();
        assert_eq!(connector.delay(), Duration::from_millis(250));
        assert!(connector.trigger_on_ui_interaction());
    }

    #[tokio::test]
    async fn test_render_json_rejects_bad_payload() {
        let connector = AnalyticsConnector::builder()
            .push_function(|_, _, _| Ok(()))
            .build()
            .unwrap();
        let err = connector
            .render_json(serde_json::json!({"state": {"query": 42}}))
            .unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidPayload(_)));
        assert!(connector.cached_snapshot().is_none());
    }
}
