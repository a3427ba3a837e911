//! The single report path shared by the timer and interaction hooks.

use crate::connector::ConnectorError;
use crate::core::{ChangeDetector, Report, SearchSnapshot};
use crate::sink::PushFunction;
use crate::stats::{ReportTrigger, SharedReportStats};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What a report attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The sink accepted the report
    Sent { encoded_refinements: String },
    /// The query and encoding matched the last sent report
    Duplicate,
    /// Nothing has been rendered yet
    NoSnapshot,
}

impl ReportOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, ReportOutcome::Sent { .. })
    }
}

/// Push function plus the baseline it was last called with.
struct Pipeline {
    detector: ChangeDetector,
    push: PushFunction,
}

/// Owns the cached snapshot and the reporting pipeline.
///
/// The cache and the pipeline sit behind separate locks so a render never
/// waits on a slow sink. The push function must not call back into the
/// connector's report path.
pub(crate) struct Reporter {
    cached: Mutex<Option<Arc<SearchSnapshot>>>,
    pipeline: Mutex<Pipeline>,
    stats: SharedReportStats,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Reporter {
    pub(crate) fn new(push: PushFunction, stats: SharedReportStats) -> Self {
        Self {
            cached: Mutex::new(None),
            pipeline: Mutex::new(Pipeline {
                detector: ChangeDetector::new(),
                push,
            }),
            stats,
        }
    }

    /// Replace the cached snapshot.
    pub(crate) fn cache(&self, snapshot: SearchSnapshot) {
        *lock(&self.cached) = Some(Arc::new(snapshot));
    }

    pub(crate) fn cached(&self) -> Option<Arc<SearchSnapshot>> {
        lock(&self.cached).clone()
    }

    pub(crate) fn baseline(&self) -> String {
        lock(&self.pipeline).detector.baseline().to_string()
    }

    pub(crate) fn stats(&self) -> &SharedReportStats {
        &self.stats
    }

    /// Report whatever is cached once the pipeline is free.
    ///
    /// The cache is read under the pipeline lock, so a trigger that waited
    /// for another push reports the newest snapshot rather than the one
    /// cached when it fired.
    pub(crate) fn report_cached(
        &self,
        trigger: ReportTrigger,
    ) -> Result<ReportOutcome, ConnectorError> {
        let mut pipeline = lock(&self.pipeline);
        let snapshot = self.cached();
        self.report_locked(&mut pipeline, snapshot.as_deref(), trigger)
    }

    /// Report the cached snapshot, logging instead of returning sink errors.
    ///
    /// Used where there is no caller to hand an error to: timer expiry and
    /// interaction hooks.
    pub(crate) fn report_cached_logged(&self, trigger: ReportTrigger) {
        if let Err(e) = self.report_cached(trigger) {
            tracing::warn!(%trigger, "Analytics report failed: {e}");
        }
    }

    /// Encode, deduplicate, push, then move the baseline.
    ///
    /// The baseline only moves after the push function returns `Ok`, so a
    /// failed push is attempted again on the next trigger.
    pub(crate) fn report(
        &self,
        snapshot: Option<&SearchSnapshot>,
        trigger: ReportTrigger,
    ) -> Result<ReportOutcome, ConnectorError> {
        let mut pipeline = lock(&self.pipeline);
        self.report_locked(&mut pipeline, snapshot, trigger)
    }

    fn report_locked(
        &self,
        pipeline: &mut Pipeline,
        snapshot: Option<&SearchSnapshot>,
        trigger: ReportTrigger,
    ) -> Result<ReportOutcome, ConnectorError> {
        self.stats.record_attempt(trigger);

        let Some(snapshot) = snapshot else {
            self.stats.record_empty();
            tracing::trace!(%trigger, "No snapshot to report");
            return Ok(ReportOutcome::NoSnapshot);
        };

        let report = Report::from_snapshot(snapshot);
        let key = report.comparison_key();

        if !pipeline.detector.should_report(&key) {
            self.stats.record_duplicate();
            tracing::debug!(%trigger, "Report unchanged since last push, skipping");
            return Ok(ReportOutcome::Duplicate);
        }

        if let Err(e) = (pipeline.push)(
            &report.encoded_refinements,
            &report.raw_state,
            &report.results,
        ) {
            self.stats.record_sink_failure();
            return Err(ConnectorError::Sink(e));
        }

        pipeline.detector.commit(key);
        self.stats.record_sent();
        tracing::info!(
            %trigger,
            refinements = %report.encoded_refinements,
            "Reported search state"
        );

        Ok(ReportOutcome::Sent {
            encoded_refinements: report.encoded_refinements,
        })
    }
}
