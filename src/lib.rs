pub mod config;
pub mod date_util;
pub mod error;
pub mod format;
pub mod metrics;
pub mod query;
pub mod record;

pub use config::{EngineConfig, GoalDefaults, SubjectDirectory, TierThresholds};
pub use error::{Error, Result};
pub use metrics::{
    AggregateResult, Auxiliary, Breakdown, MetricFormat, MetricKind, MetricRequest, MetricSpec,
    PerformanceTier, ProgressReport, StatusPredicate,
};
pub use query::{DateField, SubjectFilter, Window, WindowFilter};
pub use record::{decode_payload, decode_value, normalize, Contact, OpportunityRecord, Status};

use chrono::{DateTime, TimeZone, Utc};

/// Main entry point: an aggregation engine bound to one configuration.
///
/// The engine holds no mutable state. Every call is a pure function of the
/// records, the request, the configuration, and the reference instant, so
/// a single engine can be shared freely across threads.
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    config: EngineConfig,
}

impl MetricsEngine {
    /// Validates `config` up front so later calls fail only on the request.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Metrics ──────────────────────────────────────────────────

    /// Compute one metric as of `now`.
    pub fn compute_at<Z: TimeZone>(
        &self,
        records: &[OpportunityRecord],
        spec: &MetricSpec,
        now: &DateTime<Z>,
    ) -> Result<AggregateResult> {
        metrics::compute_metric(records, spec, &self.config, now)
    }

    /// Compute one metric as of the current instant.
    pub fn compute(&self, records: &[OpportunityRecord], spec: &MetricSpec) -> Result<AggregateResult> {
        self.compute_at(records, spec, &Utc::now())
    }

    /// Validate a loosely typed request and compute it as of `now`.
    pub fn compute_request<Z: TimeZone>(
        &self,
        records: &[OpportunityRecord],
        request: MetricRequest,
        now: &DateTime<Z>,
    ) -> Result<AggregateResult> {
        let spec = MetricSpec::try_from(request)?;
        self.compute_at(records, &spec, now)
    }

    /// Compute several metrics against one reference instant, so every
    /// window in the batch shares the same boundaries.
    pub fn compute_all<Z: TimeZone>(
        &self,
        records: &[OpportunityRecord],
        specs: &[MetricSpec],
        now: &DateTime<Z>,
    ) -> Result<Vec<AggregateResult>> {
        specs
            .iter()
            .map(|spec| self.compute_at(records, spec, now))
            .collect()
    }

    // ── Dashboards ───────────────────────────────────────────────

    /// Status/pipeline distribution plus the leading display rows.
    pub fn breakdown(&self, records: &[OpportunityRecord]) -> Breakdown {
        metrics::breakdown(records, self.config.recent_limit)
    }

    /// A subject's yearly/monthly progress and summary figures as of `now`.
    pub fn progress_report<Z: TimeZone>(
        &self,
        records: &[OpportunityRecord],
        subject: &SubjectFilter,
        now: &DateTime<Z>,
    ) -> Result<ProgressReport> {
        metrics::progress_report(records, subject, &self.config, now)
    }
}
