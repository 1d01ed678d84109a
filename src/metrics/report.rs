use chrono::{DateTime, TimeZone};
use serde::Serialize;

use super::{compute_metric, AggregateResult, MetricKind, MetricSpec};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::query::{SubjectFilter, Window};
use crate::record::OpportunityRecord;

/// Everything a subject's progress dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub subject: SubjectFilter,
    pub subject_label: String,
    /// Won sales this year against the yearly goal.
    pub year_to_date: AggregateResult,
    /// Won sales this month against the monthly goal.
    pub month_to_date: AggregateResult,
    pub deals_won: AggregateResult,
    pub average_sale: AggregateResult,
    /// Share of won deals whose contact carries the completion tag.
    pub completion_rate: AggregateResult,
    pub total_leads: AggregateResult,
}

/// Build a subject's progress report against the configured goals.
pub fn progress_report<Z: TimeZone>(
    records: &[OpportunityRecord],
    subject: &SubjectFilter,
    config: &EngineConfig,
    now: &DateTime<Z>,
) -> Result<ProgressReport> {
    let run = |kind: MetricKind, window: Window, goal: Option<f64>| {
        let mut spec = MetricSpec::new(kind, window).with_subject(subject.clone());
        spec.goal = goal;
        compute_metric(records, &spec, config, now)
    };

    Ok(ProgressReport {
        subject: subject.clone(),
        subject_label: subject.label(&config.subjects),
        year_to_date: run(MetricKind::GoalProgress, Window::YearToDate, Some(config.goals.yearly))?,
        month_to_date: run(
            MetricKind::GoalProgress,
            Window::MonthToDate,
            Some(config.goals.monthly),
        )?,
        deals_won: run(MetricKind::UnitCount, Window::AllTime, None)?,
        average_sale: run(MetricKind::AverageSale, Window::AllTime, None)?,
        completion_rate: run(MetricKind::CompletionRate, Window::AllTime, None)?,
        total_leads: run(MetricKind::LeadCount, Window::AllTime, None)?,
    })
}
