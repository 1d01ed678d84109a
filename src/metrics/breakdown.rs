use std::collections::BTreeMap;

use serde::Serialize;

use crate::record::{OpportunityRecord, Status};

/// Records with one status, and their share of the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: Status,
    pub count: usize,
    /// Percentage of all records.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineCount {
    pub pipeline_id: String,
    pub count: usize,
}

/// A display row for the recent-opportunities table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityRow {
    pub id: String,
    pub name: String,
    pub monetary_value: f64,
    pub status: Status,
    pub contact_name: String,
}

impl From<&OpportunityRecord> for OpportunityRow {
    fn from(r: &OpportunityRecord) -> Self {
        Self {
            id: r.id.clone(),
            name: r.name.clone(),
            monetary_value: r.monetary_value,
            status: r.status,
            contact_name: r.contact_name().unwrap_or("Unknown").to_string(),
        }
    }
}

/// Whole-list overview: totals, status and pipeline distribution, and the
/// leading rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    /// Every record, dated or not.
    pub total: usize,
    /// Non-zero statuses in status order.
    pub statuses: Vec<StatusCount>,
    /// Pipelines sorted by id; records without a pipeline are skipped.
    pub pipelines: Vec<PipelineCount>,
    pub recent: Vec<OpportunityRow>,
}

/// Summarize a record list. Input order is kept for the recent rows.
pub fn breakdown<'a, I>(records: I, recent_limit: usize) -> Breakdown
where
    I: IntoIterator<Item = &'a OpportunityRecord>,
{
    let mut total = 0usize;
    let mut by_status: BTreeMap<Status, usize> = BTreeMap::new();
    let mut by_pipeline: BTreeMap<&str, usize> = BTreeMap::new();
    let mut recent = Vec::new();

    for record in records {
        total += 1;
        *by_status.entry(record.status).or_default() += 1;
        if let Some(pipeline) = record.pipeline_id.as_deref() {
            *by_pipeline.entry(pipeline).or_default() += 1;
        }
        if recent.len() < recent_limit {
            recent.push(OpportunityRow::from(record));
        }
    }

    let statuses = by_status
        .into_iter()
        .map(|(status, count)| StatusCount {
            status,
            count,
            percentage: count as f64 / total as f64 * 100.0,
        })
        .collect();
    let pipelines = by_pipeline
        .into_iter()
        .map(|(id, count)| PipelineCount {
            pipeline_id: id.to_string(),
            count,
        })
        .collect();

    log::debug!("Breakdown over {total} records");
    Breakdown {
        total,
        statuses,
        pipelines,
        recent,
    }
}
