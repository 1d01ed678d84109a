use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::parse_timezone;
use crate::error::{Error, Result};
use crate::format::{format_count, format_currency, format_percentage};
use crate::query::{DateField, SubjectFilter, Window, WindowFilter};
use crate::record::Status;

/// The metrics the aggregator knows how to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    TotalSales,
    AverageSale,
    UnitCount,
    LeadCount,
    CompletionRate,
    GoalProgress,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::TotalSales,
        MetricKind::AverageSale,
        MetricKind::UnitCount,
        MetricKind::LeadCount,
        MetricKind::CompletionRate,
        MetricKind::GoalProgress,
    ];

    pub fn parse(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| Error::InvalidSpecification(format!("unrecognized metric kind: {s}")))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::TotalSales => "total_sales",
            MetricKind::AverageSale => "average_sale",
            MetricKind::UnitCount => "unit_count",
            MetricKind::LeadCount => "lead_count",
            MetricKind::CompletionRate => "completion_rate",
            MetricKind::GoalProgress => "goal_progress",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::TotalSales => "Total Sales",
            MetricKind::AverageSale => "Average Sale",
            MetricKind::UnitCount => "Deals Won",
            MetricKind::LeadCount => "Total Leads",
            MetricKind::CompletionRate => "Completion Rate",
            MetricKind::GoalProgress => "Sales Progress",
        }
    }

    pub fn format(&self) -> MetricFormat {
        match self {
            MetricKind::TotalSales | MetricKind::AverageSale => MetricFormat::Currency,
            MetricKind::UnitCount | MetricKind::LeadCount => MetricFormat::Count,
            MetricKind::CompletionRate | MetricKind::GoalProgress => MetricFormat::Percentage,
        }
    }

    /// Whether the metric is meaningless without a positive goal.
    pub fn requires_goal(&self) -> bool {
        matches!(self, MetricKind::GoalProgress)
    }

    /// Sales metrics count won deals by their status-change date; lead
    /// metrics count every record by its creation date.
    pub fn default_filter(&self, window: Window) -> WindowFilter {
        match self {
            MetricKind::LeadCount => WindowFilter::created(window),
            _ => WindowFilter::won(window),
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFormat {
    Currency,
    Percentage,
    Count,
}

impl MetricFormat {
    pub fn render(&self, value: f64) -> String {
        match self {
            MetricFormat::Currency => format_currency(value),
            MetricFormat::Percentage => format_percentage(value),
            MetricFormat::Count => format_count(value),
        }
    }
}

/// Coarse classification of a value against its goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    NeedsImprovement,
    Good,
    Excellent,
}

/// Kind-specific secondary figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Auxiliary {
    /// Nothing beyond the value itself.
    Empty,
    SampleSize { sample_size: usize },
    Completion { completed: usize, subset_count: usize },
    Progress {
        actual: f64,
        goal: f64,
        /// `max(goal - actual, 0)`
        remaining: f64,
        /// Value capped at 100, for progress bars.
        display_percentage: f64,
    },
}

/// The outcome of one aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub kind: MetricKind,
    pub value: f64,
    pub format: MetricFormat,
    pub label: String,
    pub goal: Option<f64>,
    /// Records backing the value.
    pub sample_size: usize,
    pub auxiliary: Auxiliary,
    /// `None` when the metric has no goal to be measured against.
    pub performance_tier: Option<PerformanceTier>,
}

impl AggregateResult {
    /// The value rendered per its format.
    pub fn display(&self) -> String {
        self.format.render(self.value)
    }
}

/// Restriction on record status applied before windowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPredicate {
    Any,
    Is(Status),
}

impl StatusPredicate {
    fn as_option(self) -> Option<Status> {
        match self {
            StatusPredicate::Any => None,
            StatusPredicate::Is(s) => Some(s),
        }
    }
}

/// A fully typed metric request.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    pub kind: MetricKind,
    pub subject: SubjectFilter,
    pub window: Window,
    /// Target; required (or defaulted from config) for `goal_progress`.
    pub goal: Option<f64>,
    /// Overrides the configured reference zone.
    pub timezone: Option<Tz>,
    /// Overrides the kind's default date field.
    pub date_field: Option<DateField>,
    /// Overrides the kind's default status predicate.
    pub status: Option<StatusPredicate>,
}

impl MetricSpec {
    pub fn new(kind: MetricKind, window: Window) -> Self {
        Self {
            kind,
            subject: SubjectFilter::All,
            window,
            goal: None,
            timezone: None,
            date_field: None,
            status: None,
        }
    }

    pub fn with_subject(mut self, subject: SubjectFilter) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_goal(mut self, goal: f64) -> Self {
        self.goal = Some(goal);
        self
    }

    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.timezone = Some(tz);
        self
    }

    pub fn with_date_field(mut self, field: DateField) -> Self {
        self.date_field = Some(field);
        self
    }

    pub fn with_status(mut self, status: StatusPredicate) -> Self {
        self.status = Some(status);
        self
    }

    /// The kind's default filter with this spec's overrides applied.
    pub fn window_filter(&self) -> WindowFilter {
        let mut filter = self.kind.default_filter(self.window);
        if let Some(field) = self.date_field {
            filter.date_field = field;
        }
        if let Some(status) = self.status {
            filter.status = status.as_option();
        }
        filter
    }
}

/// Loosely typed metric request, as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRequest {
    pub kind: String,
    #[serde(default, alias = "subject")]
    pub subject_filter: Option<String>,
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub goal: Option<f64>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub date_field: Option<String>,
    /// `any`, or a status name.
    #[serde(default)]
    pub status: Option<String>,
}

impl TryFrom<MetricRequest> for MetricSpec {
    type Error = Error;

    fn try_from(req: MetricRequest) -> Result<Self> {
        let kind = MetricKind::parse(&req.kind)?;
        let window = match req.window.as_deref() {
            Some(w) => Window::parse(w)?,
            None => Window::AllTime,
        };
        let mut spec = MetricSpec::new(kind, window)
            .with_subject(req.subject_filter.as_deref().map(SubjectFilter::parse).unwrap_or_default());
        spec.goal = req.goal;
        if let Some(tz) = req.timezone.as_deref() {
            spec.timezone = Some(
                parse_timezone(tz).map_err(|_| {
                    Error::InvalidSpecification(format!("unknown timezone: {tz}"))
                })?,
            );
        }
        if let Some(field) = req.date_field.as_deref() {
            spec.date_field = Some(DateField::parse(field)?);
        }
        if let Some(status) = req.status.as_deref() {
            spec.status = Some(parse_status_predicate(status)?);
        }
        Ok(spec)
    }
}

fn parse_status_predicate(s: &str) -> Result<StatusPredicate> {
    let key = s.trim().to_lowercase();
    if key == "any" {
        return Ok(StatusPredicate::Any);
    }
    match Status::parse(&key) {
        Status::Unknown if key != "unknown" => Err(Error::InvalidSpecification(format!(
            "unrecognized status: {s}"
        ))),
        status => Ok(StatusPredicate::Is(status)),
    }
}
