use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::date_util::{last_day_of_month, start_of_day, start_of_month, start_of_year};
use crate::error::{Error, Result};
use crate::record::{OpportunityRecord, Status};

static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})$").unwrap());
static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());

/// A time window that bounds period-based metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    /// Jan 1 of the reference year through the reference instant.
    YearToDate,
    /// The 1st of the reference month through the reference instant.
    MonthToDate,
    AllTime,
    /// A whole calendar year.
    Year(i32),
    /// A whole calendar month.
    Month(i32, u8),
}

impl Window {
    /// Parse a window key.
    ///
    /// Supported formats (case-insensitive):
    /// - `year_to_date`, `ytd`
    /// - `month_to_date`, `mtd`, `current_month`
    /// - `all_time`, `all`
    /// - `2025` for a calendar year
    /// - `2025-03` for a calendar month
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "year_to_date" | "ytd" => return Ok(Window::YearToDate),
            "month_to_date" | "mtd" | "current_month" => return Ok(Window::MonthToDate),
            "all_time" | "all" => return Ok(Window::AllTime),
            _ => {}
        }

        if let Some(caps) = RE_YEAR.captures(&s) {
            let year: i32 = caps[1]
                .parse()
                .map_err(|_| Error::InvalidSpecification(format!("invalid year: {s}")))?;
            return Ok(Window::Year(year));
        }

        if let Some(caps) = RE_MONTH.captures(&s) {
            let year: i32 = caps[1]
                .parse()
                .map_err(|_| Error::InvalidSpecification(format!("invalid year: {s}")))?;
            let month: u8 = caps[2]
                .parse()
                .map_err(|_| Error::InvalidSpecification(format!("invalid month: {s}")))?;
            if (1..=12).contains(&month) {
                return Ok(Window::Month(year, month));
            }
        }

        Err(Error::InvalidSpecification(format!("unrecognized window: {s}")))
    }

    /// Canonical key string.
    pub fn to_key(&self) -> String {
        match self {
            Window::YearToDate => "year_to_date".to_string(),
            Window::MonthToDate => "month_to_date".to_string(),
            Window::AllTime => "all_time".to_string(),
            Window::Year(y) => format!("{y}"),
            Window::Month(y, m) => format!("{y}-{m:02}"),
        }
    }

    /// Human-readable label, e.g. `Year to Date` or `March 2025`.
    pub fn label(&self) -> String {
        match self {
            Window::YearToDate => "Year to Date".to_string(),
            Window::MonthToDate => "Month to Date".to_string(),
            Window::AllTime => "All Time".to_string(),
            Window::Year(y) => format!("{y}"),
            Window::Month(y, m) => NaiveDate::from_ymd_opt(*y, *m as u32, 1)
                .map(|d| d.format("%B %Y").to_string())
                .unwrap_or_else(|| self.to_key()),
        }
    }

    /// True for windows whose natural goal is yearly.
    pub fn is_yearly(&self) -> bool {
        matches!(self, Window::YearToDate | Window::Year(_))
    }

    /// True for windows whose natural goal is monthly.
    pub fn is_monthly(&self) -> bool {
        matches!(self, Window::MonthToDate | Window::Month(..))
    }

    /// Inclusive instant range for this window relative to `now`, or `None`
    /// for `AllTime`. All boundaries are local midnights in `now`'s zone.
    pub fn date_range<Z: TimeZone>(&self, now: &DateTime<Z>) -> Option<DateRange> {
        let utc = |dt: DateTime<Z>| dt.with_timezone(&Utc);
        match self {
            Window::AllTime => None,
            Window::YearToDate => Some(DateRange {
                start: utc(start_of_year(now)),
                end: now.with_timezone(&Utc),
            }),
            Window::MonthToDate => Some(DateRange {
                start: utc(start_of_month(now)),
                end: now.with_timezone(&Utc),
            }),
            Window::Year(y) => {
                let tz = now.timezone();
                let bounds = NaiveDate::from_ymd_opt(*y, 1, 1)
                    .zip(y.checked_add(1).and_then(|n| NaiveDate::from_ymd_opt(n, 1, 1)));
                Some(match bounds {
                    Some((first, next)) => DateRange::half_open(
                        utc(start_of_day(&tz, first)),
                        utc(start_of_day(&tz, next)),
                    ),
                    None => DateRange::EMPTY,
                })
            }
            Window::Month(y, m) => {
                let tz = now.timezone();
                let first = NaiveDate::from_ymd_opt(*y, *m as u32, 1);
                let next = last_day_of_month(*y, *m as u32).map(|d| d + Duration::days(1));
                Some(match first.zip(next) {
                    Some((first, next)) => DateRange::half_open(
                        utc(start_of_day(&tz, first)),
                        utc(start_of_day(&tz, next)),
                    ),
                    None => {
                        log::warn!("Window {self:?} is not a calendar month; it matches nothing");
                        DateRange::EMPTY
                    }
                })
            }
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

impl Serialize for Window {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_key())
    }
}

/// An inclusive instant range [start, end].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// A range containing nothing.
    pub const EMPTY: DateRange = DateRange {
        start: DateTime::<Utc>::MAX_UTC,
        end: DateTime::<Utc>::MIN_UTC,
    };

    fn half_open(start: DateTime<Utc>, end_exclusive: DateTime<Utc>) -> Self {
        Self {
            start,
            end: end_exclusive - Duration::nanoseconds(1),
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Which record timestamp a window is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    /// When the deal last changed status; the authoritative "won" date.
    StatusChange,
    Created,
    Updated,
}

impl DateField {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "status_change" | "last_status_change_at" => Ok(DateField::StatusChange),
            "created" | "created_at" => Ok(DateField::Created),
            "updated" | "updated_at" => Ok(DateField::Updated),
            other => Err(Error::InvalidSpecification(format!(
                "unrecognized date field: {other}"
            ))),
        }
    }
}

/// Window plus the date field and status predicate it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFilter {
    pub window: Window,
    pub date_field: DateField,
    /// Keep only records with this status, when set.
    pub status: Option<Status>,
}

impl WindowFilter {
    /// Won deals dated by their status change.
    pub fn won(window: Window) -> Self {
        Self {
            window,
            date_field: DateField::StatusChange,
            status: Some(Status::Won),
        }
    }

    /// Any status, dated by creation.
    pub fn created(window: Window) -> Self {
        Self {
            window,
            date_field: DateField::Created,
            status: None,
        }
    }
}

/// Keep the records that satisfy `filter` relative to `now`.
///
/// Records without a usable date are dropped by every bounded window but
/// kept by `AllTime`.
pub fn select_window<'a, I, Z>(
    records: I,
    filter: &WindowFilter,
    now: &DateTime<Z>,
) -> Vec<&'a OpportunityRecord>
where
    I: IntoIterator<Item = &'a OpportunityRecord>,
    Z: TimeZone,
{
    let range = filter.window.date_range(now);
    let selected: Vec<&OpportunityRecord> = records
        .into_iter()
        .filter(|r| filter.status.is_none_or(|s| r.status == s))
        .filter(|r| match &range {
            None => true,
            Some(range) => r
                .authoritative_date(filter.date_field)
                .is_some_and(|d| range.contains(d)),
        })
        .collect();
    log::debug!(
        "Window {} on {:?} (status {:?}) kept {} records",
        filter.window,
        filter.date_field,
        filter.status,
        selected.len()
    );
    selected
}
