pub mod envelope;
pub mod normalize;

pub use envelope::{decode_payload, decode_value};
pub use normalize::{normalize, normalize_all};

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::query::window::DateField;

/// Lifecycle status of an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    Won,
    Lost,
    Abandoned,
    Unknown,
}

impl Status {
    /// Case-insensitive parse; anything unrecognized is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "open" => Status::Open,
            "won" => Status::Won,
            "lost" => Status::Lost,
            "abandoned" => Status::Abandoned,
            _ => Status::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::Won => "won",
            Status::Lost => "lost",
            Status::Abandoned => "abandoned",
            Status::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contact attached to an opportunity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub tags: BTreeSet<String>,
}

/// Canonical opportunity record produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityRecord {
    pub id: String,
    pub name: String,
    /// Never negative, never NaN.
    pub monetary_value: f64,
    pub status: Status,
    pub pipeline_id: Option<String>,
    pub assigned_to: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_status_change_at: Option<DateTime<Utc>>,
    pub contact: Option<Contact>,
}

impl OpportunityRecord {
    /// The date a window filter should use for this record, following the
    /// fallback chain for `field`.
    pub fn authoritative_date(&self, field: DateField) -> Option<DateTime<Utc>> {
        match field {
            DateField::StatusChange => self
                .last_status_change_at
                .or(self.updated_at)
                .or(self.created_at),
            DateField::Created => self.created_at.or(self.updated_at),
            DateField::Updated => self.updated_at.or(self.created_at),
        }
    }

    /// True if any timestamp field is present.
    pub fn is_dated(&self) -> bool {
        self.created_at.is_some() || self.updated_at.is_some() || self.last_status_change_at.is_some()
    }

    /// Case-insensitive contact tag check.
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim();
        self.contact
            .as_ref()
            .is_some_and(|c| c.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
    }

    pub fn contact_name(&self) -> Option<&str> {
        self.contact.as_ref().and_then(|c| c.name.as_deref())
    }
}
