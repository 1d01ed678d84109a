use serde::Serialize;

use crate::config::SubjectDirectory;
use crate::record::OpportunityRecord;

/// Whose opportunities a metric covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectFilter {
    /// Every record.
    #[default]
    All,
    /// Every record, presented as the team's performance.
    Team,
    /// Records assigned to one owner.
    Assignee(String),
}

impl SubjectFilter {
    /// `""`, `all` and `team` are pass-through filters; anything else is an
    /// assignee id.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "all" => SubjectFilter::All,
            "team" => SubjectFilter::Team,
            _ => SubjectFilter::Assignee(trimmed.to_string()),
        }
    }

    /// Build from dashboard parameters; a team flag overrides a designer id.
    pub fn from_params(designer: Option<&str>, team: bool) -> Self {
        if team {
            return SubjectFilter::Team;
        }
        match designer.map(str::trim).filter(|d| !d.is_empty()) {
            Some(id) => SubjectFilter::Assignee(id.to_string()),
            None => SubjectFilter::All,
        }
    }

    pub fn matches(&self, record: &OpportunityRecord) -> bool {
        match self {
            SubjectFilter::All | SubjectFilter::Team => true,
            SubjectFilter::Assignee(id) => record.assigned_to.as_deref() == Some(id.as_str()),
        }
    }

    /// Display name for dashboards, resolved through the injected directory.
    pub fn label(&self, directory: &SubjectDirectory) -> String {
        match self {
            SubjectFilter::All => "All Sales".to_string(),
            SubjectFilter::Team => "Team Performance".to_string(),
            SubjectFilter::Assignee(id) => directory
                .name_of(id)
                .unwrap_or("Unknown Designer")
                .to_string(),
        }
    }
}

/// Keep the records belonging to `subject`. Never looks at dates.
pub fn select_subject<'a, I>(records: I, subject: &SubjectFilter) -> Vec<&'a OpportunityRecord>
where
    I: IntoIterator<Item = &'a OpportunityRecord>,
{
    let selected: Vec<&OpportunityRecord> =
        records.into_iter().filter(|r| subject.matches(r)).collect();
    log::debug!("Subject {subject:?} kept {} records", selected.len());
    selected
}
