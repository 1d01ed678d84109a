use std::collections::HashMap;
use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Zone used for window boundaries when nothing else is configured.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Chicago;

/// Percent-of-goal thresholds for performance tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    /// At or above this percentage of goal is `excellent`.
    pub excellent_pct: f64,
    /// At or above this percentage of goal is `good`.
    pub good_pct: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            excellent_pct: 90.0,
            good_pct: 70.0,
        }
    }
}

/// Default sales goals used by `goal_progress` when a request names none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalDefaults {
    pub yearly: f64,
    pub monthly: f64,
}

impl Default for GoalDefaults {
    fn default() -> Self {
        Self {
            yearly: 800_000.0,
            monthly: 66_667.0,
        }
    }
}

/// Injected lookup of assignee id -> display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectDirectory(HashMap<String, String>);

impl SubjectDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.0.insert(id.into(), name.into());
    }

    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SubjectDirectory {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Configuration passed explicitly into every engine call.
///
/// Every field has a default, so a partial JSON document such as
/// `{"timezone": "America/New_York"}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// IANA zone name used to compute "now" and window boundaries.
    pub timezone: String,
    pub tiers: TierThresholds,
    pub goals: GoalDefaults,
    /// Contact tag marking a fulfilled job.
    pub completion_tag: String,
    pub subjects: SubjectDirectory,
    /// Rows kept in a breakdown's recent list.
    pub recent_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.name().to_string(),
            tiers: TierThresholds::default(),
            goals: GoalDefaults::default(),
            completion_tag: "job completed".to_string(),
            subjects: SubjectDirectory::default(),
            recent_limit: 20,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        log::debug!("Loaded engine config from {}", path.display());
        Self::from_json_str(&contents)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        let TierThresholds {
            excellent_pct,
            good_pct,
        } = self.tiers;
        if !excellent_pct.is_finite() || !good_pct.is_finite() || good_pct < 0.0 {
            return Err(Error::Config(format!(
                "tier thresholds must be finite and non-negative (excellent {excellent_pct}, good {good_pct})"
            )));
        }
        if good_pct > excellent_pct {
            return Err(Error::Config(format!(
                "good threshold {good_pct} exceeds excellent threshold {excellent_pct}"
            )));
        }
        for (name, goal) in [("yearly", self.goals.yearly), ("monthly", self.goals.monthly)] {
            if !(goal.is_finite() && goal > 0.0) {
                return Err(Error::Config(format!(
                    "default {name} goal must be positive, got {goal}"
                )));
            }
        }
        if self.completion_tag.trim().is_empty() {
            return Err(Error::Config("completion tag must not be empty".into()));
        }
        Ok(())
    }

    /// The configured reference zone.
    pub fn tz(&self) -> Result<Tz> {
        parse_timezone(&self.timezone)
    }
}

/// Parse an IANA zone name such as `America/Chicago`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| Error::Config(format!("unknown timezone: {name}")))
}
