pub mod breakdown;
pub mod report;
pub mod types;

pub use breakdown::{breakdown, Breakdown, OpportunityRow, PipelineCount, StatusCount};
pub use report::{progress_report, ProgressReport};
pub use types::*;

use chrono::{DateTime, TimeZone};

use crate::config::{EngineConfig, TierThresholds};
use crate::error::{Error, Result};
use crate::query::{select_subject, select_window};
use crate::record::OpportunityRecord;

/// Classify a percentage of goal into a tier. Thresholds are inclusive.
pub fn classify_tier(percent_of_goal: f64, thresholds: &TierThresholds) -> PerformanceTier {
    if percent_of_goal >= thresholds.excellent_pct {
        PerformanceTier::Excellent
    } else if percent_of_goal >= thresholds.good_pct {
        PerformanceTier::Good
    } else {
        PerformanceTier::NeedsImprovement
    }
}

/// Aggregate an already-filtered subset into a single metric.
///
/// Empty subsets produce zeroed values, never NaN. Fails only when `kind`
/// requires a goal and `goal` is absent, non-positive, or not finite.
pub fn aggregate(
    subset: &[&OpportunityRecord],
    kind: MetricKind,
    goal: Option<f64>,
    config: &EngineConfig,
) -> Result<AggregateResult> {
    let positive_goal = goal.filter(|g| g.is_finite() && *g > 0.0);
    if kind.requires_goal() && positive_goal.is_none() {
        return Err(Error::InvalidSpecification(format!(
            "{kind} requires a positive goal, got {goal:?}"
        )));
    }

    let count = subset.len();
    let total: f64 = subset.iter().map(|r| non_negative(r.monetary_value)).sum();

    let (value, auxiliary) = match kind {
        MetricKind::TotalSales => (total, Auxiliary::SampleSize { sample_size: count }),
        MetricKind::AverageSale => (
            ratio(total, count as f64),
            Auxiliary::SampleSize { sample_size: count },
        ),
        MetricKind::UnitCount | MetricKind::LeadCount => (count as f64, Auxiliary::Empty),
        MetricKind::CompletionRate => {
            let completed = subset
                .iter()
                .filter(|r| r.has_tag(&config.completion_tag))
                .count();
            (
                ratio(completed as f64 * 100.0, count as f64),
                Auxiliary::Completion {
                    completed,
                    subset_count: count,
                },
            )
        }
        MetricKind::GoalProgress => {
            let goal = positive_goal.unwrap_or_default();
            let pct = ratio(total * 100.0, goal);
            (
                pct,
                Auxiliary::Progress {
                    actual: total,
                    goal,
                    remaining: (goal - total).max(0.0),
                    display_percentage: pct.min(100.0),
                },
            )
        }
    };

    let performance_tier = positive_goal.map(|g| {
        let pct = match kind {
            MetricKind::GoalProgress => value,
            _ => ratio(value * 100.0, g),
        };
        classify_tier(pct, &config.tiers)
    });

    Ok(AggregateResult {
        kind,
        value,
        format: kind.format(),
        label: kind.label().to_string(),
        goal,
        sample_size: count,
        auxiliary,
        performance_tier,
    })
}

/// The goal a spec is measured against: its own, else the configured
/// default for its window when the kind requires one.
pub fn resolve_goal(spec: &MetricSpec, config: &EngineConfig) -> Result<Option<f64>> {
    if spec.goal.is_some() || !spec.kind.requires_goal() {
        return Ok(spec.goal);
    }
    if spec.window.is_yearly() {
        Ok(Some(config.goals.yearly))
    } else if spec.window.is_monthly() {
        Ok(Some(config.goals.monthly))
    } else {
        Err(Error::InvalidSpecification(format!(
            "{} over {} needs an explicit goal",
            spec.kind, spec.window
        )))
    }
}

/// Run one metric end to end: subject filter, then window filter, then
/// aggregation, with boundaries computed from `now` in the spec's zone
/// (or the configured one).
pub fn compute_metric<Z: TimeZone>(
    records: &[OpportunityRecord],
    spec: &MetricSpec,
    config: &EngineConfig,
    now: &DateTime<Z>,
) -> Result<AggregateResult> {
    let tz = match spec.timezone {
        Some(tz) => tz,
        None => config.tz()?,
    };
    let reference = now.with_timezone(&tz);
    let goal = resolve_goal(spec, config)?;

    let by_subject = select_subject(records, &spec.subject);
    let subset = select_window(by_subject, &spec.window_filter(), &reference);

    let mut result = aggregate(&subset, spec.kind, goal, config)?;
    result.label = format!("{} ({})", spec.kind.label(), spec.window.label());
    log::debug!(
        "{} for {:?} over {}: {} from {} records",
        spec.kind,
        spec.subject,
        spec.window,
        result.value,
        result.sample_size
    );
    Ok(result)
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{SubjectFilter, Window};
    use crate::record::normalize;
    use chrono::Utc;
    use chrono_tz::America::Chicago;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn now() -> DateTime<chrono_tz::Tz> {
        Chicago.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn won(value: f64, changed: &str) -> OpportunityRecord {
        normalize(&json!({"status": "won", "monetaryValue": value, "lastStatusChangeAt": changed}))
    }

    fn refs(records: &[OpportunityRecord]) -> Vec<&OpportunityRecord> {
        records.iter().collect()
    }

    #[test]
    fn test_empty_subset_is_zeroed() {
        for kind in [
            MetricKind::TotalSales,
            MetricKind::AverageSale,
            MetricKind::UnitCount,
            MetricKind::LeadCount,
            MetricKind::CompletionRate,
        ] {
            let result = aggregate(&[], kind, None, &config()).unwrap();
            assert_eq!(result.value, 0.0, "{kind}");
            assert!(!result.value.is_nan());
            assert_eq!(result.sample_size, 0);
            assert!(result.performance_tier.is_none());
        }
    }

    #[test]
    fn test_empty_completion_rate_auxiliary() {
        let result = aggregate(&[], MetricKind::CompletionRate, None, &config()).unwrap();
        assert_eq!(
            result.auxiliary,
            Auxiliary::Completion {
                completed: 0,
                subset_count: 0
            }
        );
    }

    #[test]
    fn test_total_and_average() {
        let records = vec![
            won(1000.0, "2025-01-05T00:00:00Z"),
            won(3000.0, "2025-02-05T00:00:00Z"),
        ];
        let total = aggregate(&refs(&records), MetricKind::TotalSales, None, &config()).unwrap();
        assert_eq!(total.value, 4000.0);
        assert_eq!(total.format, MetricFormat::Currency);
        assert_eq!(total.auxiliary, Auxiliary::SampleSize { sample_size: 2 });

        let avg = aggregate(&refs(&records), MetricKind::AverageSale, None, &config()).unwrap();
        assert_eq!(avg.value, 2000.0);
    }

    #[test]
    fn test_negative_values_clamped_in_aggregation() {
        let mut rec = won(0.0, "2025-01-05T00:00:00Z");
        rec.monetary_value = -500.0;
        let mut nan = won(0.0, "2025-01-05T00:00:00Z");
        nan.monetary_value = f64::NAN;
        let records = vec![rec, nan, won(100.0, "2025-01-05T00:00:00Z")];
        let total = aggregate(&refs(&records), MetricKind::TotalSales, None, &config()).unwrap();
        assert_eq!(total.value, 100.0);
    }

    #[test]
    fn test_completion_rate() {
        let records = vec![
            normalize(&json!({"status": "won", "contact": {"tags": ["job completed"]}})),
            normalize(&json!({"status": "won", "contact": {"tags": ["Job Completed", "vip"]}})),
            normalize(&json!({"status": "won", "contact": {"tags": ["vip"]}})),
            normalize(&json!({"status": "won"})),
        ];
        let result =
            aggregate(&refs(&records), MetricKind::CompletionRate, None, &config()).unwrap();
        assert_eq!(result.value, 50.0);
        assert_eq!(
            result.auxiliary,
            Auxiliary::Completion {
                completed: 2,
                subset_count: 4
            }
        );
    }

    #[test]
    fn test_completion_tag_is_configurable() {
        let records = vec![normalize(&json!({"tags": ["dig complete"]}))];
        let mut cfg = config();
        cfg.completion_tag = "dig complete".into();
        let result = aggregate(&refs(&records), MetricKind::CompletionRate, None, &cfg).unwrap();
        assert_eq!(result.value, 100.0);
    }

    #[test]
    fn test_goal_progress_half_way() {
        let records = vec![
            won(250_000.0, "2025-02-01T00:00:00Z"),
            won(150_000.0, "2025-03-01T00:00:00Z"),
        ];
        let result = aggregate(
            &refs(&records),
            MetricKind::GoalProgress,
            Some(800_000.0),
            &config(),
        )
        .unwrap();
        assert_eq!(result.value, 50.0);
        assert_eq!(result.performance_tier, Some(PerformanceTier::NeedsImprovement));
        assert_eq!(
            result.auxiliary,
            Auxiliary::Progress {
                actual: 400_000.0,
                goal: 800_000.0,
                remaining: 400_000.0,
                display_percentage: 50.0,
            }
        );
        assert_eq!(result.display(), "50.0%");
    }

    #[test]
    fn test_goal_progress_over_goal() {
        let records = vec![won(1_000.0, "2025-02-01T00:00:00Z")];
        let result =
            aggregate(&refs(&records), MetricKind::GoalProgress, Some(800.0), &config()).unwrap();
        assert_eq!(result.value, 125.0);
        assert_eq!(result.performance_tier, Some(PerformanceTier::Excellent));
        match result.auxiliary {
            Auxiliary::Progress {
                remaining,
                display_percentage,
                ..
            } => {
                assert_eq!(remaining, 0.0);
                assert_eq!(display_percentage, 100.0);
            }
            other => panic!("expected Progress, got {other:?}"),
        }
    }

    #[test]
    fn test_goal_progress_tier_boundaries() {
        let cases = [
            (720_000.0, PerformanceTier::Excellent),
            (560_000.0, PerformanceTier::Good),
            (559_920.0, PerformanceTier::NeedsImprovement),
        ];
        for (actual, tier) in cases {
            let records = vec![won(actual, "2025-02-01T00:00:00Z")];
            let result = aggregate(
                &refs(&records),
                MetricKind::GoalProgress,
                Some(800_000.0),
                &config(),
            )
            .unwrap();
            assert_eq!(result.performance_tier, Some(tier), "actual {actual}");
        }
    }

    #[test]
    fn test_classify_tier_thresholds() {
        let t = TierThresholds::default();
        assert_eq!(classify_tier(90.0, &t), PerformanceTier::Excellent);
        assert_eq!(classify_tier(89.99, &t), PerformanceTier::Good);
        assert_eq!(classify_tier(70.0, &t), PerformanceTier::Good);
        assert_eq!(classify_tier(69.99, &t), PerformanceTier::NeedsImprovement);
        assert_eq!(classify_tier(0.0, &t), PerformanceTier::NeedsImprovement);
    }

    #[test]
    fn test_goal_progress_requires_positive_goal() {
        for goal in [None, Some(0.0), Some(-10.0), Some(f64::NAN)] {
            assert!(matches!(
                aggregate(&[], MetricKind::GoalProgress, goal, &config()),
                Err(Error::InvalidSpecification(_))
            ));
        }
    }

    #[test]
    fn test_tier_for_other_kinds_with_goal() {
        let records = vec![won(45_000.0, "2025-02-01T00:00:00Z")];
        let result = aggregate(
            &refs(&records),
            MetricKind::TotalSales,
            Some(50_000.0),
            &config(),
        )
        .unwrap();
        assert_eq!(result.goal, Some(50_000.0));
        assert_eq!(result.performance_tier, Some(PerformanceTier::Excellent));

        let result =
            aggregate(&refs(&records), MetricKind::UnitCount, Some(0.0), &config()).unwrap();
        assert!(result.performance_tier.is_none());
    }

    #[test]
    fn test_scenario_total_sales_ytd() {
        let records = vec![
            won(1000.0, "2025-01-05T12:00:00Z"),
            normalize(&json!({"status": "open", "monetaryValue": 500})),
        ];
        let spec = MetricSpec::new(MetricKind::TotalSales, Window::YearToDate);
        let result = compute_metric(&records, &spec, &config(), &now()).unwrap();
        assert_eq!(result.value, 1000.0);
        assert_eq!(result.sample_size, 1);
        assert_eq!(result.label, "Total Sales (Year to Date)");
    }

    #[test]
    fn test_scenario_empty_completion_rate() {
        for window in [Window::YearToDate, Window::MonthToDate, Window::AllTime] {
            let spec = MetricSpec::new(MetricKind::CompletionRate, window);
            let result = compute_metric(&[], &spec, &config(), &now()).unwrap();
            assert_eq!(result.value, 0.0);
            assert_eq!(
                result.auxiliary,
                Auxiliary::Completion {
                    completed: 0,
                    subset_count: 0
                }
            );
        }
    }

    #[test]
    fn test_goal_defaults_from_config() {
        let records = vec![won(33_333.5, "2025-06-02T00:00:00Z")];
        let spec = MetricSpec::new(MetricKind::GoalProgress, Window::MonthToDate);
        let result = compute_metric(&records, &spec, &config(), &now()).unwrap();
        assert_eq!(result.goal, Some(66_667.0));
        assert_eq!(result.value, 50.0);

        let spec = MetricSpec::new(MetricKind::GoalProgress, Window::YearToDate);
        let result = compute_metric(&records, &spec, &config(), &now()).unwrap();
        assert_eq!(result.goal, Some(800_000.0));

        let spec = MetricSpec::new(MetricKind::GoalProgress, Window::AllTime);
        assert!(matches!(
            compute_metric(&records, &spec, &config(), &now()),
            Err(Error::InvalidSpecification(_))
        ));
    }

    #[test]
    fn test_subject_applied_before_window() {
        let records = vec![
            normalize(&json!({"status": "won", "monetaryValue": 10, "assignedTo": "a",
                              "lastStatusChangeAt": "2025-06-01T12:00:00Z"})),
            normalize(&json!({"status": "won", "monetaryValue": 20, "assignedTo": "b",
                              "lastStatusChangeAt": "2025-06-01T12:00:00Z"})),
        ];
        let spec = MetricSpec::new(MetricKind::TotalSales, Window::MonthToDate)
            .with_subject(SubjectFilter::Assignee("b".into()));
        let result = compute_metric(&records, &spec, &config(), &now()).unwrap();
        assert_eq!(result.value, 20.0);
    }

    #[test]
    fn test_lead_count_uses_creation_date() {
        let records = vec![
            normalize(&json!({"status": "open", "createdAt": "2025-06-10T00:00:00Z"})),
            normalize(&json!({"status": "won", "createdAt": "2025-06-11T00:00:00Z",
                              "lastStatusChangeAt": "2025-01-01T12:00:00Z"})),
            normalize(&json!({"status": "lost", "createdAt": "2024-12-31T00:00:00Z"})),
            normalize(&json!({"status": "open"})),
        ];
        let mtd = MetricSpec::new(MetricKind::LeadCount, Window::MonthToDate);
        assert_eq!(compute_metric(&records, &mtd, &config(), &now()).unwrap().value, 2.0);
        let all = MetricSpec::new(MetricKind::LeadCount, Window::AllTime);
        assert_eq!(compute_metric(&records, &all, &config(), &now()).unwrap().value, 4.0);
    }

    #[test]
    fn test_timezone_shifts_boundaries() {
        // 2025-01-01T03:00Z is still Dec 31 in Chicago but Jan 1 in UTC.
        let records = vec![won(100.0, "2025-01-01T03:00:00Z")];
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let spec = MetricSpec::new(MetricKind::TotalSales, Window::YearToDate);
        let chicago = compute_metric(&records, &spec, &config(), &now).unwrap();
        assert_eq!(chicago.value, 0.0);

        let utc_spec = spec.with_timezone(chrono_tz::UTC);
        let utc = compute_metric(&records, &utc_spec, &config(), &now).unwrap();
        assert_eq!(utc.value, 100.0);
    }

    #[test]
    fn test_idempotent() {
        let records = vec![
            won(1000.0, "2025-01-05T00:00:00Z"),
            won(2500.0, "2025-06-05T00:00:00Z"),
        ];
        let spec = MetricSpec::new(MetricKind::GoalProgress, Window::YearToDate).with_goal(10_000.0);
        let a = compute_metric(&records, &spec, &config(), &now()).unwrap();
        let b = compute_metric(&records, &spec, &config(), &now()).unwrap();
        assert_eq!(a, b);
    }

    fn arb_record() -> impl Strategy<Value = Value> {
        (
            prop_oneof![Just("won"), Just("WON"), Just("Won"), Just("open"), Just("lost")],
            0u32..100_000,
            prop::option::of(0i64..(400 * 86_400_000)),
            prop_oneof![Just("a"), Just("b"), Just("c")],
        )
            .prop_map(|(status, value, offset_ms, owner)| {
                // Dates spread from 2024-06-01 through mid 2025.
                let base = 1_717_200_000_000i64;
                let mut v = json!({
                    "status": status,
                    "monetaryValue": value,
                    "assignedTo": owner,
                });
                if let Some(off) = offset_ms {
                    v["lastStatusChangeAt"] = json!(base + off);
                    v["createdAt"] = json!(base + off);
                }
                v
            })
    }

    proptest! {
        /// Property: MTD ⊆ YTD ⊆ all-time for any subject and date spread.
        #[test]
        fn window_monotonicity(raw in prop::collection::vec(arb_record(), 0..40)) {
            let records: Vec<OpportunityRecord> = raw.iter().map(normalize).collect();
            let now = now();
            for kind in [MetricKind::UnitCount, MetricKind::LeadCount] {
                let count = |w| {
                    compute_metric(&records, &MetricSpec::new(kind, w), &config(), &now)
                        .unwrap()
                        .sample_size
                };
                let mtd = count(Window::MonthToDate);
                let ytd = count(Window::YearToDate);
                let all = count(Window::AllTime);
                prop_assert!(mtd <= ytd && ytd <= all, "{mtd} {ytd} {all}");
            }

            let filter = MetricKind::UnitCount.default_filter(Window::MonthToDate);
            let ytd_filter = MetricKind::UnitCount.default_filter(Window::YearToDate);
            let mtd = select_window(&records, &filter, &now);
            let ytd = select_window(&records, &ytd_filter, &now);
            for r in &mtd {
                prop_assert!(ytd.iter().any(|y| std::ptr::eq(*y, *r)));
            }
        }

        /// Property: filtering by an id never keeps another owner's record,
        /// and "all" never drops anything.
        #[test]
        fn subject_filter_correctness(raw in prop::collection::vec(arb_record(), 0..40)) {
            let records: Vec<OpportunityRecord> = raw.iter().map(normalize).collect();
            let kept = select_subject(&records, &SubjectFilter::Assignee("a".into()));
            prop_assert!(kept.iter().all(|r| r.assigned_to.as_deref() == Some("a")));
            let expected = records.iter().filter(|r| r.assigned_to.as_deref() == Some("a")).count();
            prop_assert_eq!(kept.len(), expected);
            prop_assert_eq!(select_subject(&records, &SubjectFilter::All).len(), records.len());
        }

        /// Property: aggregation is a pure function of its inputs.
        #[test]
        fn aggregate_is_idempotent(raw in prop::collection::vec(arb_record(), 0..40)) {
            let records: Vec<OpportunityRecord> = raw.iter().map(normalize).collect();
            let subset: Vec<&OpportunityRecord> = records.iter().collect();
            for kind in MetricKind::ALL {
                let first = aggregate(&subset, kind, Some(50_000.0), &config()).unwrap();
                let second = aggregate(&subset, kind, Some(50_000.0), &config()).unwrap();
                prop_assert_eq!(first, second);
            }
        }
    }
}
