use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::filter::FilteredRecordSet;
use crate::models::SprintSummary;
use crate::utils::ratio::percent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    TotalBugs,
    ResolvedBugs,
    PendingBugs,
    CriticalBugs,
    CriticalPending,
    ResolutionEfficiency,
    TestCasesPlanned,
    TestCasesExecuted,
    ExecutionRate,
    AutomationCoverage,
    ProductionBugs,
    LeakageRate,
    CycleTime,
}

impl MetricKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TotalBugs => "total_bugs",
            Self::ResolvedBugs => "resolved_bugs",
            Self::PendingBugs => "pending_bugs",
            Self::CriticalBugs => "critical_bugs",
            Self::CriticalPending => "critical_pending",
            Self::ResolutionEfficiency => "resolution_efficiency",
            Self::TestCasesPlanned => "test_cases_planned",
            Self::TestCasesExecuted => "test_cases_executed",
            Self::ExecutionRate => "execution_rate",
            Self::AutomationCoverage => "automation_coverage",
            Self::ProductionBugs => "production_bugs",
            Self::LeakageRate => "leakage_rate",
            Self::CycleTime => "cycle_time",
        }
    }

    /// Value of this metric for a single sprint.
    #[must_use]
    pub fn sprint_value(self, sprint: &SprintSummary) -> f64 {
        let count = match self {
            Self::TotalBugs => sprint.total_bugs,
            Self::ResolvedBugs => sprint.resolved_bugs,
            Self::PendingBugs => sprint.pending_bugs,
            Self::CriticalBugs => sprint.critical_bugs,
            Self::CriticalPending => sprint.critical_pending,
            Self::ResolutionEfficiency => {
                percent(sprint.resolved_bugs.min(sprint.total_bugs), sprint.total_bugs)
            }
            Self::TestCasesPlanned => sprint.test_cases_planned,
            Self::TestCasesExecuted => sprint.test_cases_executed,
            Self::ExecutionRate => {
                percent(sprint.test_cases_executed, sprint.test_cases_planned)
            }
            Self::AutomationCoverage => {
                percent(sprint.test_cases_automated, sprint.test_cases_executed)
            }
            Self::ProductionBugs => sprint.production_bugs,
            Self::LeakageRate => percent(sprint.production_bugs, sprint.total_bugs),
            Self::CycleTime => return sprint.avg_resolution_days.unwrap_or(0.0),
        };
        count as f64
    }
}

#[must_use]
pub const fn all_metric_keys() -> [MetricKey; 13] {
    [
        MetricKey::TotalBugs,
        MetricKey::ResolvedBugs,
        MetricKey::PendingBugs,
        MetricKey::CriticalBugs,
        MetricKey::CriticalPending,
        MetricKey::ResolutionEfficiency,
        MetricKey::TestCasesPlanned,
        MetricKey::TestCasesExecuted,
        MetricKey::ExecutionRate,
        MetricKey::AutomationCoverage,
        MetricKey::ProductionBugs,
        MetricKey::LeakageRate,
        MetricKey::CycleTime,
    ]
}

impl FromStr for MetricKey {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        let key = match normalized.as_str() {
            "defect_density" | "bugs" => Self::TotalBugs,
            "resolved" => Self::ResolvedBugs,
            "pending" => Self::PendingBugs,
            "critical" => Self::CriticalBugs,
            "efficiency" => Self::ResolutionEfficiency,
            "test_cases" => Self::TestCasesExecuted,
            "leakage" => Self::LeakageRate,
            "automation" => Self::AutomationCoverage,
            other => match all_metric_keys().into_iter().find(|key| key.as_str() == other) {
                Some(key) => key,
                None => bail!("unknown metric `{raw}`"),
            },
        };
        Ok(key)
    }
}

fn sprint_number_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(\d+)\s*$").expect("sprint number regex should compile"))
}

/// Trailing number of a sprint label: `Sprint 07` is 7, `Backlog` has none.
#[must_use]
pub fn sprint_number(label: &str) -> Option<u64> {
    sprint_number_regex()
        .captures(label)
        .and_then(|captures| captures.get(1))
        .and_then(|number| number.as_str().parse::<u64>().ok())
}

/// Numbered sprints ascending, unnumbered ones after them.
#[must_use]
pub fn compare_sprint_labels(left: &str, right: &str) -> Ordering {
    match (sprint_number(left), sprint_number(right)) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable: equal keys keep their input order.
pub fn sort_sprints(sprints: &mut [SprintSummary]) {
    sprints.sort_by(|left, right| compare_sprint_labels(&left.sprint_id, &right.sprint_id));
}

fn ordered_sprints(filtered: &FilteredRecordSet) -> Vec<&SprintSummary> {
    let mut ordered = filtered.sprints.iter().collect::<Vec<_>>();
    ordered.sort_by(|left, right| compare_sprint_labels(&left.sprint_id, &right.sprint_id));
    ordered
}

/// One value per sprint, in sprint order.
#[must_use]
pub fn build_series(filtered: &FilteredRecordSet, metric: MetricKey) -> Vec<f64> {
    ordered_sprints(filtered)
        .into_iter()
        .map(|sprint| metric.sprint_value(sprint))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub sprint: String,
    pub value: f64,
}

#[must_use]
pub fn build_labeled_series(filtered: &FilteredRecordSet, metric: MetricKey) -> Vec<SeriesPoint> {
    ordered_sprints(filtered)
        .into_iter()
        .map(|sprint| SeriesPoint {
            sprint: sprint.sprint_id.clone(),
            value: metric.sprint_value(sprint),
        })
        .collect()
}

/// Percent change of the second-half mean over the first-half mean.
///
/// The first half holds `len / 2` points. Fewer than two points, or a first
/// half averaging zero, give 0.
#[must_use]
pub fn calculate_trend(values: &[f64]) -> i64 {
    if values.len() < 2 {
        return 0;
    }

    let midpoint = values.len() / 2;
    let (first, second) = values.split_at(midpoint);
    let first_mean = mean(first);
    if first_mean == 0.0 || !first_mean.is_finite() {
        return 0;
    }

    let change = (mean(second) - first_mean) / first_mean * 100.0;
    if !change.is_finite() {
        return 0;
    }
    (change + 0.5).floor() as i64
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesReport {
    pub metric: MetricKey,
    pub points: Vec<SeriesPoint>,
    pub trend_pct: i64,
}

#[must_use]
pub fn build_series_report(filtered: &FilteredRecordSet, metric: MetricKey) -> SeriesReport {
    let points = build_labeled_series(filtered, metric);
    let values = points.iter().map(|point| point.value).collect::<Vec<_>>();
    SeriesReport {
        metric,
        trend_pct: calculate_trend(&values),
        points,
    }
}

/// Every metric's series, keyed by metric name.
#[must_use]
pub fn build_sparklines(filtered: &FilteredRecordSet) -> BTreeMap<&'static str, Vec<f64>> {
    all_metric_keys()
        .into_iter()
        .map(|metric| (metric.as_str(), build_series(filtered, metric)))
        .collect()
}
