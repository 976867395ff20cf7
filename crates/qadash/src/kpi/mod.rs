use std::collections::BTreeMap;

use serde::Serialize;

use crate::filter::FilteredRecordSet;
use crate::models::{SprintSummary, millis_per_day};
use crate::utils::ratio::{percent, round_tenths, rounded_div, tenths};

/// Upper bound applied to execution rate for display.
pub const DISPLAY_RATE_CAP: u64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DefectDensity {
    /// Bugs per sprint, one decimal.
    pub avg: f64,
    pub total: u64,
    pub max: u64,
    pub min: u64,
    pub sprints: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTimeSource {
    BugDates,
    SprintAverages,
    #[default]
    Unavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleTime {
    pub avg_days: f64,
    pub by_priority: BTreeMap<String, f64>,
    pub samples: u64,
    pub source: CycleTimeSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiSet {
    pub sprint_count: u64,
    pub total_bugs: u64,
    pub resolved_bugs: u64,
    pub pending_bugs: u64,
    pub critical_bugs: u64,
    pub critical_pending: u64,
    pub production_bugs: u64,
    pub test_cases_planned: u64,
    pub test_cases_executed: u64,
    pub test_cases_automated: u64,
    pub resolution_efficiency: u64,
    pub critical_bugs_ratio: u64,
    pub test_execution_rate: u64,
    pub display_execution_rate: u64,
    pub leakage_rate: u64,
    pub avg_test_cases_per_sprint: u64,
    pub automation_coverage: u64,
    pub defect_density: DefectDensity,
    pub cycle_time: CycleTime,
}

/// Aggregates one filtered view. Pure: same input, same output.
#[must_use]
pub fn compute_kpis(filtered: &FilteredRecordSet) -> KpiSet {
    let sprints = &filtered.sprints;
    let sprint_count = sprints.len() as u64;

    let sum = |field: fn(&SprintSummary) -> u64| -> u64 {
        sprints.iter().map(field).fold(0u64, u64::saturating_add)
    };

    let total_bugs = sum(|sprint| sprint.total_bugs);
    let resolved_bugs = sum(|sprint| sprint.resolved_bugs);
    let pending_bugs = sum(|sprint| sprint.pending_bugs);
    let critical_bugs = sum(|sprint| sprint.critical_bugs);
    let critical_pending = sum(|sprint| sprint.critical_pending);
    let production_bugs = sum(|sprint| sprint.production_bugs);
    let test_cases_planned = sum(|sprint| sprint.test_cases_planned);
    let test_cases_executed = sum(|sprint| sprint.test_cases_executed);
    let test_cases_automated = sum(|sprint| sprint.test_cases_automated);

    let test_execution_rate = percent(test_cases_executed, test_cases_planned);

    KpiSet {
        sprint_count,
        total_bugs,
        resolved_bugs,
        pending_bugs,
        critical_bugs,
        critical_pending,
        production_bugs,
        test_cases_planned,
        test_cases_executed,
        test_cases_automated,
        resolution_efficiency: percent(resolved_bugs.min(total_bugs), total_bugs),
        critical_bugs_ratio: percent(critical_pending, total_bugs),
        test_execution_rate,
        display_execution_rate: test_execution_rate.min(DISPLAY_RATE_CAP),
        leakage_rate: percent(production_bugs, total_bugs),
        avg_test_cases_per_sprint: rounded_div(test_cases_executed, sprint_count),
        automation_coverage: percent(test_cases_automated, test_cases_executed),
        defect_density: defect_density(filtered, total_bugs),
        cycle_time: cycle_time(filtered),
    }
}

fn defect_density(filtered: &FilteredRecordSet, total_bugs: u64) -> DefectDensity {
    let per_sprint = filtered.sprints.iter().map(|sprint| sprint.total_bugs);
    DefectDensity {
        avg: tenths(total_bugs, filtered.sprints.len() as u64),
        total: total_bugs,
        max: per_sprint.clone().max().unwrap_or(0),
        min: per_sprint.min().unwrap_or(0),
        sprints: filtered.sprints.len() as u64,
    }
}

/// Bug dates win; sprint-reported averages are the fallback.
fn cycle_time(filtered: &FilteredRecordSet) -> CycleTime {
    let mut total_ms = 0u64;
    let mut samples = 0u64;
    let mut by_priority = BTreeMap::<String, (u64, u64)>::new();

    for bug in &filtered.bugs {
        if !bug.is_defect() || !bug.is_resolved() {
            continue;
        }
        let Some(resolution_ms) = bug.resolution_ms() else {
            continue;
        };
        total_ms = total_ms.saturating_add(resolution_ms);
        samples += 1;

        let bucket = by_priority
            .entry(bug.priority_class().as_str().to_string())
            .or_default();
        bucket.0 = bucket.0.saturating_add(resolution_ms);
        bucket.1 += 1;
    }

    if samples > 0 {
        return CycleTime {
            avg_days: tenths(total_ms, samples.saturating_mul(millis_per_day())),
            by_priority: by_priority
                .into_iter()
                .map(|(priority, (ms, count))| {
                    (priority, tenths(ms, count.saturating_mul(millis_per_day())))
                })
                .collect(),
            samples,
            source: CycleTimeSource::BugDates,
        };
    }

    let reported = filtered
        .sprints
        .iter()
        .filter_map(|sprint| sprint.avg_resolution_days)
        .collect::<Vec<_>>();
    if reported.is_empty() {
        return CycleTime::default();
    }

    CycleTime {
        avg_days: round_tenths(reported.iter().sum::<f64>() / reported.len() as f64),
        by_priority: BTreeMap::new(),
        samples: reported.len() as u64,
        source: CycleTimeSource::SprintAverages,
    }
}
