use std::collections::BTreeMap;

use serde::Serialize;

use crate::filter::{FilterState, FilteredRecordSet};
use crate::models::{
    BugRecord, Breakdowns, DeveloperRollup, GroupRollup, PriorityRollup, RecordSet, Workload,
    normalize_label,
};
use crate::series::compare_sprint_labels;
use crate::utils::ratio::percent;

pub const UNASSIGNED: &str = "Unassigned";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownSource {
    /// Recomputed from filtered bug rows.
    Derived,
    /// Carried over from the snapshot because no bug rows exist.
    Reported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakdownReport {
    pub source: BreakdownSource,

    #[serde(flatten)]
    pub breakdowns: Breakdowns,
}

pub fn build_breakdown(
    records: &RecordSet,
    filtered: &FilteredRecordSet,
    filter: &FilterState,
) -> BreakdownReport {
    if records.bugs.is_empty() && filter.is_identity() && !records.reported.is_empty() {
        return BreakdownReport {
            source: BreakdownSource::Reported,
            breakdowns: records.reported.clone(),
        };
    }

    let defects = filtered
        .bugs
        .iter()
        .filter(|bug| bug.is_defect())
        .collect::<Vec<_>>();

    BreakdownReport {
        source: BreakdownSource::Derived,
        breakdowns: Breakdowns {
            by_priority: priority_rollups(&defects),
            by_module: group_rollups(&defects, |bug| &bug.module),
            by_category: group_rollups(&defects, |bug| &bug.category),
            developers: developer_rollups(&defects),
        },
    }
}

fn priority_rollups(defects: &[&BugRecord]) -> BTreeMap<String, PriorityRollup> {
    let mut labels = BTreeMap::<String, String>::new();
    let mut rollups = BTreeMap::<String, PriorityRollup>::new();

    for bug in defects {
        let key = normalize_label(&bug.priority);
        let label = labels
            .entry(key)
            .or_insert_with(|| display_label(&bug.priority))
            .clone();
        let rollup = rollups.entry(label).or_default();
        rollup.count += 1;
        if bug.is_canceled() {
            rollup.canceled += 1;
        } else if bug.is_resolved() {
            rollup.resolved += 1;
        } else {
            rollup.pending += 1;
        }
    }
    rollups
}

/// Buckets by `field`, largest first, ties by name.
fn group_rollups(defects: &[&BugRecord], field: fn(&BugRecord) -> &String) -> Vec<GroupRollup> {
    let mut order = Vec::<String>::new();
    let mut groups = BTreeMap::<String, GroupRollup>::new();

    for bug in defects {
        let raw = field(bug);
        let key = normalize_label(raw);
        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            GroupRollup {
                name: display_label(raw),
                ..GroupRollup::default()
            }
        });
        group.count += 1;
        if bug.is_resolved() {
            group.resolved += 1;
        } else if bug.is_pending() {
            group.pending += 1;
        }
    }

    let mut rollups = order
        .iter()
        .filter_map(|key| groups.remove(key))
        .collect::<Vec<_>>();
    rollups.sort_by(|left, right| {
        right
            .count
            .cmp(&left.count)
            .then_with(|| left.name.cmp(&right.name))
    });
    rollups
}

fn developer_rollups(defects: &[&BugRecord]) -> Vec<DeveloperRollup> {
    let mut groups = BTreeMap::<String, (String, u64, u64, u64)>::new();
    for bug in defects {
        if bug.developer.trim().is_empty() {
            continue;
        }
        let entry = groups
            .entry(normalize_label(&bug.developer))
            .or_insert_with(|| (bug.developer.trim().to_string(), 0, 0, 0));
        entry.1 += 1;
        if bug.is_pending() {
            entry.2 += 1;
        }
        if bug.is_resolved() {
            entry.3 += 1;
        }
    }

    let mut developers = groups
        .into_values()
        .map(|(developer, total, pending, resolved)| DeveloperRollup {
            developer,
            total,
            pending,
            resolved,
            efficiency_pct: percent(total.saturating_sub(pending), total),
            workload: Workload::from_pending(pending),
        })
        .collect::<Vec<_>>();
    developers.sort_by(|left, right| {
        right
            .total
            .cmp(&left.total)
            .then_with(|| left.developer.cmp(&right.developer))
    });
    developers
}

fn display_label(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        UNASSIGNED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Distinct values available for each facet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FacetOptions {
    pub sprints: Vec<String>,
    pub statuses: Vec<String>,
    pub priorities: Vec<String>,
    pub developers: Vec<String>,
    pub categories: Vec<String>,
    pub fix_versions: Vec<String>,
}

#[must_use]
pub fn facet_options(records: &RecordSet) -> FacetOptions {
    let sprint_labels = records
        .bugs
        .iter()
        .map(|bug| bug.sprint.as_str())
        .chain(records.sprints.iter().map(|sprint| sprint.sprint_id.as_str()));
    let mut sprints = distinct(sprint_labels);
    sprints.sort_by(|left, right| compare_sprint_labels(left, right).then_with(|| left.cmp(right)));

    let fix_versions = records
        .bugs
        .iter()
        .map(|bug| bug.fix_version.as_str())
        .chain(
            records
                .sprints
                .iter()
                .filter_map(|sprint| sprint.fix_version.as_deref()),
        );

    FacetOptions {
        sprints,
        statuses: sorted_distinct(records.bugs.iter().map(|bug| bug.status.as_str())),
        priorities: sorted_distinct(records.bugs.iter().map(|bug| bug.priority.as_str())),
        developers: sorted_distinct(records.bugs.iter().map(|bug| bug.developer.as_str())),
        categories: sorted_distinct(records.bugs.iter().map(|bug| bug.category.as_str())),
        fix_versions: sorted_distinct(fix_versions),
    }
}

/// First spelling wins for case-insensitive duplicates; blanks are dropped.
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = BTreeMap::<String, ()>::new();
    let mut out = Vec::new();
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(normalize_label(trimmed), ()).is_none() {
            out.push(trimmed.to_string());
        }
    }
    out
}

fn sorted_distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out = distinct(values);
    out.sort_by_key(|value| normalize_label(value));
    out
}
