use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::{BugRecord, RecordSet, SprintSummary, millis_per_day, normalize_label};
use crate::series::sort_sprints;
use crate::utils::ratio::tenths;

/// Selecting this value, or nothing at all, disables a facet.
pub const ALL: &str = "All";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Sprint,
    Status,
    Priority,
    Developer,
    Category,
    FixVersion,
}

impl Facet {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sprint => "sprint",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::Developer => "developer",
            Self::Category => "category",
            Self::FixVersion => "fix_version",
        }
    }

    /// Facets that only bug rows can answer.
    #[must_use]
    pub const fn is_bug_level(self) -> bool {
        matches!(
            self,
            Self::Status | Self::Priority | Self::Developer | Self::Category
        )
    }

    fn bug_value(self, bug: &BugRecord) -> &str {
        match self {
            Self::Sprint => &bug.sprint,
            Self::Status => &bug.status,
            Self::Priority => &bug.priority,
            Self::Developer => &bug.developer,
            Self::Category => &bug.category,
            Self::FixVersion => &bug.fix_version,
        }
    }
}

#[must_use]
pub const fn all_facets() -> [Facet; 6] {
    [
        Facet::Sprint,
        Facet::Status,
        Facet::Priority,
        Facet::Developer,
        Facet::Category,
        Facet::FixVersion,
    ]
}

/// User selection per facet. Values are compared trimmed and case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub sprints: Vec<String>,
    pub statuses: Vec<String>,
    pub priorities: Vec<String>,
    pub developers: Vec<String>,
    pub categories: Vec<String>,
    pub fix_versions: Vec<String>,
}

impl FilterState {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<I, V>(mut self, facet: Facet, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.values_mut(facet)
            .extend(values.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn values(&self, facet: Facet) -> &[String] {
        match facet {
            Facet::Sprint => &self.sprints,
            Facet::Status => &self.statuses,
            Facet::Priority => &self.priorities,
            Facet::Developer => &self.developers,
            Facet::Category => &self.categories,
            Facet::FixVersion => &self.fix_versions,
        }
    }

    fn values_mut(&mut self, facet: Facet) -> &mut Vec<String> {
        match facet {
            Facet::Sprint => &mut self.sprints,
            Facet::Status => &mut self.statuses,
            Facet::Priority => &mut self.priorities,
            Facet::Developer => &mut self.developers,
            Facet::Category => &mut self.categories,
            Facet::FixVersion => &mut self.fix_versions,
        }
    }

    /// Normalized selection, or `None` when the facet means "All".
    #[must_use]
    pub fn selection(&self, facet: Facet) -> Option<BTreeSet<String>> {
        let selected = self
            .values(facet)
            .iter()
            .map(|value| normalize_label(value))
            .filter(|value| !value.is_empty())
            .collect::<BTreeSet<_>>();

        if selected.is_empty() || selected.contains(&normalize_label(ALL)) {
            None
        } else {
            Some(selected)
        }
    }

    #[must_use]
    pub fn active_facets(&self) -> Vec<Facet> {
        all_facets()
            .into_iter()
            .filter(|facet| self.selection(*facet).is_some())
            .collect()
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.active_facets().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilteredRecordSet {
    pub bugs: Vec<BugRecord>,
    pub sprints: Vec<SprintSummary>,
}

struct FacetMatcher {
    selections: Vec<(Facet, BTreeSet<String>)>,
}

impl FacetMatcher {
    fn new(filter: &FilterState) -> Self {
        let selections = all_facets()
            .into_iter()
            .filter_map(|facet| filter.selection(facet).map(|selected| (facet, selected)))
            .collect();
        Self { selections }
    }

    fn has_bug_level_facet(&self) -> bool {
        self.selections
            .iter()
            .any(|(facet, _)| facet.is_bug_level())
    }

    fn matches_bug(&self, bug: &BugRecord) -> bool {
        self.selections
            .iter()
            .all(|(facet, selected)| selected.contains(&normalize_label(facet.bug_value(bug))))
    }

    /// Bug-level facets are decided by the caller; summaries cannot answer them.
    fn matches_summary(&self, summary: &SprintSummary) -> bool {
        self.selections
            .iter()
            .all(|(facet, selected)| match facet {
                Facet::Sprint => selected.contains(&normalize_label(&summary.sprint_id)),
                Facet::FixVersion => summary
                    .fix_version
                    .as_deref()
                    .is_some_and(|version| selected.contains(&normalize_label(version))),
                _ => true,
            })
    }
}

/// Restricts a record set to the selected facets. The input is never modified.
///
/// With bug rows present, sprint summaries are rebuilt from the surviving
/// rows and reported sprint rows only contribute what bugs cannot express.
/// Without bug rows the reported summaries pass through the sprint and
/// fix-version facets, and any bug-level facet excludes them.
#[must_use]
pub fn apply_filters(records: &RecordSet, filter: &FilterState) -> FilteredRecordSet {
    let matcher = FacetMatcher::new(filter);
    let bug_level_active = matcher.has_bug_level_facet();

    let bugs = records
        .bugs
        .iter()
        .filter(|bug| matcher.matches_bug(bug))
        .cloned()
        .collect::<Vec<_>>();

    let reported = collapse_duplicate_sprints(&records.sprints);

    let mut sprints = if records.bugs.is_empty() {
        if bug_level_active {
            Vec::new()
        } else {
            reported
                .into_iter()
                .filter(|summary| matcher.matches_summary(summary))
                .collect()
        }
    } else {
        let mut derived = derive_sprint_summaries(&bugs);
        let reported_by_key = reported
            .iter()
            .map(|summary| (normalize_label(&summary.sprint_id), summary))
            .collect::<BTreeMap<_, _>>();

        for summary in &mut derived {
            if let Some(reported) = reported_by_key.get(&normalize_label(&summary.sprint_id)) {
                supplement_from_reported(summary, reported, bug_level_active);
            }
        }

        if !bug_level_active {
            let sprints_with_rows = records
                .bugs
                .iter()
                .map(|bug| normalize_label(&bug.sprint))
                .collect::<BTreeSet<_>>();
            derived.extend(
                reported
                    .iter()
                    .filter(|summary| {
                        !sprints_with_rows.contains(&normalize_label(&summary.sprint_id))
                    })
                    .filter(|summary| matcher.matches_summary(summary))
                    .cloned(),
            );
        }
        derived
    };

    sort_sprints(&mut sprints);
    FilteredRecordSet { bugs, sprints }
}

impl RecordSet {
    /// The record set as seen through the identity filter.
    #[must_use]
    pub fn unfiltered(&self) -> FilteredRecordSet {
        apply_filters(self, &FilterState::all())
    }
}

/// Per-sprint rollup of bug rows, in first-seen order.
#[must_use]
pub fn derive_sprint_summaries(bugs: &[BugRecord]) -> Vec<SprintSummary> {
    let mut order = Vec::<String>::new();
    let mut groups = BTreeMap::<String, Vec<&BugRecord>>::new();
    for bug in bugs {
        let key = normalize_label(&bug.sprint);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(bug);
    }

    order
        .iter()
        .filter_map(|key| groups.get(key))
        .map(|rows| summarize_rows(rows))
        .collect()
}

fn summarize_rows(rows: &[&BugRecord]) -> SprintSummary {
    let sprint_id = rows
        .first()
        .map(|bug| bug.sprint.clone())
        .unwrap_or_default();
    let mut summary = SprintSummary::empty(sprint_id);
    let mut resolution_ms_total = 0u64;
    let mut resolution_samples = 0u64;

    for bug in rows {
        if summary.fix_version.is_none() && !bug.fix_version.is_empty() {
            summary.fix_version = Some(bug.fix_version.clone());
        }

        if bug.is_test_case() {
            summary.test_cases_planned += 1;
            if bug.is_executed_test() {
                summary.test_cases_executed += 1;
            }
            continue;
        }
        if !bug.is_defect() {
            continue;
        }

        summary.total_bugs += 1;
        if bug.is_resolved() {
            summary.resolved_bugs += 1;
        }
        if bug.is_pending() {
            summary.pending_bugs += 1;
        }
        if bug.is_critical() {
            summary.critical_bugs += 1;
        }
        if bug.is_critical_pending() {
            summary.critical_pending += 1;
        }
        if bug.is_production() {
            summary.production_bugs += 1;
        }
        if bug.is_resolved()
            && let Some(resolution_ms) = bug.resolution_ms()
        {
            resolution_ms_total = resolution_ms_total.saturating_add(resolution_ms);
            resolution_samples += 1;
        }
    }

    if resolution_samples > 0 {
        summary.avg_resolution_days = Some(tenths(
            resolution_ms_total,
            resolution_samples.saturating_mul(millis_per_day()),
        ));
    }
    summary
}

/// Sprint-wide figures only apply while the whole sprint is in view.
fn supplement_from_reported(
    summary: &mut SprintSummary,
    reported: &SprintSummary,
    bug_level_active: bool,
) {
    if summary.fix_version.is_none() {
        summary.fix_version = reported.fix_version.clone();
    }
    if bug_level_active {
        return;
    }

    if summary.test_cases_planned == 0 && summary.test_cases_executed == 0 {
        summary.test_cases_planned = reported.test_cases_planned;
        summary.test_cases_executed = reported.test_cases_executed;
    }
    if summary.test_cases_automated == 0 {
        summary.test_cases_automated = reported.test_cases_automated;
    }
    if summary.production_bugs == 0 {
        summary.production_bugs = reported.production_bugs.min(summary.total_bugs);
    }
    if summary.avg_resolution_days.is_none() {
        summary.avg_resolution_days = reported.avg_resolution_days;
    }
}

/// Reported rows sharing a sprint label are summed into one, saturating at
/// `u64::MAX`.
fn collapse_duplicate_sprints(sprints: &[SprintSummary]) -> Vec<SprintSummary> {
    let mut collapsed = Vec::<SprintSummary>::with_capacity(sprints.len());
    let mut positions = BTreeMap::<String, usize>::new();

    for sprint in sprints {
        let key = normalize_label(&sprint.sprint_id);
        match positions.get(&key) {
            Some(&position) => {
                let existing = &mut collapsed[position];
                let pairs = [
                    (&mut existing.total_bugs, sprint.total_bugs),
                    (&mut existing.resolved_bugs, sprint.resolved_bugs),
                    (&mut existing.pending_bugs, sprint.pending_bugs),
                    (&mut existing.critical_bugs, sprint.critical_bugs),
                    (&mut existing.critical_pending, sprint.critical_pending),
                    (&mut existing.test_cases_planned, sprint.test_cases_planned),
                    (&mut existing.test_cases_executed, sprint.test_cases_executed),
                    (&mut existing.test_cases_automated, sprint.test_cases_automated),
                    (&mut existing.production_bugs, sprint.production_bugs),
                ];
                for (total, extra) in pairs {
                    *total = total.saturating_add(extra);
                }
                if existing.avg_resolution_days.is_none() {
                    existing.avg_resolution_days = sprint.avg_resolution_days;
                }
                if existing.fix_version.is_none() {
                    existing.fix_version = sprint.fix_version.clone();
                }
            }
            None => {
                positions.insert(key, collapsed.len());
                collapsed.push(sprint.clone());
            }
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::{Facet, FilterState, collapse_duplicate_sprints};
    use crate::models::SprintSummary;

    #[test]
    fn empty_and_all_selections_are_identity() {
        assert!(FilterState::all().is_identity());
        assert!(
            FilterState::all()
                .with(Facet::Priority, Vec::<String>::new())
                .is_identity()
        );
        assert!(
            FilterState::all()
                .with(Facet::Priority, ["Major", " all "])
                .is_identity()
        );
        assert!(
            FilterState::all()
                .with(Facet::Status, ["   "])
                .is_identity()
        );
    }

    #[test]
    fn selection_is_normalized() {
        let filter = FilterState::all().with(Facet::Developer, [" Ana ", "LUIS"]);
        let selected = filter
            .selection(Facet::Developer)
            .expect("developer facet should be active");
        assert!(selected.contains("ana"));
        assert!(selected.contains("luis"));
        assert_eq!(filter.active_facets(), vec![Facet::Developer]);
    }

    #[test]
    fn duplicate_reported_sprints_are_summed() {
        let mut first = SprintSummary::empty("Sprint 3");
        first.total_bugs = 4;
        let mut second = SprintSummary::empty("sprint 3 ");
        second.total_bugs = 2;
        second.fix_version = Some("v1.2".to_string());

        let collapsed = collapse_duplicate_sprints(&[first, second]);
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].total_bugs, 6);
        assert_eq!(collapsed[0].fix_version.as_deref(), Some("v1.2"));
    }
}
