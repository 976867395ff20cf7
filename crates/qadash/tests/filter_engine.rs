use qadash::adapters::adapt_snapshot;
use qadash::filter::{Facet, FilterState, apply_filters, derive_sprint_summaries};
use qadash::kpi::compute_kpis;
use qadash::models::{BugRecord, RecordSet, SprintSummary};
use serde_json::json;

fn bug(id: &str, sprint: &str, priority: &str, status: &str, developer: &str) -> BugRecord {
    BugRecord {
        id: id.to_string(),
        sprint: sprint.to_string(),
        priority: priority.to_string(),
        status: status.to_string(),
        developer: developer.to_string(),
        issue_type: "Bug".to_string(),
        category: "Functional".to_string(),
        fix_version: "1.0.0".to_string(),
        ..BugRecord::default()
    }
}

fn fixture() -> RecordSet {
    RecordSet {
        bugs: vec![
            bug("QA-1", "Sprint 10", "Major", "To Do", "Ana"),
            bug("QA-2", "Sprint 2", "High", "Done", "Luis"),
            bug("QA-3", "Sprint 2", "Low", "Canceled", "Ana"),
            BugRecord {
                fix_version: "1.1.0".to_string(),
                ..bug("QA-4", "Sprint 10", "High", "Closed", "Luis")
            },
        ],
        sprints: vec![
            SprintSummary {
                test_cases_planned: 50,
                test_cases_executed: 45,
                fix_version: Some("1.0.0".to_string()),
                ..SprintSummary::empty("Sprint 2")
            },
            SprintSummary {
                total_bugs: 3,
                resolved_bugs: 3,
                fix_version: Some("0.9.0".to_string()),
                ..SprintSummary::empty("Sprint 1")
            },
        ],
        ..RecordSet::default()
    }
}

#[test]
fn sprints_come_back_in_numeric_order() {
    let filtered = fixture().unfiltered();
    let labels = filtered
        .sprints
        .iter()
        .map(|sprint| sprint.sprint_id.as_str())
        .collect::<Vec<_>>();

    assert_eq!(labels, ["Sprint 1", "Sprint 2", "Sprint 10"]);
}

#[test]
fn facet_values_match_case_insensitively() {
    let filter = FilterState::all().with(Facet::Developer, [" ana "]);
    let filtered = apply_filters(&fixture(), &filter);

    let ids = filtered
        .bugs
        .iter()
        .map(|bug| bug.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, ["QA-1", "QA-3"]);
}

#[test]
fn bug_level_facet_drops_summary_only_sprints_and_sprint_supplements() {
    let filter = FilterState::all().with(Facet::Priority, ["High"]);
    let filtered = apply_filters(&fixture(), &filter);

    assert_eq!(filtered.bugs.len(), 2);
    assert!(
        filtered
            .sprints
            .iter()
            .all(|sprint| sprint.sprint_id != "Sprint 1")
    );
    let sprint_two = filtered
        .sprints
        .iter()
        .find(|sprint| sprint.sprint_id == "Sprint 2")
        .expect("sprint 2 keeps its High bug");
    assert_eq!(sprint_two.total_bugs, 1);
    assert_eq!(sprint_two.test_cases_planned, 0);
}

#[test]
fn identity_view_supplements_test_counts_from_reported_rows() {
    let filtered = fixture().unfiltered();
    let sprint_two = filtered
        .sprints
        .iter()
        .find(|sprint| sprint.sprint_id == "Sprint 2")
        .expect("sprint 2 should exist");

    assert_eq!(sprint_two.total_bugs, 2);
    assert_eq!(sprint_two.resolved_bugs, 1);
    assert_eq!(sprint_two.pending_bugs, 0);
    assert_eq!(sprint_two.test_cases_planned, 50);
    assert_eq!(sprint_two.test_cases_executed, 45);
}

#[test]
fn fix_version_facet_filters_bugs_and_summary_rows() {
    let filter = FilterState::all().with(Facet::FixVersion, ["0.9.0", "1.1.0"]);
    let filtered = apply_filters(&fixture(), &filter);

    let ids = filtered
        .bugs
        .iter()
        .map(|bug| bug.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, ["QA-4"]);

    let labels = filtered
        .sprints
        .iter()
        .map(|sprint| sprint.sprint_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(labels, ["Sprint 1", "Sprint 10"]);
}

#[test]
fn filtering_never_mutates_the_input() {
    let records = fixture();
    let before = records.clone();
    let _ = apply_filters(&records, &FilterState::all().with(Facet::Sprint, ["Sprint 2"]));
    assert_eq!(records, before);
}

#[test]
fn summary_only_records_pass_through_sprint_facet() {
    let records = RecordSet {
        sprints: vec![
            SprintSummary::empty("Sprint 1"),
            SprintSummary::empty("Sprint 2"),
        ],
        ..RecordSet::default()
    };
    let filtered = apply_filters(&records, &FilterState::all().with(Facet::Sprint, ["sprint 2"]));

    assert_eq!(filtered.sprints.len(), 1);
    assert_eq!(filtered.sprints[0].sprint_id, "Sprint 2");
}

#[test]
fn derived_summaries_keep_first_seen_order_and_count_test_cases() {
    let mut test_case = bug("QA-9", "Sprint 5", "Medium", "Done", "");
    test_case.issue_type = "Test Case".to_string();
    let bugs = vec![
        bug("QA-7", "Sprint 5", "Major", "To Do", "Ana"),
        bug("QA-8", "Sprint 3", "Low", "Done", "Luis"),
        test_case,
    ];

    let summaries = derive_sprint_summaries(&bugs);

    assert_eq!(summaries[0].sprint_id, "Sprint 5");
    assert_eq!(summaries[0].total_bugs, 1);
    assert_eq!(summaries[0].critical_pending, 1);
    assert_eq!(summaries[0].test_cases_planned, 1);
    assert_eq!(summaries[0].test_cases_executed, 1);
    assert_eq!(summaries[1].sprint_id, "Sprint 3");
}

#[test]
fn duplicate_sprint_rows_saturate_instead_of_overflowing() {
    let records = adapt_snapshot(&json!({
        "sprintData": [
            {"sprint": "Sprint 1", "bugs": u64::MAX, "testCasesPlanned": u64::MAX},
            {"sprint": "sprint 1", "bugs": 1, "testCasesPlanned": 7}
        ]
    }));

    let filtered = records.unfiltered();

    assert_eq!(filtered.sprints.len(), 1);
    assert_eq!(filtered.sprints[0].total_bugs, u64::MAX);
    assert_eq!(filtered.sprints[0].pending_bugs, u64::MAX);
    assert_eq!(filtered.sprints[0].test_cases_planned, u64::MAX);

    let kpis = compute_kpis(&filtered);
    assert_eq!(kpis.total_bugs, u64::MAX);
    assert_eq!(kpis.resolution_efficiency, 0);
}
