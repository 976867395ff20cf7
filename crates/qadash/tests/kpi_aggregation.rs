use insta::assert_json_snapshot;
use qadash::filter::{Facet, FilterState, apply_filters};
use qadash::kpi::{CycleTimeSource, compute_kpis};
use qadash::models::{BugRecord, RecordSet, SprintSummary};
use serde_json::json;

fn sprint(id: &str, bugs: u64, resolved: u64) -> SprintSummary {
    SprintSummary {
        total_bugs: bugs,
        resolved_bugs: resolved,
        pending_bugs: bugs - resolved,
        ..SprintSummary::empty(id)
    }
}

fn bug(id: &str, sprint: &str, priority: &str, status: &str) -> BugRecord {
    BugRecord {
        id: id.to_string(),
        sprint: sprint.to_string(),
        priority: priority.to_string(),
        status: status.to_string(),
        issue_type: "Bug".to_string(),
        ..BugRecord::default()
    }
}

fn summary_only_records() -> RecordSet {
    RecordSet {
        sprints: vec![sprint("Sprint 1", 10, 7), sprint("Sprint 2", 5, 5)],
        ..RecordSet::default()
    }
}

fn bug_level_records() -> RecordSet {
    let mut resolved_late = bug("QA-3", "Sprint 2", "Major", "Done");
    resolved_late.created_at = Some("2026-03-01T00:00:00.000Z".to_string());
    resolved_late.resolved_at = Some("2026-03-05T00:00:00.000Z".to_string());

    let mut resolved_fast = bug("QA-4", "Sprint 2", "Medium", "Closed");
    resolved_fast.created_at = Some("2026-03-02T00:00:00.000Z".to_string());
    resolved_fast.resolved_at = Some("2026-03-04T00:00:00.000Z".to_string());
    resolved_fast.environment = "Production".to_string();

    RecordSet {
        bugs: vec![
            bug("QA-1", "Sprint 1", "Major", "To Do"),
            bug("QA-2", "Sprint 1", "Low", "In Development"),
            resolved_late,
            resolved_fast,
        ],
        sprints: vec![SprintSummary {
            test_cases_planned: 40,
            test_cases_executed: 30,
            ..SprintSummary::empty("Sprint 1")
        }],
        ..RecordSet::default()
    }
}

#[test]
fn two_sprint_example_yields_eighty_percent_efficiency() {
    let kpis = compute_kpis(&summary_only_records().unfiltered());

    assert_eq!(kpis.total_bugs, 15);
    assert_eq!(kpis.resolved_bugs, 12);
    assert_eq!(kpis.resolution_efficiency, 80);
    assert_eq!(kpis.sprint_count, 2);
    assert!((kpis.defect_density.avg - 7.5).abs() < 1e-9);
    assert_eq!(kpis.defect_density.max, 10);
    assert_eq!(kpis.defect_density.min, 5);
}

#[test]
fn filter_without_matches_yields_empty_view_and_zero_kpis() {
    let filter = FilterState::all().with(Facet::Priority, ["High"]);

    for records in [summary_only_records(), bug_level_records()] {
        let filtered = apply_filters(&records, &filter);
        assert!(filtered.bugs.is_empty());
        assert!(filtered.sprints.is_empty());

        let kpis = compute_kpis(&filtered);
        assert_eq!(kpis.total_bugs, 0);
        assert_eq!(kpis.resolution_efficiency, 0);
        assert_eq!(kpis.critical_bugs_ratio, 0);
        assert_eq!(kpis.test_execution_rate, 0);
        assert_eq!(kpis.leakage_rate, 0);
        assert_eq!(kpis.defect_density.avg, 0.0);
    }
}

#[test]
fn identity_filter_matches_unfiltered_aggregation() {
    let records = bug_level_records();
    let explicit_all = FilterState::all()
        .with(Facet::Sprint, ["All"])
        .with(Facet::Priority, Vec::<String>::new());

    assert_eq!(
        compute_kpis(&apply_filters(&records, &explicit_all)),
        compute_kpis(&records.unfiltered())
    );
}

#[test]
fn aggregation_is_idempotent() {
    let filtered = bug_level_records().unfiltered();
    assert_eq!(compute_kpis(&filtered), compute_kpis(&filtered));
}

#[test]
fn efficiency_stays_within_bounds() {
    let records = RecordSet {
        sprints: vec![SprintSummary {
            resolved_bugs: 9,
            ..sprint("Sprint 1", 4, 4)
        }],
        ..RecordSet::default()
    };
    let kpis = compute_kpis(&records.unfiltered());
    assert!(kpis.resolution_efficiency <= 100);
}

#[test]
fn bug_rows_drive_counts_and_cycle_time() {
    let kpis = compute_kpis(&bug_level_records().unfiltered());

    assert_eq!(kpis.total_bugs, 4);
    assert_eq!(kpis.resolved_bugs, 2);
    assert_eq!(kpis.pending_bugs, 2);
    assert_eq!(kpis.critical_bugs, 2);
    assert_eq!(kpis.critical_pending, 1);
    assert_eq!(kpis.production_bugs, 1);
    assert_eq!(kpis.test_cases_planned, 40);
    assert_eq!(kpis.test_cases_executed, 30);
    assert_eq!(kpis.test_execution_rate, 75);

    assert_eq!(kpis.cycle_time.source, CycleTimeSource::BugDates);
    assert_eq!(kpis.cycle_time.samples, 2);
    assert!((kpis.cycle_time.avg_days - 3.0).abs() < 1e-9);
    assert_eq!(kpis.cycle_time.by_priority.get("major"), Some(&4.0));
}

#[test]
fn headline_counts_snapshot() {
    let kpis = compute_kpis(&bug_level_records().unfiltered());
    let headline = json!({
        "critical_bugs_ratio": kpis.critical_bugs_ratio,
        "leakage_rate": kpis.leakage_rate,
        "pending_bugs": kpis.pending_bugs,
        "resolution_efficiency": kpis.resolution_efficiency,
        "sprint_count": kpis.sprint_count,
        "test_execution_rate": kpis.test_execution_rate,
        "total_bugs": kpis.total_bugs,
    });

    assert_json_snapshot!(headline, @r###"
    {
      "critical_bugs_ratio": 25,
      "leakage_rate": 25,
      "pending_bugs": 2,
      "resolution_efficiency": 50,
      "sprint_count": 2,
      "test_execution_rate": 75,
      "total_bugs": 4
    }
    "###);
}
