use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use qadash::adapters::{JsonFileSource, adapt_snapshot, parse_snapshot_file};
use qadash::cache::{FetchContext, SnapshotSource};
use qadash::models::UNSCHEDULED_SPRINT;
use serde_json::json;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}

#[test]
fn historical_layout_with_spanish_keys_is_normalized() {
    let record_set = adapt_snapshot(&json!({
        "resumen": {"total": 12, "bugsClosed": "9", "totalSprints": 2},
        "sprints": [
            {"sprintName": "Sprint 1", "bugs_encontrados": 7, "bugs_resueltos": 5,
             "casos_ejecutados": 30, "testPlanned": 40},
            {"sprint": "Sprint 2", "bugsFound": 5, "bugsClosed": 4, "version": "2.1"}
        ],
        "bugsDetail": [
            {"clave_incidencia": "QA-1", "sprint_name": "Sprint 1", "prioridad": "Más alta",
             "estado": "Tareas por hacer", "asignado_a": "Ana", "modulo": "Pagos"},
            {"issueKey": "QA-2", "priority": "Media", "status": "Cerrado",
             "fecha_creacion": "2026-02-01 09:00:00", "fecha_resolucion": "2026-02-03"}
        ]
    }));

    assert!(record_set.warnings.is_empty(), "{:?}", record_set.warnings);
    assert_eq!(record_set.summary.total_bugs, 12);
    assert_eq!(record_set.summary.bugs_closed, 9);

    assert_eq!(record_set.sprints.len(), 2);
    assert_eq!(record_set.sprints[0].test_cases_executed, 30);
    assert_eq!(record_set.sprints[0].test_cases_planned, 40);
    assert_eq!(record_set.sprints[0].pending_bugs, 2);
    assert_eq!(record_set.sprints[1].fix_version.as_deref(), Some("2.1"));

    let first = &record_set.bugs[0];
    assert_eq!(first.id, "QA-1");
    assert!(first.is_critical_pending());
    assert_eq!(first.developer, "Ana");
    assert_eq!(first.module, "Pagos");

    let second = &record_set.bugs[1];
    assert_eq!(second.sprint, UNSCHEDULED_SPRINT);
    assert!(second.is_resolved());
    assert_eq!(second.created_at.as_deref(), Some("2026-02-01T09:00:00.000Z"));
    assert_eq!(second.resolution_ms(), Some(39 * 60 * 60 * 1000));
}

#[test]
fn unparseable_counts_become_zero_with_a_warning() {
    let record_set = adapt_snapshot(&json!({
        "sprintData": [{"sprint": "Sprint 1", "bugs": "many", "bugsResolved": -3}]
    }));

    assert_eq!(record_set.sprints[0].total_bugs, 0);
    assert_eq!(record_set.sprints[0].resolved_bugs, 0);
    assert_eq!(record_set.warnings.len(), 2);
    assert!(record_set.warnings[0].contains("sprintData[0]"));
}

#[test]
fn missing_sections_yield_an_empty_record_set() {
    let record_set = adapt_snapshot(&json!({"metadata": {"generatedAt": "2026-01-01"}}));

    assert!(record_set.is_empty());
    assert!(record_set.warnings.is_empty());
    assert_eq!(record_set.metadata.generated_at.as_deref(), Some("2026-01-01"));
}

#[test]
fn file_source_reads_snapshot_and_records_path() {
    let temp = unique_temp_dir("qadash-json-source");
    std::fs::create_dir_all(&temp).expect("temp dir should be creatable");
    let path = temp.join("qa-data.json");
    std::fs::write(
        &path,
        json!({"sprintData": [{"sprint": "Sprint 4", "bugs": 3}]}).to_string(),
    )
    .expect("snapshot should be writable");

    let source = JsonFileSource::new(path.clone());
    let record_set = source
        .load(&FetchContext::new(Duration::from_secs(5)))
        .expect("snapshot should load");

    assert_eq!(record_set.sprints[0].sprint_id, "Sprint 4");
    assert_eq!(
        record_set.metadata.source_file_path.as_deref(),
        Some(path.display().to_string().as_str())
    );
    assert!(source.describe().starts_with("json:"));
}

#[test]
fn missing_or_invalid_files_are_errors() {
    let temp = unique_temp_dir("qadash-json-invalid");
    std::fs::create_dir_all(&temp).expect("temp dir should be creatable");

    let missing = JsonFileSource::new(temp.join("absent.json"));
    assert!(
        missing
            .load(&FetchContext::new(Duration::from_secs(5)))
            .is_err()
    );

    let broken = temp.join("broken.json");
    std::fs::write(&broken, "{\"bugs\": [").expect("broken file should be writable");
    let err = parse_snapshot_file(&broken).expect_err("truncated JSON must fail");
    assert!(format!("{err:#}").contains("failed to parse JSON snapshot"));
}
