use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use qadash::adapters::{parse_snapshot_file, parse_snapshot_str, read_sqlite_records};
use qadash::cli::commands::export::{build_snapshot_document, write_snapshot_document};
use qadash::models::{BugRecord, SNAPSHOT_FORMAT_VERSION};
use qadash::sqlite::{
    SqliteWriterConfig, ensure_sqlite_schema, open_sqlite_connection, write_bug_records,
    write_sprint_rows,
};
use serde_json::{Value, json};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    let path = std::env::temp_dir().join(format!("{prefix}-{nanos}"));
    std::fs::create_dir_all(&path).expect("temp dir should be creatable");
    path
}

fn fixture_snapshot() -> Value {
    json!({
        "sprintData": [
            {"sprint": "Sprint 1", "testCasesPlanned": 30, "testCasesExecuted": 24, "fixVersion": "1.0.0"},
            {"sprint": "Sprint 2", "testCasesPlanned": 20, "testCasesExecuted": 20, "fixVersion": "1.1.0"}
        ],
        "bugs": [
            {
                "key": "QA-1", "sprint": "Sprint 1", "priority": "Major", "status": "To Do",
                "type": "Bug", "developer": "Ana", "module": "Checkout", "category": "Functional",
                "fixVersion": "1.0.0", "environment": "Staging", "summary": "Cart total off by one",
                "createdAt": "2026-03-01T00:00:00.000Z"
            },
            {
                "key": "QA-2", "sprint": "Sprint 2", "priority": "High", "status": "Done",
                "type": "Bug", "developer": "Luis", "module": "Search", "category": "UI",
                "fixVersion": "1.1.0", "environment": "Production", "summary": "Filter chip overlaps",
                "createdAt": "2026-03-02T00:00:00.000Z", "resolvedAt": "2026-03-04T00:00:00.000Z"
            }
        ]
    })
}

fn sorted_bugs(mut bugs: Vec<BugRecord>) -> Vec<BugRecord> {
    bugs.sort_by(|left, right| left.id.cmp(&right.id));
    bugs
}

fn qadash(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_qadash"))
        .env_remove("DATA_SOURCE")
        .env("RUST_LOG", "off")
        .arg("--cwd")
        .arg(cwd)
        .args(args)
        .output()
        .expect("command should execute")
}

fn stdout_json(output: &Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).expect("stdout should be one JSON envelope")
}

#[test]
fn sqlite_store_exports_the_same_bugs() {
    let temp = unique_temp_dir("qadash-roundtrip-lib");
    let imported =
        parse_snapshot_str(&fixture_snapshot().to_string()).expect("fixture should parse");
    assert!(imported.warnings.is_empty());

    let db = temp.join("qa-dashboard.db");
    let mut connection = open_sqlite_connection(&db).expect("database should open");
    ensure_sqlite_schema(&connection).expect("schema should apply");
    write_bug_records(&mut connection, &imported.bugs, SqliteWriterConfig::default())
        .expect("bugs should write");
    write_sprint_rows(&mut connection, &imported.sprints).expect("sprints should write");
    drop(connection);

    let stored = read_sqlite_records(&db).expect("store should read");
    let document = build_snapshot_document(&stored);
    let output = temp.join("out").join("qa-data.json");
    write_snapshot_document(&output, &document).expect("snapshot should write");

    let exported = parse_snapshot_file(&output).expect("exported snapshot should parse");
    assert_eq!(sorted_bugs(exported.bugs), sorted_bugs(imported.bugs));
    assert_eq!(
        exported.metadata.version.as_deref(),
        Some(SNAPSHOT_FORMAT_VERSION)
    );
}

#[test]
fn snapshot_document_recomputes_summary_and_rollups() {
    let records =
        parse_snapshot_str(&fixture_snapshot().to_string()).expect("fixture should parse");
    let document = build_snapshot_document(&records);

    assert_eq!(document.summary.total_bugs, 2);
    assert_eq!(document.summary.bugs_closed, 1);
    assert_eq!(document.summary.production_bugs, 1);
    assert_eq!(document.summary.test_cases_planned, 50);
    assert_eq!(document.summary.total_sprints, 2);
    assert_eq!(document.metadata.sprints_count, Some(2));

    let sprints = document
        .sprint_data
        .iter()
        .map(|sprint| sprint.sprint_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(sprints, ["Sprint 1", "Sprint 2"]);
    assert_eq!(document.bugs_by_module.len(), 2);
    assert_eq!(document.developer_data.len(), 2);
}

#[test]
fn import_then_export_through_the_binary() {
    let cwd = unique_temp_dir("qadash-roundtrip-cli");
    let input = cwd.join("incoming.json");
    std::fs::write(&input, fixture_snapshot().to_string()).expect("input should be writable");

    let import = qadash(
        &cwd,
        &["import", "--input", input.to_str().expect("utf-8 path")],
    );
    assert_eq!(import.status.code(), Some(0));
    let envelope = stdout_json(&import);
    assert_eq!(envelope["data"]["bugs_written"], 2);
    assert_eq!(envelope["data"]["sprints_written"], 2);
    assert_eq!(envelope["data"]["status"], "success");

    let read = qadash(&cwd, &["kpis"]);
    assert_eq!(read.status.code(), Some(0));
    let envelope = stdout_json(&read);
    assert_eq!(envelope["freshness"]["data_source"], "sqlite");
    assert_eq!(envelope["data"]["kpis"]["total_bugs"], 2);
    assert!(
        envelope["warnings"]
            .as_array()
            .expect("warnings should be an array")
            .iter()
            .any(|warning| warning["message"]
                .as_str()
                .is_some_and(|message| message.starts_with("skipped source: json:")))
    );

    let output = cwd.join("exported.json");
    let export = qadash(
        &cwd,
        &["export", "--output", output.to_str().expect("utf-8 path")],
    );
    assert_eq!(export.status.code(), Some(0));
    assert_eq!(stdout_json(&export)["data"]["bugs"], 2);

    let imported = parse_snapshot_file(&input).expect("input should parse");
    let exported = parse_snapshot_file(&output).expect("export should parse");
    assert_eq!(sorted_bugs(exported.bugs), sorted_bugs(imported.bugs));
}

#[test]
fn each_invocation_reads_the_snapshot_as_it_is_now() {
    let cwd = unique_temp_dir("qadash-roundtrip-reload");
    let snapshot = cwd.join("current.json");
    let snapshot_arg = snapshot.to_str().expect("utf-8 path");
    std::fs::write(&snapshot, fixture_snapshot().to_string()).expect("snapshot should write");

    let first = qadash(&cwd, &["--data-source", snapshot_arg, "kpis"]);
    assert_eq!(first.status.code(), Some(0));
    assert_eq!(stdout_json(&first)["data"]["kpis"]["total_bugs"], 2);

    let mut trimmed = fixture_snapshot();
    trimmed["bugs"]
        .as_array_mut()
        .expect("fixture bugs should be an array")
        .truncate(1);
    std::fs::write(&snapshot, trimmed.to_string()).expect("snapshot should rewrite");

    let second = qadash(&cwd, &["--data-source", snapshot_arg, "kpis"]);
    assert_eq!(second.status.code(), Some(0));
    let envelope = stdout_json(&second);
    assert_eq!(envelope["data"]["kpis"]["total_bugs"], 1);
    assert_eq!(envelope["freshness"]["stale"], Value::Bool(false));
}
