use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Args;
use serde_json::json;

use super::{CommandContext, emit, envelope_failure};
use crate::adapters::read_sqlite_records;
use crate::breakdown::build_breakdown;
use crate::filter::FilterState;
use crate::kpi::compute_kpis;
use crate::models::{
    RecordSet, ReportedSummary, ResponseEnvelope, SNAPSHOT_FORMAT_VERSION, SnapshotDocument,
    SnapshotMetadata,
};
use crate::utils::time::now_utc;

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Defaults to the JSON snapshot path of the data directory.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Canonical snapshot for `records`, with sprint rows and rollups recomputed.
#[must_use]
pub fn build_snapshot_document(records: &RecordSet) -> SnapshotDocument {
    let filter = FilterState::all();
    let filtered = records.unfiltered();
    let kpis = compute_kpis(&filtered);
    let breakdown = build_breakdown(records, &filtered, &filter).breakdowns;

    SnapshotDocument {
        metadata: SnapshotMetadata {
            version: Some(SNAPSHOT_FORMAT_VERSION.to_string()),
            generated_at: Some(now_utc()),
            sprints_count: Some(kpis.sprint_count),
            ..records.metadata.clone()
        },
        summary: ReportedSummary {
            total_bugs: kpis.total_bugs,
            bugs_closed: kpis.resolved_bugs,
            critical_bugs: kpis.critical_bugs,
            critical_pending: kpis.critical_pending,
            test_cases_planned: kpis.test_cases_planned,
            test_cases_executed: kpis.test_cases_executed,
            production_bugs: kpis.production_bugs,
            total_sprints: kpis.sprint_count,
        },
        sprint_data: filtered.sprints,
        bugs: records.bugs.clone(),
        bugs_by_priority: breakdown.by_priority,
        bugs_by_module: breakdown.by_module,
        bugs_by_category: breakdown.by_category,
        developer_data: breakdown.developers,
    }
}

pub fn write_snapshot_document(path: &Path, document: &SnapshotDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory: {}", parent.display()))?;
    }
    let encoded =
        serde_json::to_string_pretty(document).context("failed to encode snapshot document")?;
    std::fs::write(path, format!("{encoded}\n"))
        .with_context(|| format!("failed to write snapshot: {}", path.display()))
}

pub fn run(args: &ExportArgs, context: &CommandContext) -> Result<()> {
    let sqlite_path = context.paths.sqlite_path.as_deref().ok_or_else(|| {
        envelope_failure(
            "export",
            "sqlite_disabled",
            "the SQLite store is disabled; set DATA_SOURCE to a database path",
            &anyhow!("data source is `none` or a JSON file"),
        )
    })?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| context.paths.json_snapshot.clone());
    eprintln!(
        "export: start sqlite={} output={}",
        sqlite_path.display(),
        output.display()
    );

    let records = read_sqlite_records(sqlite_path).map_err(|error| {
        envelope_failure(
            "export",
            "sqlite_unavailable",
            "unable to read the SQLite store",
            &error,
        )
    })?;
    eprintln!(
        "export: checkpoint loaded bugs={} sprints={} warnings={}",
        records.bugs.len(),
        records.sprints.len(),
        records.warnings.len()
    );

    let document = build_snapshot_document(&records);
    write_snapshot_document(&output, &document).map_err(|error| {
        envelope_failure(
            "export",
            "snapshot_write_failed",
            "unable to write the JSON snapshot",
            &error,
        )
    })?;
    eprintln!("export: checkpoint written {}", output.display());

    let envelope = ResponseEnvelope::ok(
        "export",
        json!({
            "output_path": output.display().to_string(),
            "bugs": document.bugs.len(),
            "sprints": document.sprint_data.len(),
        }),
    )
    .with_meta("sqlite_path", json!(sqlite_path.display().to_string()));
    emit(&envelope.with_degradations(&records.warnings))
}
