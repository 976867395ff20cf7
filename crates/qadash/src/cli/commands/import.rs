use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Args;
use serde_json::json;

use super::{CommandContext, emit, envelope_failure};
use crate::adapters::parse_snapshot_file;
use crate::models::ResponseEnvelope;
use crate::sqlite::{
    DataSourceLoad, LoadStatus, SqliteWriterConfig, ensure_sqlite_schema, open_sqlite_connection,
    record_data_source_load, write_bug_records, write_sprint_rows,
};

#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    #[arg(long, default_value_t = crate::sqlite::DEFAULT_INSERT_BATCH_SIZE)]
    pub batch_size: usize,
}

pub fn run(args: &ImportArgs, context: &CommandContext) -> Result<()> {
    let sqlite_path = context.paths.sqlite_path.as_deref().ok_or_else(|| {
        envelope_failure(
            "import",
            "sqlite_disabled",
            "the SQLite store is disabled; set DATA_SOURCE to a database path",
            &anyhow!("data source is `none` or a JSON file"),
        )
    })?;
    eprintln!(
        "import: start input={} sqlite={}",
        args.input.display(),
        sqlite_path.display()
    );

    let records = parse_snapshot_file(&args.input).map_err(|error| {
        envelope_failure(
            "import",
            "snapshot_unreadable",
            "unable to read the JSON snapshot",
            &error,
        )
    })?;
    eprintln!(
        "import: checkpoint parsed bugs={} sprints={} warnings={}",
        records.bugs.len(),
        records.sprints.len(),
        records.warnings.len()
    );

    let store_failure = |error: anyhow::Error| {
        envelope_failure(
            "import",
            "sqlite_write_failed",
            "unable to write the SQLite store",
            &error,
        )
    };

    let mut connection = open_sqlite_connection(sqlite_path).map_err(store_failure)?;
    ensure_sqlite_schema(&connection).map_err(store_failure)?;
    let stats = write_bug_records(
        &mut connection,
        &records.bugs,
        SqliteWriterConfig {
            batch_size: args.batch_size,
        },
    )
    .map_err(store_failure)?;
    let sprints_written = write_sprint_rows(&mut connection, &records.sprints).map_err(store_failure)?;
    eprintln!(
        "import: checkpoint written bugs={} sprints={} batches={}",
        stats.records_written, sprints_written, stats.batches_committed
    );

    let status = if records.warnings.is_empty() {
        LoadStatus::Success
    } else {
        LoadStatus::Partial
    };
    let load = DataSourceLoad {
        source_file_name: args
            .input
            .file_name()
            .map(|name| name.to_string_lossy().to_string()),
        source_file_path: Some(args.input.display().to_string()),
        source_file_size: std::fs::metadata(&args.input).ok().map(|meta| meta.len()),
        total_bugs_loaded: stats.records_written as u64,
        total_sprints_loaded: sprints_written as u64,
        status,
        notes: (!records.warnings.is_empty())
            .then(|| format!("{} warnings during import", records.warnings.len())),
    };
    let load_id = record_data_source_load(&connection, &load).map_err(store_failure)?;

    let envelope = ResponseEnvelope::ok(
        "import",
        json!({
            "sqlite_path": sqlite_path.display().to_string(),
            "bugs_written": stats.records_written,
            "sprints_written": sprints_written,
            "batches_committed": stats.batches_committed,
            "load_id": load_id,
            "status": status.as_str(),
        }),
    );
    emit(&envelope.with_degradations(&records.warnings))
}
