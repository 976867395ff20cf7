use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params, params_from_iter};
use serde_json::{Map, Number, Value};

use crate::models::{BugRecord, SnapshotMetadata, SprintSummary};
use crate::series::sprint_number;
use crate::utils::time::now_utc;

pub const SQLITE_SCHEMA_VERSION: &str = "qadash.sqlite.v1";
pub const BUGS_TABLE: &str = "bugs_detail";
pub const SPRINTS_TABLE: &str = "sprints_versions";
pub const DATA_SOURCE_TABLE: &str = "data_source_metadata";
pub const SCHEMA_META_TABLE: &str = "qadash_schema_meta";
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 500;

pub const BUG_INSERT_COLUMNS: &[&str] = &[
    "issue_key",
    "summary",
    "issue_type",
    "status",
    "priority",
    "sprint",
    "sprint_num",
    "developer",
    "module",
    "category",
    "fix_version",
    "environment",
    "created_at",
    "resolved_at",
];

pub const SPRINT_INSERT_COLUMNS: &[&str] = &[
    "sprint",
    "sprint_num",
    "fix_version",
    "test_cases_planned",
    "test_cases_executed",
    "test_cases_automated",
    "production_bugs",
    "avg_resolution_days",
];

const CREATE_BUGS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS bugs_detail (
    issue_key TEXT NOT NULL PRIMARY KEY,
    summary TEXT,
    issue_type TEXT,
    status TEXT,
    priority TEXT,
    sprint TEXT,
    sprint_num INTEGER,
    developer TEXT,
    module TEXT,
    category TEXT,
    fix_version TEXT,
    environment TEXT,
    created_at TEXT,
    resolved_at TEXT
);
"#;

const CREATE_INDEX_BUGS_SPRINT_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_bugs_detail_sprint
ON bugs_detail (sprint_num, sprint);
"#;

const CREATE_INDEX_BUGS_PRIORITY_STATUS_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_bugs_detail_priority_status
ON bugs_detail (priority, status);
"#;

const CREATE_SPRINTS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sprints_versions (
    sprint TEXT NOT NULL PRIMARY KEY,
    sprint_num INTEGER,
    fix_version TEXT,
    test_cases_planned INTEGER NOT NULL DEFAULT 0,
    test_cases_executed INTEGER NOT NULL DEFAULT 0,
    test_cases_automated INTEGER NOT NULL DEFAULT 0,
    production_bugs INTEGER NOT NULL DEFAULT 0,
    avg_resolution_days REAL
);
"#;

const CREATE_DATA_SOURCE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS data_source_metadata (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_file_name TEXT,
    source_file_path TEXT,
    source_file_size INTEGER,
    total_bugs_loaded INTEGER NOT NULL DEFAULT 0,
    total_sprints_loaded INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    notes TEXT,
    load_timestamp TEXT NOT NULL,
    CHECK (status IN ('success', 'partial', 'failed'))
);
"#;

const CREATE_META_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS qadash_schema_meta (
    schema_version TEXT NOT NULL,
    applied_at_utc TEXT NOT NULL
);
"#;

#[must_use]
pub fn schema_statements() -> &'static [&'static str] {
    &[
        CREATE_BUGS_TABLE_SQL,
        CREATE_INDEX_BUGS_SPRINT_SQL,
        CREATE_INDEX_BUGS_PRIORITY_STATUS_SQL,
        CREATE_SPRINTS_TABLE_SQL,
        CREATE_DATA_SOURCE_TABLE_SQL,
        CREATE_META_TABLE_SQL,
    ]
}

#[must_use]
pub fn create_schema_sql() -> String {
    schema_statements().join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteWriterConfig {
    pub batch_size: usize,
}

impl Default for SqliteWriterConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_INSERT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteWriteStats {
    pub input_records: usize,
    pub records_written: usize,
    pub batches_committed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Success,
    Partial,
    Failed,
}

impl LoadStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// One row of `data_source_metadata`, describing a completed import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceLoad {
    pub source_file_name: Option<String>,
    pub source_file_path: Option<String>,
    pub source_file_size: Option<u64>,
    pub total_bugs_loaded: u64,
    pub total_sprints_loaded: u64,
    pub status: LoadStatus,
    pub notes: Option<String>,
}

pub fn open_sqlite_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create sqlite parent directory: {}",
                parent.display()
            )
        })?;
    }

    Connection::open(path)
        .with_context(|| format!("failed to open sqlite database: {}", path.display()))
}

/// Readers never create a database as a side effect.
pub fn open_sqlite_read_only(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        bail!("sqlite database not found: {}", path.display());
    }
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open sqlite database read-only: {}", path.display()))
}

pub fn ensure_sqlite_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(&create_schema_sql())
        .context("failed to create sqlite schema")?;

    if schema_meta_has_version(connection, SQLITE_SCHEMA_VERSION)? {
        return Ok(());
    }

    connection
        .execute(
            &format!(
                "INSERT INTO {SCHEMA_META_TABLE} (schema_version, applied_at_utc) VALUES (?1, ?2)"
            ),
            params![SQLITE_SCHEMA_VERSION, now_utc()],
        )
        .context("failed to write sqlite schema meta row")?;

    Ok(())
}

fn schema_meta_has_version(connection: &Connection, schema_version: &str) -> Result<bool> {
    let query = format!(
        "SELECT EXISTS(SELECT 1 FROM {SCHEMA_META_TABLE} WHERE schema_version = ?1 LIMIT 1)"
    );
    let exists = connection
        .query_row(&query, [schema_version], |row| row.get::<usize, i64>(0))
        .context("failed to query sqlite schema version metadata")?;
    Ok(exists != 0)
}

pub fn table_exists(connection: &Connection, name: &str) -> Result<bool> {
    let exists = connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1)",
            [name],
            |row| row.get::<usize, i64>(0),
        )
        .with_context(|| format!("failed to look up sqlite table `{name}`"))?;
    Ok(exists != 0)
}

/// Upserts bug rows keyed by `issue_key`, one transaction per batch.
pub fn write_bug_records(
    connection: &mut Connection,
    bugs: &[BugRecord],
    config: SqliteWriterConfig,
) -> Result<SqliteWriteStats> {
    let batch_size = config.batch_size.max(1);
    let insert_sql = build_upsert_sql(BUGS_TABLE, BUG_INSERT_COLUMNS, "issue_key");
    let mut records_written = 0usize;
    let mut batches_committed = 0usize;

    for batch in bugs.chunks(batch_size) {
        let tx = connection
            .transaction()
            .context("failed to open sqlite transaction")?;
        {
            let mut statement = tx
                .prepare_cached(&insert_sql)
                .context("failed to prepare bug insert statement")?;

            for bug in batch {
                statement
                    .execute(params_from_iter(bug_insert_values(bug)))
                    .with_context(|| format!("failed to insert issue_key={}", bug.id))?;
                records_written += 1;
            }
        }
        tx.commit()
            .context("failed to commit sqlite batch transaction")?;
        batches_committed += 1;
    }

    Ok(SqliteWriteStats {
        input_records: bugs.len(),
        records_written,
        batches_committed,
    })
}

/// Stores the per-sprint figures bug rows cannot express.
pub fn write_sprint_rows(connection: &mut Connection, sprints: &[SprintSummary]) -> Result<usize> {
    let insert_sql = build_upsert_sql(SPRINTS_TABLE, SPRINT_INSERT_COLUMNS, "sprint");
    let tx = connection
        .transaction()
        .context("failed to open sqlite transaction")?;
    {
        let mut statement = tx
            .prepare_cached(&insert_sql)
            .context("failed to prepare sprint insert statement")?;
        for sprint in sprints {
            statement
                .execute(params_from_iter(sprint_insert_values(sprint)?))
                .with_context(|| format!("failed to insert sprint={}", sprint.sprint_id))?;
        }
    }
    tx.commit()
        .context("failed to commit sqlite sprint transaction")?;
    Ok(sprints.len())
}

pub fn record_data_source_load(connection: &Connection, load: &DataSourceLoad) -> Result<i64> {
    connection
        .execute(
            &format!(
                "INSERT INTO {DATA_SOURCE_TABLE} (
                    source_file_name, source_file_path, source_file_size,
                    total_bugs_loaded, total_sprints_loaded, status, notes, load_timestamp
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                load.source_file_name,
                load.source_file_path,
                opt_int_value(load.source_file_size, "source_file_size")?,
                to_i64(load.total_bugs_loaded, "total_bugs_loaded")?,
                to_i64(load.total_sprints_loaded, "total_sprints_loaded")?,
                load.status.as_str(),
                load.notes,
                now_utc(),
            ],
        )
        .context("failed to record data source load")?;
    Ok(connection.last_insert_rowid())
}

/// Every row of `table` as a column-name keyed JSON object.
pub fn read_table_rows(connection: &Connection, table: &str) -> Result<Vec<Map<String, Value>>> {
    let query = format!("SELECT * FROM {table}");
    let mut statement = connection
        .prepare(&query)
        .with_context(|| format!("failed to prepare sqlite query for `{table}`"))?;
    let columns = statement
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let rows = statement
        .query_map([], |row| {
            let mut object = Map::with_capacity(columns.len());
            for (index, column) in columns.iter().enumerate() {
                let value = row.get::<usize, SqlValue>(index)?;
                object.insert(column.clone(), sql_to_json(value));
            }
            Ok(object)
        })
        .with_context(|| format!("failed to execute sqlite query for `{table}`"))?;

    let mut objects = Vec::new();
    for row in rows {
        objects.push(row.with_context(|| format!("failed to decode `{table}` row"))?);
    }
    Ok(objects)
}

pub fn read_latest_load(connection: &Connection) -> Result<Option<SnapshotMetadata>> {
    if !table_exists(connection, DATA_SOURCE_TABLE)? {
        return Ok(None);
    }

    let query = format!(
        "SELECT source_file_name, source_file_path, source_file_size, total_bugs_loaded,
                total_sprints_loaded, status, notes, load_timestamp
         FROM {DATA_SOURCE_TABLE}
         ORDER BY load_timestamp DESC, rowid DESC
         LIMIT 1"
    );
    connection
        .query_row(&query, [], |row| {
            Ok(SnapshotMetadata {
                version: None,
                source: "sqlite".to_string(),
                generated_at: row.get::<usize, Option<String>>(7)?,
                sprints_count: None,
                source_file_name: row.get(0)?,
                source_file_path: row.get(1)?,
                source_file_size: non_negative(row.get::<usize, Option<i64>>(2)?),
                total_bugs_loaded: non_negative(row.get::<usize, Option<i64>>(3)?),
                total_sprints_loaded: non_negative(row.get::<usize, Option<i64>>(4)?),
                load_status: row.get(5)?,
                notes: row.get(6)?,
            })
        })
        .optional()
        .context("failed to read latest data source load")
}

fn build_upsert_sql(table: &str, columns: &[&str], key: &str) -> String {
    let placeholders = (1..=columns.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let assignments = columns
        .iter()
        .filter(|column| **column != key)
        .map(|column| format!("{column} = excluded.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})
         ON CONFLICT({key}) DO UPDATE SET {assignments}",
        columns.join(", "),
    )
}

fn bug_insert_values(bug: &BugRecord) -> Vec<SqlValue> {
    vec![
        text_value(&bug.id),
        opt_text_value(&bug.summary),
        opt_text_value(&bug.issue_type),
        opt_text_value(&bug.status),
        opt_text_value(&bug.priority),
        text_value(&bug.sprint),
        sprint_number(&bug.sprint).map_or(SqlValue::Null, |number| {
            i64::try_from(number).map_or(SqlValue::Null, SqlValue::Integer)
        }),
        opt_text_value(&bug.developer),
        opt_text_value(&bug.module),
        opt_text_value(&bug.category),
        opt_text_value(&bug.fix_version),
        opt_text_value(&bug.environment),
        bug.created_at.clone().map_or(SqlValue::Null, SqlValue::Text),
        bug.resolved_at.clone().map_or(SqlValue::Null, SqlValue::Text),
    ]
}

fn sprint_insert_values(sprint: &SprintSummary) -> Result<Vec<SqlValue>> {
    Ok(vec![
        text_value(&sprint.sprint_id),
        sprint_number(&sprint.sprint_id).map_or(SqlValue::Null, |number| {
            i64::try_from(number).map_or(SqlValue::Null, SqlValue::Integer)
        }),
        sprint
            .fix_version
            .clone()
            .map_or(SqlValue::Null, SqlValue::Text),
        SqlValue::Integer(to_i64(sprint.test_cases_planned, "test_cases_planned")?),
        SqlValue::Integer(to_i64(sprint.test_cases_executed, "test_cases_executed")?),
        SqlValue::Integer(to_i64(
            sprint.test_cases_automated,
            "test_cases_automated",
        )?),
        SqlValue::Integer(to_i64(sprint.production_bugs, "production_bugs")?),
        sprint
            .avg_resolution_days
            .map_or(SqlValue::Null, SqlValue::Real),
    ])
}

fn to_i64(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value).with_context(|| format!("{field} exceeds sqlite INTEGER range"))
}

fn opt_int_value(value: Option<u64>, field: &str) -> Result<Option<i64>> {
    value.map(|value| to_i64(value, field)).transpose()
}

fn non_negative(value: Option<i64>) -> Option<u64> {
    value.and_then(|value| u64::try_from(value).ok())
}

fn text_value(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}

fn opt_text_value(value: &str) -> SqlValue {
    if value.is_empty() {
        SqlValue::Null
    } else {
        SqlValue::Text(value.to_string())
    }
}

fn sql_to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null | SqlValue::Blob(_) => Value::Null,
        SqlValue::Integer(value) => Value::Number(value.into()),
        SqlValue::Real(value) => Number::from_f64(value).map_or(Value::Null, Value::Number),
        SqlValue::Text(value) => Value::String(value),
    }
}
