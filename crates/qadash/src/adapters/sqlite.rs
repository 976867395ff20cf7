use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde_json::{Map, Value};

use super::{SourceKind, adapt_bug_object, adapt_sprint_object};
use crate::cache::{FetchContext, SnapshotSource};
use crate::models::{RecordSet, SnapshotMetadata};
use crate::sqlite::{
    BUGS_TABLE, SPRINTS_TABLE, open_sqlite_read_only, read_latest_load, read_table_rows,
    table_exists,
};

/// Adapts raw `bugs_detail` rows. Column names go through the same alias
/// tables as JSON keys, so renamed columns keep working.
#[must_use]
pub fn adapt_rows(rows: &[Map<String, Value>]) -> RecordSet {
    let mut warnings = Vec::new();
    let bugs = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let context = format!("{BUGS_TABLE}[{index}]");
            let fallback_id = format!("bug-{}", index + 1);
            adapt_bug_object(row, &context, &fallback_id, &mut warnings)
        })
        .collect();

    RecordSet {
        bugs,
        warnings,
        metadata: SnapshotMetadata {
            source: SourceKind::Sqlite.as_str().to_string(),
            ..SnapshotMetadata::default()
        },
        ..RecordSet::default()
    }
}

pub fn read_sqlite_records(path: &Path) -> Result<RecordSet> {
    read_sqlite_records_with(path, None)
}

fn read_sqlite_records_with(path: &Path, ctx: Option<&FetchContext>) -> Result<RecordSet> {
    let checkpoint = || ctx.map_or(Ok(()), FetchContext::ensure_active);

    let connection = open_sqlite_read_only(path)?;
    if !table_exists(&connection, BUGS_TABLE)? {
        bail!(
            "sqlite database {} has no `{BUGS_TABLE}` table",
            path.display()
        );
    }

    let rows = read_table_rows(&connection, BUGS_TABLE)?;
    checkpoint()?;
    let mut record_set = adapt_rows(&rows);

    if table_exists(&connection, SPRINTS_TABLE)? {
        let sprint_rows = read_table_rows(&connection, SPRINTS_TABLE)?;
        checkpoint()?;
        record_set.sprints = sprint_rows
            .iter()
            .enumerate()
            .filter_map(|(index, row)| {
                let context = format!("{SPRINTS_TABLE}[{index}]");
                adapt_sprint_object(row, &context, &mut record_set.warnings)
            })
            .collect();
    }

    if let Some(metadata) = read_latest_load(&connection)? {
        record_set.metadata = metadata;
    }
    if record_set.metadata.source_file_path.is_none() {
        record_set.metadata.source_file_path = Some(path.display().to_string());
    }

    tracing::debug!(
        path = %path.display(),
        bugs = record_set.bugs.len(),
        sprints = record_set.sprints.len(),
        "loaded sqlite records"
    );
    Ok(record_set)
}

/// Reads the normalized SQLite store.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    path: PathBuf,
}

impl SqliteSource {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for SqliteSource {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn load(&self, ctx: &FetchContext) -> Result<RecordSet> {
        ctx.ensure_active()?;
        read_sqlite_records_with(&self.path, Some(ctx))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::adapt_rows;

    #[test]
    fn rows_use_column_aliases() {
        let row = json!({
            "issue_key": "QA-7",
            "sprint": "Sprint 3",
            "sprint_num": 3,
            "issue_type": "Bug",
            "priority": "High",
            "status": "Done",
            "fix_version": "1.4.0",
            "resolved_at": Value::Null
        });
        let rows = vec![row.as_object().cloned().expect("row should be an object")];

        let record_set = adapt_rows(&rows);

        assert_eq!(record_set.metadata.source, "sqlite");
        assert_eq!(record_set.bugs[0].id, "QA-7");
        assert_eq!(record_set.bugs[0].issue_type, "Bug");
        assert_eq!(record_set.bugs[0].fix_version, "1.4.0");
        assert!(record_set.bugs[0].resolved_at.is_none());
    }
}
