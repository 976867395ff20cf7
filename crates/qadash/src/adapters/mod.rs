pub mod aliases;
pub mod json;
pub mod sqlite;

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use serde_json::{Map, Value};

use self::aliases::{AliasResolver, bug, sprint};
use crate::cache::{FetchContext, SnapshotSource};
use crate::models::{BugRecord, RecordSet, SprintSummary, UNSCHEDULED_SPRINT};
use crate::utils::time::normalize_timestamp;

pub use self::json::{JsonFileSource, adapt_snapshot, parse_snapshot_file, parse_snapshot_str};
pub use self::sqlite::{SqliteSource, adapt_rows, read_sqlite_records};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Json,
    Sqlite,
}

impl SourceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Maps one loosely named bug row onto the canonical record.
pub fn adapt_bug_object(
    object: &Map<String, Value>,
    context: &str,
    fallback_id: &str,
    warnings: &mut Vec<String>,
) -> BugRecord {
    let resolver = AliasResolver::new(object, context, warnings);

    let id = resolver
        .text(&bug::ID)
        .unwrap_or_else(|| fallback_id.to_string());
    let sprint = resolver
        .text(&bug::SPRINT)
        .unwrap_or_else(|| UNSCHEDULED_SPRINT.to_string());
    let created_raw = resolver.text(&bug::CREATED_AT);
    let resolved_raw = resolver.text(&bug::RESOLVED_AT);

    let mut record = BugRecord {
        id,
        sprint,
        priority: resolver.text_or_empty(&bug::PRIORITY),
        status: resolver.text_or_empty(&bug::STATUS),
        issue_type: resolver.text_or_empty(&bug::TYPE),
        developer: resolver.text_or_empty(&bug::DEVELOPER),
        module: resolver.text_or_empty(&bug::MODULE),
        category: resolver.text_or_empty(&bug::CATEGORY),
        fix_version: resolver.text_or_empty(&bug::FIX_VERSION),
        environment: resolver.text_or_empty(&bug::ENVIRONMENT),
        summary: resolver.text_or_empty(&bug::SUMMARY),
        created_at: None,
        resolved_at: None,
    };

    record.created_at = created_raw.and_then(|raw| timestamp_or_warn(&raw, context, warnings));
    record.resolved_at = resolved_raw.and_then(|raw| timestamp_or_warn(&raw, context, warnings));
    record
}

/// Maps one pre-aggregated sprint row. Rows without any sprint label are skipped.
pub fn adapt_sprint_object(
    object: &Map<String, Value>,
    context: &str,
    warnings: &mut Vec<String>,
) -> Option<SprintSummary> {
    let mut resolver = AliasResolver::new(object, context, warnings);
    let Some(sprint_id) = resolver.text(&sprint::ID) else {
        let message = format!("{context}: sprint row has no sprint label; skipped");
        tracing::warn!(%context, "sprint row without label");
        warnings.push(message);
        return None;
    };

    let total_bugs = resolver.count(&sprint::BUGS);
    let resolved_bugs = resolver.count(&sprint::RESOLVED);
    let pending_bugs = resolver
        .optional_count(&sprint::PENDING)
        .unwrap_or_else(|| total_bugs.saturating_sub(resolved_bugs));

    Some(SprintSummary {
        sprint_id,
        total_bugs,
        resolved_bugs,
        pending_bugs,
        critical_bugs: resolver.count(&sprint::CRITICAL),
        critical_pending: resolver.count(&sprint::CRITICAL_PENDING),
        test_cases_planned: resolver.count(&sprint::TESTS_PLANNED),
        test_cases_executed: resolver.count(&sprint::TESTS_EXECUTED),
        test_cases_automated: resolver.count(&sprint::TESTS_AUTOMATED),
        production_bugs: resolver.count(&sprint::PRODUCTION),
        avg_resolution_days: resolver.decimal(&sprint::AVG_RESOLUTION),
        fix_version: resolver.text(&sprint::FIX_VERSION),
    })
}

fn timestamp_or_warn(raw: &str, context: &str, warnings: &mut Vec<String>) -> Option<String> {
    match normalize_timestamp(raw) {
        Ok(normalized) => Some(normalized),
        Err(error) => {
            tracing::warn!(%context, %error, "unparseable timestamp");
            warnings.push(format!("{context}: {error:#}; ignored"));
            None
        }
    }
}

/// Tries each source in order and returns the first one that loads.
pub struct FallbackSource {
    sources: Vec<Box<dyn SnapshotSource>>,
}

impl FallbackSource {
    #[must_use]
    pub fn new(sources: Vec<Box<dyn SnapshotSource>>) -> Self {
        Self { sources }
    }

    /// JSON snapshot first, then the SQLite store, matching how the dashboard
    /// has always looked for data.
    #[must_use]
    pub fn json_then_sqlite(json_path: PathBuf, sqlite_path: Option<PathBuf>) -> Self {
        let mut sources: Vec<Box<dyn SnapshotSource>> =
            vec![Box::new(JsonFileSource::new(json_path))];
        if let Some(sqlite_path) = sqlite_path {
            sources.push(Box::new(SqliteSource::new(sqlite_path)));
        }
        Self::new(sources)
    }
}

impl SnapshotSource for FallbackSource {
    fn describe(&self) -> String {
        let names = self
            .sources
            .iter()
            .map(|source| source.describe())
            .collect::<Vec<_>>();
        format!("fallback[{}]", names.join(", "))
    }

    fn load(&self, ctx: &FetchContext) -> Result<RecordSet> {
        let mut failures = Vec::new();
        for source in &self.sources {
            ctx.ensure_active()?;
            match source.load(ctx) {
                Ok(mut record_set) => {
                    for failure in &failures {
                        record_set.push_warning(format!("skipped source: {failure}"));
                    }
                    return Ok(record_set);
                }
                Err(error) => {
                    let failure = format!("{}: {error:#}", source.describe());
                    tracing::warn!(%failure, "source unavailable");
                    failures.push(failure);
                }
            }
        }

        Err(anyhow!("no data source could be loaded: {}", failures.join("; ")))
    }
}
