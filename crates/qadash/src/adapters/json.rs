use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

use super::aliases::{AliasResolver, FieldAliases, lookup, rollup, section, summary};
use super::{SourceKind, adapt_bug_object, adapt_sprint_object};
use crate::cache::{FetchContext, SnapshotSource};
use crate::models::{
    Breakdowns, DeveloperRollup, GroupRollup, PriorityRollup, RecordSet, ReportedSummary,
    SnapshotMetadata, Workload,
};
use crate::utils::ratio::percent;

pub fn parse_snapshot_file(path: &Path) -> Result<RecordSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read JSON snapshot: {path:?}"))?;
    parse_snapshot_str(&content)
        .with_context(|| format!("failed to parse JSON snapshot: {path:?}"))
}

/// Syntax errors fail; structural problems only degrade the result.
pub fn parse_snapshot_str(input: &str) -> Result<RecordSet> {
    let parsed =
        serde_json::from_str::<Value>(input).context("snapshot payload must be valid JSON")?;
    Ok(adapt_snapshot(&parsed))
}

/// Normalizes any historical snapshot layout into a [`RecordSet`].
///
/// Never fails: a root that is not an object yields an empty set with a
/// warning, and malformed sections are skipped the same way.
#[must_use]
pub fn adapt_snapshot(value: &Value) -> RecordSet {
    let Some(root) = value.as_object() else {
        return RecordSet::with_warning("snapshot root is not a JSON object; no records loaded");
    };

    let mut warnings = Vec::new();

    let bugs = section_rows(root, &section::BUGS, &mut warnings)
        .into_iter()
        .map(|(index, object)| {
            let context = format!("{}[{index}]", section::BUGS.field);
            let fallback_id = format!("bug-{}", index + 1);
            adapt_bug_object(object, &context, &fallback_id, &mut warnings)
        })
        .collect::<Vec<_>>();

    let sprints = section_rows(root, &section::SPRINTS, &mut warnings)
        .into_iter()
        .filter_map(|(index, object)| {
            let context = format!("{}[{index}]", section::SPRINTS.field);
            adapt_sprint_object(object, &context, &mut warnings)
        })
        .collect::<Vec<_>>();

    let summary = section_object(root, &section::SUMMARY, &mut warnings)
        .map(|object| adapt_summary(object, &mut warnings))
        .unwrap_or_default();

    let reported = Breakdowns {
        by_priority: section_object(root, &section::BY_PRIORITY, &mut warnings)
            .map(|object| adapt_priority_map(object, &mut warnings))
            .unwrap_or_default(),
        by_module: adapt_groups(root, &section::BY_MODULE, &rollup::MODULE_NAME, &mut warnings),
        by_category: adapt_groups(
            root,
            &section::BY_CATEGORY,
            &rollup::CATEGORY_NAME,
            &mut warnings,
        ),
        developers: adapt_developers(root, &mut warnings),
    };

    let metadata = adapt_metadata(root, &mut warnings);

    for warning in &warnings {
        tracing::debug!(%warning, "snapshot adapter warning");
    }

    RecordSet {
        bugs,
        sprints,
        reported,
        summary,
        metadata,
        warnings,
    }
}

fn section_rows<'a>(
    root: &'a Map<String, Value>,
    aliases: &FieldAliases,
    warnings: &mut Vec<String>,
) -> Vec<(usize, &'a Map<String, Value>)> {
    let Some(value) = lookup(root, aliases) else {
        return Vec::new();
    };
    let Some(rows) = value.as_array() else {
        push_warning(
            warnings,
            format!("`{}` is not an array; ignored", aliases.field),
        );
        return Vec::new();
    };

    let mut objects = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        match row.as_object() {
            Some(object) => objects.push((index, object)),
            None => push_warning(
                warnings,
                format!("{}[{index}]: entry is not an object; skipped", aliases.field),
            ),
        }
    }
    objects
}

fn section_object<'a>(
    root: &'a Map<String, Value>,
    aliases: &FieldAliases,
    warnings: &mut Vec<String>,
) -> Option<&'a Map<String, Value>> {
    let value = lookup(root, aliases)?;
    let object = value.as_object();
    if object.is_none() {
        push_warning(
            warnings,
            format!("`{}` is not an object; ignored", aliases.field),
        );
    }
    object
}

fn adapt_summary(object: &Map<String, Value>, warnings: &mut Vec<String>) -> ReportedSummary {
    let mut resolver = AliasResolver::new(object, section::SUMMARY.field, warnings);
    ReportedSummary {
        total_bugs: resolver.count(&summary::TOTAL_BUGS),
        bugs_closed: resolver.count(&summary::BUGS_CLOSED),
        critical_bugs: resolver.count(&summary::CRITICAL),
        critical_pending: resolver.count(&summary::CRITICAL_PENDING),
        test_cases_planned: resolver.count(&summary::TESTS_PLANNED),
        test_cases_executed: resolver.count(&summary::TESTS_EXECUTED),
        production_bugs: resolver.count(&summary::PRODUCTION),
        total_sprints: resolver.count(&summary::TOTAL_SPRINTS),
    }
}

/// Accepts both `{"Major": 4}` and `{"Major": {"count": 4, "pending": 1}}`.
fn adapt_priority_map(
    object: &Map<String, Value>,
    warnings: &mut Vec<String>,
) -> BTreeMap<String, PriorityRollup> {
    let mut by_priority = BTreeMap::new();
    for (label, value) in object {
        let context = format!("{}.{label}", section::BY_PRIORITY.field);
        let rollup_row = match value {
            Value::Object(fields) => {
                let mut resolver = AliasResolver::new(fields, &context, warnings);
                PriorityRollup {
                    count: resolver.count(&rollup::COUNT),
                    pending: resolver.count(&rollup::PENDING),
                    resolved: resolver.count(&rollup::RESOLVED),
                    canceled: resolver.count(&rollup::CANCELED),
                }
            }
            Value::Number(number) if number.as_u64().is_some() => PriorityRollup {
                count: number.as_u64().unwrap_or(0),
                ..PriorityRollup::default()
            },
            other => {
                push_warning(
                    warnings,
                    format!("{context}: unparseable value {other}; using 0"),
                );
                PriorityRollup::default()
            }
        };
        by_priority.insert(label.trim().to_string(), rollup_row);
    }
    by_priority
}

fn adapt_groups(
    root: &Map<String, Value>,
    aliases: &FieldAliases,
    name_aliases: &FieldAliases,
    warnings: &mut Vec<String>,
) -> Vec<GroupRollup> {
    let rows = section_rows(root, aliases, warnings);
    let mut groups = Vec::with_capacity(rows.len());
    for (index, object) in rows {
        let context = format!("{}[{index}]", aliases.field);
        let mut resolver = AliasResolver::new(object, &context, warnings);
        let Some(name) = resolver.text(name_aliases) else {
            continue;
        };
        groups.push(GroupRollup {
            name,
            count: resolver.count(&rollup::COUNT),
            pending: resolver.count(&rollup::PENDING),
            resolved: resolver.count(&rollup::RESOLVED),
        });
    }
    groups
}

fn adapt_developers(
    root: &Map<String, Value>,
    warnings: &mut Vec<String>,
) -> Vec<DeveloperRollup> {
    let rows = section_rows(root, &section::DEVELOPERS, warnings);
    let mut developers = Vec::with_capacity(rows.len());
    for (index, object) in rows {
        let context = format!("{}[{index}]", section::DEVELOPERS.field);
        let mut resolver = AliasResolver::new(object, &context, warnings);
        let Some(developer) = resolver.text(&rollup::DEVELOPER_NAME) else {
            continue;
        };

        let total = resolver.count(&rollup::DEVELOPER_TOTAL);
        let pending = resolver.count(&rollup::PENDING);
        let resolved = resolver
            .optional_count(&rollup::RESOLVED)
            .unwrap_or_else(|| total.saturating_sub(pending));
        let efficiency_pct = resolver
            .optional_count(&rollup::EFFICIENCY)
            .unwrap_or_else(|| percent(total.saturating_sub(pending), total));
        let workload = resolver
            .text(&rollup::WORKLOAD)
            .and_then(|label| Workload::parse(&label))
            .unwrap_or_else(|| Workload::from_pending(pending));

        developers.push(DeveloperRollup {
            developer,
            total,
            pending,
            resolved,
            efficiency_pct,
            workload,
        });
    }
    developers
}

fn adapt_metadata(root: &Map<String, Value>, warnings: &mut Vec<String>) -> SnapshotMetadata {
    let mut metadata = match lookup(root, &section::METADATA) {
        Some(value) => match serde_json::from_value::<SnapshotMetadata>(value.clone()) {
            Ok(metadata) => metadata,
            Err(error) => {
                push_warning(
                    warnings,
                    format!("`metadata` could not be read ({error}); ignored"),
                );
                SnapshotMetadata::default()
            }
        },
        None => SnapshotMetadata::default(),
    };

    if metadata.source.trim().is_empty() {
        metadata.source = SourceKind::Json.as_str().to_string();
    }
    metadata
}

fn push_warning(warnings: &mut Vec<String>, message: String) {
    tracing::warn!(warning = %message, "snapshot section skipped");
    warnings.push(message);
}

/// Reads the cached JSON snapshot from disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for JsonFileSource {
    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }

    fn load(&self, ctx: &FetchContext) -> Result<RecordSet> {
        if !self.path.is_file() {
            bail!("JSON snapshot not found: {:?}", self.path);
        }
        ctx.ensure_active()?;
        let mut record_set = parse_snapshot_file(&self.path)?;
        ctx.ensure_active()?;
        if record_set.metadata.source_file_path.is_none() {
            record_set.metadata.source_file_path = Some(self.path.display().to_string());
        }
        Ok(record_set)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{adapt_snapshot, parse_snapshot_str};
    use crate::models::Workload;

    #[test]
    fn non_object_root_yields_empty_records_with_warning() {
        let record_set = adapt_snapshot(&json!([1, 2, 3]));
        assert!(record_set.is_empty());
        assert_eq!(record_set.warnings.len(), 1);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = parse_snapshot_str("{not json").expect_err("syntax errors should fail");
        assert!(err.to_string().contains("valid JSON"));
    }

    #[test]
    fn wrong_section_types_are_skipped() {
        let record_set = adapt_snapshot(&json!({
            "sprintData": "oops",
            "bugs": [42, {"id": "QA-1", "sprint": "Sprint 1"}]
        }));

        assert!(record_set.sprints.is_empty());
        assert_eq!(record_set.bugs.len(), 1);
        assert_eq!(record_set.warnings.len(), 2);
    }

    #[test]
    fn priority_breakdown_accepts_plain_counts() {
        let record_set = adapt_snapshot(&json!({
            "bugsByPriority": {"Major": 4, "Media": {"count": 3, "pending": 1}}
        }));

        let by_priority = &record_set.reported.by_priority;
        assert_eq!(by_priority["Major"].count, 4);
        assert_eq!(by_priority["Media"].pending, 1);
    }

    #[test]
    fn developer_rows_derive_efficiency_and_workload() {
        let record_set = adapt_snapshot(&json!({
            "developerData": [
                {"developer_name": "Ana", "total_bugs": 20, "pending": 16},
                {"name": "Luis", "total": 10, "pending": 2, "workload_level": "Medio"}
            ]
        }));

        let developers = &record_set.reported.developers;
        assert_eq!(developers[0].efficiency_pct, 20);
        assert_eq!(developers[0].workload, Workload::High);
        assert_eq!(developers[1].resolved, 8);
        assert_eq!(developers[1].workload, Workload::Medium);
    }

    #[test]
    fn metadata_defaults_source_to_json() {
        let record_set = adapt_snapshot(&json!({"metadata": {"version": "2.0"}}));
        assert_eq!(record_set.metadata.source, "json");
        assert_eq!(record_set.metadata.version.as_deref(), Some("2.0"));
    }
}
