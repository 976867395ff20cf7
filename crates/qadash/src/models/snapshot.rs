use std::collections::BTreeMap;

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::records::{BugRecord, SprintSummary};
use super::rollups::{Breakdowns, DeveloperRollup, GroupRollup, PriorityRollup};

pub const SNAPSHOT_FORMAT_VERSION: &str = "qadash.snapshot.v1";

/// Totals as reported by the snapshot producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportedSummary {
    pub total_bugs: u64,
    pub bugs_closed: u64,
    pub critical_bugs: u64,
    pub critical_pending: u64,
    pub test_cases_planned: u64,
    pub test_cases_executed: u64,
    pub production_bugs: u64,
    pub total_sprints: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprints_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file_size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bugs_loaded: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_sprints_loaded: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Canonical in-memory form produced by every adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordSet {
    pub bugs: Vec<BugRecord>,
    pub sprints: Vec<SprintSummary>,
    pub reported: Breakdowns,
    pub summary: ReportedSummary,
    pub metadata: SnapshotMetadata,
    pub warnings: Vec<String>,
}

impl RecordSet {
    #[must_use]
    pub fn with_warning(message: impl Into<String>) -> Self {
        let mut record_set = Self::default();
        record_set.push_warning(message);
        record_set
    }

    pub fn push_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(warning = %message, "record set degraded");
        self.warnings.push(message);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bugs.is_empty() && self.sprints.is_empty()
    }
}

/// On-disk JSON snapshot layout written by `export` and read by the JSON adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    pub metadata: SnapshotMetadata,
    pub summary: ReportedSummary,
    pub sprint_data: Vec<SprintSummary>,
    pub bugs: Vec<BugRecord>,
    pub bugs_by_priority: BTreeMap<String, PriorityRollup>,
    pub bugs_by_module: Vec<GroupRollup>,
    pub bugs_by_category: Vec<GroupRollup>,
    pub developer_data: Vec<DeveloperRollup>,
}

pub fn snapshot_json_schema() -> Result<Value> {
    let schema = schemars::schema_for!(SnapshotDocument);
    serde_json::to_value(schema).context("failed to serialize generated snapshot schema")
}
