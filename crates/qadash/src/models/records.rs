use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::utils::time::parse_timestamp_to_unix_ms;

/// Sprint label used for records that carry no sprint at all.
pub const UNSCHEDULED_SPRINT: &str = "Unscheduled";

const MILLIS_PER_DAY: u64 = 86_400_000;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Major,
    High,
    Medium,
    Low,
    Trivial,
    Other,
}

impl Priority {
    #[must_use]
    pub fn classify(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "major" | "highest" | "critical" | "blocker" | "más alta" | "mas alta" => Self::Major,
            "high" | "alta" => Self::High,
            "medium" | "media" => Self::Medium,
            "low" | "baja" => Self::Low,
            "trivial" | "lowest" | "minor" | "más baja" | "mas baja" => Self::Trivial,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Trivial => "trivial",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::Major)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Pending,
    Resolved,
    Canceled,
}

impl StatusClass {
    #[must_use]
    pub fn classify(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "done" | "closed" | "resolved" | "cerrado" | "resuelto" | "approved for release"
            | "reviewed" | "testing complete" => Self::Resolved,
            "canceled" | "cancelled" | "cancelado" => Self::Canceled,
            _ => Self::Pending,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Canceled => "canceled",
        }
    }
}

/// Lowercased, trimmed form used for every facet and vocabulary comparison.
#[must_use]
pub fn normalize_label(value: &str) -> String {
    value.trim().to_lowercase()
}

/// One issue row: a defect, a test case, or any other tracked item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BugRecord {
    pub id: String,
    pub sprint: String,
    pub priority: String,
    pub status: String,

    #[serde(rename = "type")]
    pub issue_type: String,

    pub developer: String,
    pub module: String,
    pub category: String,
    pub fix_version: String,
    pub environment: String,
    pub summary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
}

impl BugRecord {
    #[must_use]
    pub fn priority_class(&self) -> Priority {
        Priority::classify(&self.priority)
    }

    #[must_use]
    pub fn status_class(&self) -> StatusClass {
        StatusClass::classify(&self.status)
    }

    /// Rows without a type come from defect-only exports and count as bugs.
    #[must_use]
    pub fn is_defect(&self) -> bool {
        let issue_type = normalize_label(&self.issue_type);
        issue_type.is_empty() || issue_type == "bug"
    }

    #[must_use]
    pub fn is_test_case(&self) -> bool {
        let issue_type = normalize_label(&self.issue_type);
        if matches!(issue_type.as_str(), "test" | "test case" | "testcase" | "caso de prueba") {
            return true;
        }
        !self.is_defect() && normalize_label(&self.summary).contains("test")
    }

    #[must_use]
    pub fn is_executed_test(&self) -> bool {
        self.is_test_case()
            && matches!(
                normalize_label(&self.status).as_str(),
                "done" | "approved for release" | "reviewed" | "testing complete" | "closed"
            )
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        match self.status_class() {
            StatusClass::Resolved => true,
            StatusClass::Canceled => false,
            StatusClass::Pending => self.resolved_at.is_some(),
        }
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.status_class() == StatusClass::Canceled
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.is_resolved() && !self.is_canceled()
    }

    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.priority_class().is_critical()
    }

    /// Critical backlog: Major items that nobody has started finishing yet.
    #[must_use]
    pub fn is_critical_pending(&self) -> bool {
        self.is_critical()
            && matches!(
                normalize_label(&self.status).as_str(),
                "to do" | "in development" | "tareas por hacer" | "en curso"
            )
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        let environment = normalize_label(&self.environment);
        environment.contains("prod")
    }

    /// Milliseconds between creation and resolution, when both are known and ordered.
    #[must_use]
    pub fn resolution_ms(&self) -> Option<u64> {
        let created = parse_timestamp_to_unix_ms(self.created_at.as_deref()?).ok()?;
        let resolved = parse_timestamp_to_unix_ms(self.resolved_at.as_deref()?).ok()?;
        resolved.checked_sub(created)
    }
}

#[must_use]
pub const fn millis_per_day() -> u64 {
    MILLIS_PER_DAY
}

/// Per-sprint rollup. Derived from bug rows whenever they exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SprintSummary {
    #[serde(rename = "sprint")]
    pub sprint_id: String,

    #[serde(rename = "bugs")]
    pub total_bugs: u64,

    #[serde(rename = "bugsResolved")]
    pub resolved_bugs: u64,

    #[serde(rename = "bugsPending")]
    pub pending_bugs: u64,

    pub critical_bugs: u64,

    #[serde(rename = "criticalBugsPending")]
    pub critical_pending: u64,

    pub test_cases_planned: u64,
    pub test_cases_executed: u64,
    pub test_cases_automated: u64,
    pub production_bugs: u64,

    #[serde(
        rename = "avgResolutionTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub avg_resolution_days: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_version: Option<String>,
}

impl SprintSummary {
    #[must_use]
    pub fn empty(sprint_id: impl Into<String>) -> Self {
        Self {
            sprint_id: sprint_id.into(),
            ..Self::default()
        }
    }
}
