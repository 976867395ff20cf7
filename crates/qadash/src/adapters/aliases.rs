//! Historical field names accepted by the adapters, in lookup priority order.
//!
//! Every snapshot generation and database layout the dashboard has shipped
//! with named its fields differently. Resolution happens here once, so the
//! rest of the crate only ever sees canonical records.
//!
//! Only absent, `null` and blank-string values fall through to the next
//! alias. A present `0` is a real value and wins over later aliases, unlike
//! the dashboard's JavaScript loader, which skipped any falsy value.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy)]
pub struct FieldAliases {
    pub field: &'static str,
    pub aliases: &'static [&'static str],
}

const fn aliases(field: &'static str, aliases: &'static [&'static str]) -> FieldAliases {
    FieldAliases { field, aliases }
}

/// Top-level sections of a JSON snapshot.
pub mod section {
    use super::{FieldAliases, aliases};

    pub const SPRINTS: FieldAliases = aliases("sprintData", &["sprintData", "sprints"]);
    pub const BUGS: FieldAliases = aliases("bugs", &["bugs", "bugsDetail", "bugs_detail"]);
    pub const SUMMARY: FieldAliases = aliases("summary", &["summary", "resumen"]);
    pub const BY_PRIORITY: FieldAliases = aliases("bugsByPriority", &["bugsByPriority"]);
    pub const BY_MODULE: FieldAliases = aliases("bugsByModule", &["bugsByModule"]);
    pub const BY_CATEGORY: FieldAliases = aliases("bugsByCategory", &["bugsByCategory"]);
    pub const DEVELOPERS: FieldAliases =
        aliases("developerData", &["developerData", "developers"]);
    pub const METADATA: FieldAliases = aliases("metadata", &["metadata"]);
}

pub mod sprint {
    use super::{FieldAliases, aliases};

    pub const ID: FieldAliases = aliases("sprint", &["sprint", "sprintName", "name", "id"]);
    pub const BUGS: FieldAliases =
        aliases("bugs", &["bugs", "bugsFound", "bugs_encontrados", "total"]);
    pub const RESOLVED: FieldAliases = aliases(
        "bugsResolved",
        &["bugsResolved", "bugsClosed", "bugs_resueltos", "resolved"],
    );
    pub const PENDING: FieldAliases =
        aliases("bugsPending", &["bugsPending", "pending", "bugs_pendientes"]);
    pub const CRITICAL: FieldAliases = aliases(
        "criticalBugs",
        &["criticalBugs", "criticalBugsTotal", "critical", "bugs_criticos"],
    );
    pub const CRITICAL_PENDING: FieldAliases = aliases(
        "criticalBugsPending",
        &[
            "criticalBugsPending",
            "critical_pending",
            "criticalPending",
            "bugs_criticos_pendientes",
        ],
    );
    pub const TESTS_PLANNED: FieldAliases = aliases(
        "testCasesPlanned",
        &[
            "testCasesPlanned",
            "testPlanned",
            "testCasesTotal",
            "test_cases_planned",
            "casos_planeados",
        ],
    );
    pub const TESTS_EXECUTED: FieldAliases = aliases(
        "testCasesExecuted",
        &[
            "testCasesExecuted",
            "testCases",
            "test_cases_executed",
            "casos_ejecutados",
        ],
    );
    pub const TESTS_AUTOMATED: FieldAliases = aliases(
        "testCasesAutomated",
        &[
            "testCasesAutomated",
            "automatedTests",
            "test_cases_automated",
            "casos_automatizados",
        ],
    );
    pub const PRODUCTION: FieldAliases = aliases(
        "productionBugs",
        &["productionBugs", "production_bugs", "bugs_produccion"],
    );
    pub const AVG_RESOLUTION: FieldAliases = aliases(
        "avgResolutionTime",
        &[
            "avgResolutionTime",
            "avg_resolution_time",
            "avg_resolution_days",
            "tiempo_resolucion_promedio",
        ],
    );
    pub const FIX_VERSION: FieldAliases = aliases(
        "fixVersion",
        &["fixVersion", "fix_version", "version", "release"],
    );
}

pub mod bug {
    use super::{FieldAliases, aliases};

    pub const ID: FieldAliases = aliases(
        "id",
        &["id", "key", "issueKey", "issue_key", "clave_incidencia"],
    );
    pub const SPRINT: FieldAliases = aliases("sprint", &["sprint", "sprintName", "sprint_name"]);
    pub const PRIORITY: FieldAliases = aliases("priority", &["priority", "prioridad"]);
    pub const STATUS: FieldAliases = aliases("status", &["status", "estado"]);
    pub const TYPE: FieldAliases = aliases(
        "type",
        &["type", "issueType", "issue_type", "tipo_incidencia"],
    );
    pub const DEVELOPER: FieldAliases = aliases(
        "developer",
        &[
            "developer",
            "developer_name",
            "developerName",
            "assignee",
            "asignado_a",
        ],
    );
    pub const MODULE: FieldAliases = aliases("module", &["module", "modulo"]);
    pub const CATEGORY: FieldAliases = aliases("category", &["category", "categoria"]);
    pub const FIX_VERSION: FieldAliases = aliases(
        "fixVersion",
        &[
            "fixVersion",
            "fix_version",
            "fixedVersion",
            "Version de correccion 1",
            "version_de_correccion_1",
        ],
    );
    pub const ENVIRONMENT: FieldAliases = aliases("environment", &["environment", "ambiente"]);
    pub const SUMMARY: FieldAliases = aliases("summary", &["summary", "resumen", "title"]);
    pub const CREATED_AT: FieldAliases = aliases(
        "createdAt",
        &[
            "createdAt",
            "created_at",
            "created",
            "creado",
            "fecha_creacion",
        ],
    );
    pub const RESOLVED_AT: FieldAliases = aliases(
        "resolvedAt",
        &[
            "resolvedAt",
            "resolved_at",
            "resolved",
            "resuelto",
            "fecha_resolucion",
        ],
    );
}

pub mod summary {
    use super::{FieldAliases, aliases};

    pub const TOTAL_BUGS: FieldAliases =
        aliases("totalBugs", &["totalBugs", "total_bugs", "total"]);
    pub const BUGS_CLOSED: FieldAliases =
        aliases("bugsClosed", &["bugsClosed", "bugs_closed", "resolved"]);
    pub const CRITICAL: FieldAliases = aliases(
        "criticalBugs",
        &["criticalBugs", "totalCritical", "total_critical", "critical"],
    );
    pub const CRITICAL_PENDING: FieldAliases =
        aliases("criticalPending", &["criticalPending", "critical_pending"]);
    pub const TESTS_PLANNED: FieldAliases =
        aliases("testCasesPlanned", &["testCasesPlanned", "testCasesTotal"]);
    pub const TESTS_EXECUTED: FieldAliases =
        aliases("testCasesExecuted", &["testCasesExecuted", "testCases"]);
    pub const PRODUCTION: FieldAliases =
        aliases("productionBugs", &["productionBugs", "production_bugs"]);
    pub const TOTAL_SPRINTS: FieldAliases =
        aliases("totalSprints", &["totalSprints", "total_sprints"]);
}

pub mod rollup {
    use super::{FieldAliases, aliases};

    pub const MODULE_NAME: FieldAliases = aliases("name", &["name", "module", "modulo"]);
    pub const CATEGORY_NAME: FieldAliases = aliases("name", &["name", "category", "categoria"]);
    pub const COUNT: FieldAliases = aliases("count", &["count", "total", "bugs"]);
    pub const PENDING: FieldAliases = aliases("pending", &["pending", "pendientes"]);
    pub const RESOLVED: FieldAliases = aliases("resolved", &["resolved", "resueltos"]);
    pub const CANCELED: FieldAliases = aliases("canceled", &["canceled", "cancelled"]);
    pub const DEVELOPER_NAME: FieldAliases =
        aliases("developer", &["developer", "developer_name", "name"]);
    pub const DEVELOPER_TOTAL: FieldAliases =
        aliases("total", &["total", "total_bugs", "count"]);
    pub const EFFICIENCY: FieldAliases = aliases(
        "efficiency_pct",
        &["efficiency_pct", "efficiency_percentage", "efficiency"],
    );
    pub const WORKLOAD: FieldAliases = aliases("workload", &["workload", "workload_level"]);
}

/// Accumulates per-field problems while a single object is resolved.
#[derive(Debug)]
pub struct AliasResolver<'a> {
    object: &'a Map<String, Value>,
    context: String,
    warnings: &'a mut Vec<String>,
}

impl<'a> AliasResolver<'a> {
    pub fn new(
        object: &'a Map<String, Value>,
        context: impl Into<String>,
        warnings: &'a mut Vec<String>,
    ) -> Self {
        Self {
            object,
            context: context.into(),
            warnings,
        }
    }

    /// First alias holding a non-null, non-blank value.
    #[must_use]
    pub fn lookup(&self, aliases: &FieldAliases) -> Option<&'a Value> {
        lookup(self.object, aliases)
    }

    #[must_use]
    pub fn text(&self, aliases: &FieldAliases) -> Option<String> {
        match self.lookup(aliases)? {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    #[must_use]
    pub fn text_or_empty(&self, aliases: &FieldAliases) -> String {
        self.text(aliases).unwrap_or_default()
    }

    /// Missing counts default to 0; unparseable counts become 0 with a warning.
    pub fn count(&mut self, aliases: &FieldAliases) -> u64 {
        self.optional_count(aliases).unwrap_or(0)
    }

    pub fn optional_count(&mut self, aliases: &FieldAliases) -> Option<u64> {
        let value = self.lookup(aliases)?;
        match parse_count(value) {
            Some(count) => Some(count),
            None => {
                self.warn(aliases, value);
                Some(0)
            }
        }
    }

    pub fn decimal(&mut self, aliases: &FieldAliases) -> Option<f64> {
        let value = self.lookup(aliases)?;
        let parsed = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|parsed| parsed.is_finite() && *parsed >= 0.0);

        if parsed.is_none() {
            self.warn(aliases, value);
        }
        parsed
    }

    fn warn(&mut self, aliases: &FieldAliases, value: &Value) {
        let message = format!(
            "{}: field `{}` has unparseable value {value}; using 0",
            self.context, aliases.field
        );
        tracing::warn!(context = %self.context, field = aliases.field, "unparseable numeric field");
        self.warnings.push(message);
    }
}

#[must_use]
pub fn lookup<'a>(object: &'a Map<String, Value>, aliases: &FieldAliases) -> Option<&'a Value> {
    aliases.aliases.iter().find_map(|alias| {
        object.get(*alias).filter(|value| match value {
            Value::Null => false,
            Value::String(text) => !text.trim().is_empty(),
            _ => true,
        })
    })
}

fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().and_then(whole_non_negative)),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed
                .parse::<u64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(whole_non_negative))
        }
        _ => None,
    }
}

fn whole_non_negative(value: f64) -> Option<u64> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}
