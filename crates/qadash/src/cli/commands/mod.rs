pub mod breakdown;
pub mod export;
pub mod facets;
pub mod import;
pub mod kpis;
pub mod schema;
pub mod series;

use anyhow::{Error, Result};
use clap::Args;
use serde::Serialize;
use serde_json::{Value, json};

use crate::adapters::FallbackSource;
use crate::cache::{RefreshPolicy, SnapshotCache, SnapshotView};
use crate::config::RuntimePaths;
use crate::filter::{Facet, FilterState};
use crate::models::{Freshness, ResponseEnvelope, ResponseEnvelopeFailure};
use crate::utils::time::format_unix_ms;

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub paths: RuntimePaths,
    pub policy: RefreshPolicy,
}

/// Facet flags shared by the read commands. Each flag repeats and also
/// accepts comma-separated values.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    #[arg(long = "sprint", value_name = "SPRINT", value_delimiter = ',')]
    pub sprints: Vec<String>,

    #[arg(long = "status", value_name = "STATUS", value_delimiter = ',')]
    pub statuses: Vec<String>,

    #[arg(long = "priority", value_name = "PRIORITY", value_delimiter = ',')]
    pub priorities: Vec<String>,

    #[arg(long = "developer", value_name = "DEVELOPER", value_delimiter = ',')]
    pub developers: Vec<String>,

    #[arg(long = "category", value_name = "CATEGORY", value_delimiter = ',')]
    pub categories: Vec<String>,

    #[arg(long = "fix-version", value_name = "VERSION", value_delimiter = ',')]
    pub fix_versions: Vec<String>,
}

impl FilterArgs {
    #[must_use]
    pub fn to_filter_state(&self) -> FilterState {
        FilterState::all()
            .with(Facet::Sprint, self.sprints.iter().cloned())
            .with(Facet::Status, self.statuses.iter().cloned())
            .with(Facet::Priority, self.priorities.iter().cloned())
            .with(Facet::Developer, self.developers.iter().cloned())
            .with(Facet::Category, self.categories.iter().cloned())
            .with(Facet::FixVersion, self.fix_versions.iter().cloned())
    }
}

/// Loads the current snapshot through the JSON-then-SQLite fallback chain.
///
/// Each command runs once per process, so the cache lives for this call only
/// and never serves a cached snapshot across invocations.
pub fn load_view(command: &str, context: &CommandContext) -> SnapshotView {
    let source = FallbackSource::json_then_sqlite(
        context.paths.json_snapshot.clone(),
        context.paths.sqlite_path.clone(),
    );
    let cache = SnapshotCache::new(source, context.policy);
    let view = cache.get();
    eprintln!(
        "{command}: loaded source={} bugs={} sprints={} stale={} warnings={}",
        view.records.metadata.source,
        view.records.bugs.len(),
        view.records.sprints.len(),
        view.stale,
        view.records.warnings.len()
    );
    view
}

/// Success envelope annotated with snapshot freshness and degradations.
pub fn snapshot_envelope(command: &str, data: Value, view: &SnapshotView) -> ResponseEnvelope {
    let mut envelope = ResponseEnvelope::ok(command, data).with_freshness(Freshness {
        stale: view.stale,
        source: view.source.clone(),
        data_source: view.records.metadata.source.clone(),
        loaded_at_utc: view.loaded_at_unix_ms.map(format_unix_ms),
    });

    if let Some(error) = &view.error {
        envelope = envelope.with_warning(error.code(), error.to_string());
    }
    envelope.with_degradations(&view.records.warnings)
}

pub fn to_data<T: Serialize>(command: &str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|error| {
        envelope_failure(
            command,
            "response_encode_failed",
            "failed to encode response data",
            &Error::new(error),
        )
    })
}

pub fn emit(envelope: &ResponseEnvelope) -> Result<()> {
    let encoded = serde_json::to_string(envelope).map_err(|error| {
        envelope_failure(
            &envelope.command,
            "response_encode_failed",
            "failed to encode response",
            &Error::new(error),
        )
    })?;
    println!("{encoded}");
    Ok(())
}

/// Wraps `cause` in an error envelope that `main` prints on stdout.
pub fn envelope_failure(command: &str, code: &str, message: &str, cause: &Error) -> Error {
    let envelope = ResponseEnvelope::error(command, code, message)
        .with_error_details(json!({ "cause": format!("{cause:#}") }));
    Error::new(ResponseEnvelopeFailure::new(envelope))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::cli::app::{Cli, Command};
    use crate::filter::Facet;

    #[test]
    fn facet_flags_repeat_and_split_on_commas() {
        let cli = Cli::parse_from([
            "qadash",
            "kpis",
            "--priority",
            "Major,High",
            "--priority",
            "Low",
            "--fix-version",
            "1.2.0",
        ]);
        let Command::Kpis(args) = cli.command else {
            panic!("expected kpis command");
        };

        let filter = args.filters.to_filter_state();
        assert_eq!(filter.values(Facet::Priority), ["Major", "High", "Low"]);
        assert_eq!(filter.values(Facet::FixVersion), ["1.2.0"]);
        assert!(filter.values(Facet::Sprint).is_empty());
    }
}
