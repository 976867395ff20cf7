use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    breakdown::BreakdownArgs, export::ExportArgs, facets::FacetsArgs, import::ImportArgs,
    kpis::KpisArgs, schema::SchemaArgs, series::SeriesArgs,
};
use crate::cache::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_AGE};

#[derive(Debug, Parser)]
#[command(name = "qadash", version, about = "QA metrics aggregation over sprint bug data")]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// SQLite file, a `.json` snapshot, or `none`.
    #[arg(long, global = true, env = "DATA_SOURCE", value_name = "PATH|none")]
    pub data_source: Option<String>,

    #[arg(long, global = true, value_name = "MS", default_value_t = DEFAULT_FETCH_TIMEOUT.as_millis() as u64)]
    pub fetch_timeout_ms: u64,

    #[arg(long, global = true, value_name = "SECS", default_value_t = DEFAULT_MAX_AGE.as_secs())]
    pub max_age_secs: u64,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Headline KPIs for the filtered view.
    Kpis(KpisArgs),
    /// Per-sprint values of one metric, or every metric.
    Series(SeriesArgs),
    /// Priority, module, category and developer rollups.
    Breakdown(BreakdownArgs),
    /// Values available for each filter facet.
    Facets(FacetsArgs),
    /// Write the SQLite store out as a JSON snapshot.
    Export(ExportArgs),
    /// Load a JSON snapshot into the SQLite store.
    Import(ImportArgs),
    /// JSON Schema of the snapshot document.
    Schema(SchemaArgs),
}

impl Command {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Kpis(_) => "kpis",
            Self::Series(_) => "series",
            Self::Breakdown(_) => "breakdown",
            Self::Facets(_) => "facets",
            Self::Export(_) => "export",
            Self::Import(_) => "import",
            Self::Schema(_) => "schema",
        }
    }
}
