use anyhow::Result;
use clap::Args;

use super::{CommandContext, FilterArgs, emit, load_view, snapshot_envelope, to_data};
use crate::breakdown::build_breakdown;
use crate::filter::apply_filters;

#[derive(Debug, Clone, Args)]
pub struct BreakdownArgs {
    #[command(flatten)]
    pub filters: FilterArgs,
}

pub fn run(args: &BreakdownArgs, context: &CommandContext) -> Result<()> {
    let view = load_view("breakdown", context);
    let filter = args.filters.to_filter_state();
    let filtered = apply_filters(&view.records, &filter);
    let report = build_breakdown(&view.records, &filtered, &filter);
    eprintln!(
        "breakdown: built priorities={} modules={} categories={} developers={}",
        report.breakdowns.by_priority.len(),
        report.breakdowns.by_module.len(),
        report.breakdowns.by_category.len(),
        report.breakdowns.developers.len()
    );

    let data = to_data("breakdown", &report)?;
    emit(&snapshot_envelope("breakdown", data, &view))
}
