use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{CommandContext, FilterArgs, emit, load_view, snapshot_envelope, to_data};
use crate::filter::apply_filters;
use crate::kpi::compute_kpis;
use crate::recommend::recommend;

#[derive(Debug, Clone, Args)]
pub struct KpisArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    #[arg(long, default_value_t = false)]
    pub recommendations: bool,
}

pub fn run(args: &KpisArgs, context: &CommandContext) -> Result<()> {
    let view = load_view("kpis", context);
    let filter = args.filters.to_filter_state();
    let filtered = apply_filters(&view.records, &filter);
    let kpis = compute_kpis(&filtered);
    eprintln!(
        "kpis: computed sprints={} bugs={} active_facets={}",
        kpis.sprint_count,
        kpis.total_bugs,
        filter.active_facets().len()
    );

    let mut data = json!({
        "filter": to_data("kpis", &filter)?,
        "kpis": to_data("kpis", &kpis)?,
    });
    if args.recommendations {
        data["recommendations"] = to_data("kpis", &recommend(&kpis))?;
    }

    emit(&snapshot_envelope("kpis", data, &view))
}
