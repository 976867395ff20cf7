use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{CommandContext, FilterArgs, emit, load_view, snapshot_envelope, to_data};
use crate::filter::apply_filters;
use crate::series::{MetricKey, build_series_report, build_sparklines};

#[derive(Debug, Clone, Args)]
pub struct SeriesArgs {
    /// Metric name such as `resolution_efficiency`; omit for every metric.
    #[arg(long, value_name = "KEY", value_parser = parse_metric_key)]
    pub metric: Option<MetricKey>,

    #[command(flatten)]
    pub filters: FilterArgs,
}

fn parse_metric_key(raw: &str) -> Result<MetricKey, String> {
    raw.parse::<MetricKey>().map_err(|error| error.to_string())
}

pub fn run(args: &SeriesArgs, context: &CommandContext) -> Result<()> {
    let view = load_view("series", context);
    let filter = args.filters.to_filter_state();
    let filtered = apply_filters(&view.records, &filter);

    let data = match args.metric {
        Some(metric) => {
            let report = build_series_report(&filtered, metric);
            eprintln!(
                "series: built metric={} points={} trend_pct={}",
                metric.as_str(),
                report.points.len(),
                report.trend_pct
            );
            json!({ "series": to_data("series", &report)? })
        }
        None => {
            let sparklines = build_sparklines(&filtered);
            eprintln!(
                "series: built metrics={} sprints={}",
                sparklines.len(),
                filtered.sprints.len()
            );
            json!({ "sparklines": to_data("series", &sparklines)? })
        }
    };

    emit(&snapshot_envelope("series", data, &view))
}
