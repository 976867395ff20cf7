use anyhow::Result;
use clap::Args;

use super::{CommandContext, emit, load_view, snapshot_envelope, to_data};
use crate::breakdown::facet_options;

#[derive(Debug, Clone, Default, Args)]
pub struct FacetsArgs {}

pub fn run(_args: &FacetsArgs, context: &CommandContext) -> Result<()> {
    let view = load_view("facets", context);
    let options = facet_options(&view.records);
    let data = to_data("facets", &options)?;
    emit(&snapshot_envelope("facets", data, &view))
}
