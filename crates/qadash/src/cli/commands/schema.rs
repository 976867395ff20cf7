use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{emit, envelope_failure};
use crate::models::{ResponseEnvelope, SNAPSHOT_FORMAT_VERSION, snapshot_json_schema};

#[derive(Debug, Clone, Default, Args)]
pub struct SchemaArgs {}

pub fn run(_args: &SchemaArgs) -> Result<()> {
    let schema = snapshot_json_schema().map_err(|error| {
        envelope_failure(
            "schema",
            "schema_generation_failed",
            "failed to generate snapshot schema",
            &error,
        )
    })?;
    let envelope = ResponseEnvelope::ok("schema", schema)
        .with_meta("snapshot_format", json!(SNAPSHOT_FORMAT_VERSION));
    emit(&envelope)
}
