pub mod envelope;
pub mod records;
pub mod rollups;
pub mod snapshot;

pub use envelope::{
    Freshness, Notice, RECORD_DEGRADED, RESPONSE_ENVELOPE_SCHEMA_VERSION, ResponseEnvelope,
    ResponseEnvelopeFailure,
};
pub use records::{
    BugRecord, Priority, SprintSummary, StatusClass, UNSCHEDULED_SPRINT, millis_per_day,
    normalize_label,
};
pub use rollups::{Breakdowns, DeveloperRollup, GroupRollup, PriorityRollup, Workload};
pub use snapshot::{
    RecordSet, ReportedSummary, SNAPSHOT_FORMAT_VERSION, SnapshotDocument, SnapshotMetadata,
    snapshot_json_schema,
};
