use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::Display;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    CommandRejected,
    CommandTimedOut,
    RemoteFault,
    TelemetryFailure,
}

/// Why the coordinator went to fault. Kept until the next fault replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FaultReport {
    pub kind: FaultKind,
    pub reason: String,
    pub at: DateTime<Utc>,
}
