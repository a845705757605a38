use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::Display;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::angle::Azimuth;
use crate::fault::FaultReport;
use crate::telemetry::TelemetrySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Disabled,
    Enabled,
    Fault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    InFlight,
    Acknowledged,
    Rejected,
    Completed,
    TimedOut,
}

/// Terminal result of a move command, as seen by the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Completed,
    Rejected(String),
    TimedOut,
}

impl CommandOutcome {
    pub fn status(&self) -> CommandStatus {
        match self {
            CommandOutcome::Completed => CommandStatus::Completed,
            CommandOutcome::Rejected(_) => CommandStatus::Rejected,
            CommandOutcome::TimedOut => CommandStatus::TimedOut,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PendingCommand {
    pub id: Uuid,
    pub target_azimuth: Azimuth,
    pub issued_at: DateTime<Utc>,
    pub status: CommandStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AlgorithmStatus {
    pub name: String,
    /// Parameters rendered as YAML.
    pub config: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CoordinatorStatus {
    pub state: CoordinatorState,
    pub algorithm: Option<AlgorithmStatus>,
    pub pending_command: Option<PendingCommand>,
    /// Most recent command that reached a terminal status.
    pub last_command: Option<PendingCommand>,
    pub desired_azimuth: Option<Azimuth>,
    pub last_commanded_azimuth: Option<Azimuth>,
    pub last_fault: Option<FaultReport>,
    pub telemetry: TelemetrySnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Nothing was in flight.
    Idle,
    /// The in-flight command finished before the shutdown timeout.
    Drained,
    /// The shutdown timeout elapsed with this command still outstanding.
    Abandoned(Uuid),
}
