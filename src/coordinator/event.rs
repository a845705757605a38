use tokio::sync::oneshot;
use uuid::Uuid;

use super::error::CoordinatorError;
use super::state::{CommandOutcome, CoordinatorState, CoordinatorStatus, ShutdownOutcome};
use crate::algorithm::{AlgorithmConfig, RegistryError};

/// Everything the control loop reacts to arrives as one of these, on a
/// single ordered queue.
#[derive(Debug)]
pub enum Event {
    TelescopeUpdated,
    DomeUpdated,
    TelemetryFailed(String),
    CommandAcknowledged(Uuid),
    CommandFinished { id: Uuid, outcome: CommandOutcome },
    Control(ControlRequest),
    Shutdown(oneshot::Sender<ShutdownOutcome>),
}

#[derive(Debug)]
pub enum ControlRequest {
    Enable(oneshot::Sender<Result<CoordinatorState, CoordinatorError>>),
    Disable(oneshot::Sender<CoordinatorState>),
    ResetFault(oneshot::Sender<CoordinatorState>),
    Configure(AlgorithmConfig, oneshot::Sender<Result<(), RegistryError>>),
    Status(oneshot::Sender<CoordinatorStatus>),
}
