mod coordinator;
mod error;
mod event;
mod runtime;
mod state;

pub use coordinator::Coordinator;
pub use error::CoordinatorError;
pub use event::Event;
pub use runtime::{spawn, CoordinatorHandle};
pub use state::{
    AlgorithmStatus, CommandStatus, CoordinatorState, CoordinatorStatus, PendingCommand,
    ShutdownOutcome,
};
