use thiserror::Error;

use crate::algorithm::RegistryError;

#[derive(Debug, Error, PartialEq)]
pub enum CoordinatorError {
    #[error("no valid algorithm configured")]
    NotConfigured,
    #[error("coordinator is in fault; reset the fault first")]
    Faulted,
    #[error("coordinator has stopped")]
    Stopped,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
