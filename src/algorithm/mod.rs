mod error;
mod registry;
mod simple;
mod types;

pub use error::RegistryError;
pub use registry::{construct, ActiveAlgorithm};
pub use types::{AlgorithmConfig, Decision};
