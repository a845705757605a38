use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error("invalid config for algorithm {name}: {reason}")]
    InvalidAlgorithmConfig { name: String, reason: String },
}

impl RegistryError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        RegistryError::InvalidAlgorithmConfig {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
