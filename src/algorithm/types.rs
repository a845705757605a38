use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{AsRefStr, Display};
use utoipa::ToSchema;

use crate::angle::Azimuth;
use crate::telemetry::TelescopeTarget;

/// Outcome of one algorithm evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    NoAction,
    MoveTo(Azimuth),
}

/// A dome trajectory policy.
///
/// Implementations must be pure: the decision depends only on the arguments
/// and the parameters the algorithm was built with.
pub trait Algorithm: Send + Sync + fmt::Debug {
    fn name(&self) -> AlgorithmName;

    fn evaluate(&self, dome_azimuth: Azimuth, target: &TelescopeTarget) -> Decision;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmName {
    Simple,
}

impl AlgorithmName {
    pub const ALL: &'static [AlgorithmName] = &[AlgorithmName::Simple];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|n| n.as_ref() == name)
    }
}

/// Algorithm selection plus its named parameters, as it appears in the
/// configuration document.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AlgorithmConfig {
    #[serde(rename = "algorithm_name")]
    pub name: String,
    #[serde(rename = "algorithm_config", default)]
    #[schema(value_type = Object)]
    pub parameters: serde_yaml::Mapping,
}

impl AlgorithmConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: serde_yaml::Mapping::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: serde_yaml::Mapping) -> Self {
        self.parameters = parameters;
        self
    }

    #[cfg(test)]
    pub fn with_parameter(mut self, key: &str, value: impl Into<serde_yaml::Value>) -> Self {
        self.parameters
            .insert(serde_yaml::Value::String(key.to_string()), value.into());
        self
    }

    /// Parameters rendered as YAML for logs and status reports.
    pub fn parameters_yaml(&self) -> String {
        serde_yaml::to_string(&self.parameters).unwrap_or_else(|e| format!("<{}>", e))
    }
}
