use serde::Deserialize;

use super::error::RegistryError;
use super::types::{Algorithm, AlgorithmName, Decision};
use crate::angle::Azimuth;
use crate::telemetry::TelescopeTarget;

const DEFAULT_MAX_DELTA_AZIMUTH: f64 = 5.0;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SimpleParams {
    /// Largest dome/telescope separation (deg) tolerated before moving.
    #[serde(default = "default_max_delta_azimuth")]
    pub max_delta_azimuth: f64,
    /// Seconds of telescope azimuth velocity to lead by; 0 disables.
    #[serde(default)]
    pub slew_lead_time: f64,
}

fn default_max_delta_azimuth() -> f64 {
    DEFAULT_MAX_DELTA_AZIMUTH
}

impl Default for SimpleParams {
    fn default() -> Self {
        Self {
            max_delta_azimuth: DEFAULT_MAX_DELTA_AZIMUTH,
            slew_lead_time: 0.0,
        }
    }
}

/// Follow the telescope target azimuth, moving the dome only once the
/// separation exceeds `max_delta_azimuth`. A separation of exactly
/// `max_delta_azimuth` does not move the dome.
#[derive(Debug, Clone)]
pub struct SimpleAlgorithm {
    params: SimpleParams,
}

impl SimpleAlgorithm {
    pub fn new(params: SimpleParams) -> Result<Self, RegistryError> {
        let name = AlgorithmName::Simple.as_ref();
        if !params.max_delta_azimuth.is_finite()
            || !(0.0..=180.0).contains(&params.max_delta_azimuth)
        {
            return Err(RegistryError::invalid(
                name,
                format!(
                    "max_delta_azimuth={} must be in [0, 180]",
                    params.max_delta_azimuth
                ),
            ));
        }
        if !params.slew_lead_time.is_finite() || params.slew_lead_time < 0.0 {
            return Err(RegistryError::invalid(
                name,
                format!(
                    "slew_lead_time={} must not be negative",
                    params.slew_lead_time
                ),
            ));
        }
        Ok(Self { params })
    }

    fn predicted_azimuth(&self, target: &TelescopeTarget) -> Azimuth {
        match target.azimuth_velocity {
            Some(velocity) if self.params.slew_lead_time > 0.0 => {
                target.azimuth.offset(velocity * self.params.slew_lead_time)
            }
            _ => target.azimuth,
        }
    }
}

impl Algorithm for SimpleAlgorithm {
    fn name(&self) -> AlgorithmName {
        AlgorithmName::Simple
    }

    fn evaluate(&self, dome_azimuth: Azimuth, target: &TelescopeTarget) -> Decision {
        if !target.valid {
            return Decision::NoAction;
        }
        let desired = self.predicted_azimuth(target);
        if desired.diff(dome_azimuth).abs() <= self.params.max_delta_azimuth {
            Decision::NoAction
        } else {
            Decision::MoveTo(desired)
        }
    }
}
