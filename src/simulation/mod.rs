mod dome;
mod telescope;

pub use dome::{MockDome, MockDomeConfig};
pub use telescope::{MockTelescope, MockTelescopeConfig};

use crate::config::SimulationConfig;

impl From<&SimulationConfig> for MockDomeConfig {
    fn from(config: &SimulationConfig) -> Self {
        MockDomeConfig {
            velocity: config.dome_velocity,
            telemetry_interval: config.telemetry_interval,
            start_azimuth: config.dome_start_azimuth,
            enabled: config.dome_enabled,
            fault_after: config.dome_fault_after,
        }
    }
}

impl From<&SimulationConfig> for MockTelescopeConfig {
    fn from(config: &SimulationConfig) -> Self {
        MockTelescopeConfig {
            start_azimuth: config.telescope_start_azimuth,
            rate: config.telescope_rate,
            elevation: config.telescope_elevation,
            interval: config.telemetry_interval,
        }
    }
}
