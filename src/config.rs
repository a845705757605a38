use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use crate::algorithm::AlgorithmConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub algorithm_name: String,
    #[serde(default)]
    pub algorithm_config: serde_yaml::Mapping,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub web: Option<WebConfig>,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinatorConfig {
    #[serde(default = "default_heartbeat", deserialize_with = "duration")]
    pub heartbeat_interval: Duration,
    #[serde(default = "default_stale_after", deserialize_with = "duration")]
    pub telescope_stale_after: Duration,
    #[serde(default = "default_command_timeout", deserialize_with = "duration")]
    pub command_timeout: Duration,
    #[serde(default = "default_shutdown_timeout", deserialize_with = "duration")]
    pub shutdown_timeout: Duration,
    /// Degrees; smaller changes to the commanded azimuth are not sent.
    #[serde(default = "default_dead_band")]
    pub dead_band: f64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_heartbeat() -> Duration {
    Duration::from_secs(1)
}

fn default_stale_after() -> Duration {
    Duration::from_secs(5)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_dead_band() -> f64 {
    0.01
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat(),
            telescope_stale_after: default_stale_after(),
            command_timeout: default_command_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            dead_band: default_dead_band(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl CoordinatorConfig {
    pub fn stale_window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.telescope_stale_after).unwrap_or(chrono::Duration::MAX)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("heartbeat_interval", self.heartbeat_interval),
            ("telescope_stale_after", self.telescope_stale_after),
            ("command_timeout", self.command_timeout),
            ("shutdown_timeout", self.shutdown_timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "coordinator.{} must be positive",
                    name
                )));
            }
        }
        if !self.dead_band.is_finite() || self.dead_band < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "coordinator.dead_band={} must not be negative",
                self.dead_band
            )));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "coordinator.queue_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    pub permissions: HashSet<Permission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Control,
    Configure,
    Telemetry,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Dome slew rate, deg/s.
    #[serde(default = "default_dome_velocity")]
    pub dome_velocity: f64,
    #[serde(default = "default_telemetry_interval", deserialize_with = "duration")]
    pub telemetry_interval: Duration,
    #[serde(default)]
    pub dome_start_azimuth: f64,
    #[serde(default)]
    pub telescope_start_azimuth: f64,
    /// Telescope azimuth drift, deg/s.
    #[serde(default = "default_telescope_rate")]
    pub telescope_rate: f64,
    #[serde(default = "default_telescope_elevation")]
    pub telescope_elevation: f64,
    /// Start the mock dome with its own enable switch off.
    #[serde(default = "default_dome_enabled")]
    pub dome_enabled: bool,
    /// Put the mock dome into fault this long after it starts.
    #[serde(default, deserialize_with = "optional_duration")]
    pub dome_fault_after: Option<Duration>,
}

fn default_dome_enabled() -> bool {
    true
}

fn default_dome_velocity() -> f64 {
    3.0
}

fn default_telemetry_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_telescope_rate() -> f64 {
    0.5
}

fn default_telescope_elevation() -> f64 {
    45.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dome_velocity: default_dome_velocity(),
            telemetry_interval: default_telemetry_interval(),
            dome_start_azimuth: 0.0,
            telescope_start_azimuth: 0.0,
            telescope_rate: default_telescope_rate(),
            telescope_elevation: default_telescope_elevation(),
            dome_enabled: default_dome_enabled(),
            dome_fault_after: None,
        }
    }
}

impl SimulationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.dome_velocity.is_finite() || self.dome_velocity <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "simulation.dome_velocity={} must be positive",
                self.dome_velocity
            )));
        }
        if self.telemetry_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "simulation.telemetry_interval must be positive".into(),
            ));
        }
        if !(-90.0..=90.0).contains(&self.telescope_elevation) {
            return Err(ConfigError::Invalid(format!(
                "simulation.telescope_elevation={} outside [-90, 90]",
                self.telescope_elevation
            )));
        }
        Ok(())
    }
}

fn duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom)
}

fn optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|text| humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom))
        .transpose()
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.coordinator.validate()?;
        if let Some(simulation) = &config.simulation {
            simulation.validate()?;
        }
        Ok(config)
    }

    pub fn algorithm(&self) -> AlgorithmConfig {
        AlgorithmConfig::new(&self.algorithm_name).with_parameters(self.algorithm_config.clone())
    }

    pub fn find_api_key(&self, key: &str) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{construct, RegistryError};

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_str("algorithm_name: simple\n").unwrap();
        assert_eq!(config.algorithm().name, "simple");
        assert!(config.algorithm_config.is_empty());
        assert_eq!(config.coordinator.heartbeat_interval, Duration::from_secs(1));
        assert_eq!(
            config.coordinator.telescope_stale_after,
            Duration::from_secs(5)
        );
        assert_eq!(config.coordinator.dead_band, 0.01);
        assert!(config.web.is_none());
        assert!(config.simulation.is_none());
    }

    #[test]
    fn full_config_parses() {
        let yaml = r#"
algorithm_name: simple
algorithm_config:
  max_delta_azimuth: 7.1
coordinator:
  heartbeat_interval: 500ms
  telescope_stale_after: 2s
  command_timeout: 30s
  shutdown_timeout: 3s
  dead_band: 0.05
web:
  bind: 127.0.0.1:9000
api_keys:
  - key: secret
    name: operator
    permissions: [control, configure]
simulation:
  dome_velocity: 4
  telemetry_interval: 100ms
"#;
        let config = Config::from_str(yaml).unwrap();
        assert_eq!(
            config.coordinator.heartbeat_interval,
            Duration::from_millis(500)
        );
        assert_eq!(config.coordinator.command_timeout, Duration::from_secs(30));
        assert_eq!(config.web.as_ref().unwrap().bind, "127.0.0.1:9000");
        let key = config.find_api_key("secret").unwrap();
        assert!(key.permissions.contains(&Permission::Control));
        assert!(!key.permissions.contains(&Permission::Telemetry));
        assert!(config.find_api_key("nope").is_none());
        let simulation = config.simulation.as_ref().unwrap();
        assert_eq!(simulation.dome_velocity, 4.0);
        assert_eq!(simulation.telescope_rate, 0.5);
        assert!(simulation.dome_enabled);
        assert_eq!(simulation.dome_fault_after, None);

        assert!(construct(&config.algorithm()).is_ok());
    }

    #[test]
    fn algorithm_section_carries_parameters() {
        let config = Config::from_str(
            "algorithm_name: simple\nalgorithm_config:\n  max_delta_azimuth: 7.1\n",
        )
        .unwrap();
        assert_eq!(
            config.algorithm(),
            AlgorithmConfig::new("simple").with_parameter("max_delta_azimuth", 7.1)
        );
    }

    #[test]
    fn simulated_dome_faults_are_configurable() {
        let config = Config::from_str(
            "algorithm_name: simple\nsimulation:\n  dome_enabled: false\n  dome_fault_after: 30s\n",
        )
        .unwrap();
        let simulation = config.simulation.unwrap();
        assert!(!simulation.dome_enabled);
        assert_eq!(simulation.dome_fault_after, Some(Duration::from_secs(30)));
        assert!(Config::from_str(
            "algorithm_name: simple\nsimulation:\n  dome_fault_after: later\n"
        )
        .is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_str("algorithm_name: simple\nextra: 1\n").is_err());
        assert!(Config::from_str(
            "algorithm_name: simple\ncoordinator:\n  heartbeat: 1s\n"
        )
        .is_err());
    }

    #[test]
    fn unknown_algorithm_parameter_fails_at_construction() {
        let config =
            Config::from_str("algorithm_name: simple\nalgorithm_config:\n  max_daz: 3\n").unwrap();
        assert!(matches!(
            construct(&config.algorithm()),
            Err(RegistryError::InvalidAlgorithmConfig { .. })
        ));
    }

    #[test]
    fn bad_durations_are_rejected() {
        assert!(matches!(
            Config::from_str("algorithm_name: simple\ncoordinator:\n  heartbeat_interval: soon\n"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            Config::from_str("algorithm_name: simple\ncoordinator:\n  heartbeat_interval: 0s\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn negative_dead_band_is_rejected() {
        assert!(matches!(
            Config::from_str("algorithm_name: simple\ncoordinator:\n  dead_band: -1\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_algorithm_name_is_rejected() {
        assert!(Config::from_str("algorithm_config: {}\n").is_err());
    }
}
