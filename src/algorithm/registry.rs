use super::error::RegistryError;
use super::simple::{SimpleAlgorithm, SimpleParams};
use super::types::{Algorithm, AlgorithmConfig, AlgorithmName};

/// Build the algorithm named by `config`, validating its parameters.
pub fn construct(config: &AlgorithmConfig) -> Result<Box<dyn Algorithm>, RegistryError> {
    let name = AlgorithmName::from_name(&config.name)
        .ok_or_else(|| RegistryError::UnknownAlgorithm(config.name.clone()))?;

    let parameters = serde_yaml::Value::Mapping(config.parameters.clone());
    match name {
        AlgorithmName::Simple => {
            let params: SimpleParams = serde_yaml::from_value(parameters)
                .map_err(|e| RegistryError::invalid(&config.name, e.to_string()))?;
            Ok(Box::new(SimpleAlgorithm::new(params)?))
        }
    }
}

/// The algorithm currently driving the coordinator, kept together with the
/// configuration it was built from.
#[derive(Debug)]
pub struct ActiveAlgorithm {
    config: AlgorithmConfig,
    algorithm: Box<dyn Algorithm>,
}

impl ActiveAlgorithm {
    pub fn build(config: AlgorithmConfig) -> Result<Self, RegistryError> {
        let algorithm = construct(&config)?;
        Ok(Self { config, algorithm })
    }

    pub fn config(&self) -> &AlgorithmConfig {
        &self.config
    }

    pub fn algorithm(&self) -> &dyn Algorithm {
        self.algorithm.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Decision;
    use crate::angle::Azimuth;
    use crate::telemetry::TelescopeTarget;

    fn target(azimuth: f64) -> TelescopeTarget {
        TelescopeTarget {
            azimuth: Azimuth::new(azimuth),
            elevation: 30.0,
            azimuth_velocity: None,
            timestamp: chrono::Utc::now(),
            valid: true,
        }
    }

    #[test]
    fn builds_simple_with_defaults() {
        let algorithm = construct(&AlgorithmConfig::new("simple")).unwrap();
        assert_eq!(algorithm.name(), AlgorithmName::Simple);
        assert_eq!(
            algorithm.evaluate(Azimuth::new(0.0), &target(5.0)),
            Decision::NoAction
        );
        assert_eq!(
            algorithm.evaluate(Azimuth::new(0.0), &target(5.5)),
            Decision::MoveTo(Azimuth::new(5.5))
        );
    }

    #[test]
    fn applies_parameters() {
        let config = AlgorithmConfig::new("simple").with_parameter("max_delta_azimuth", 7.1);
        let algorithm = construct(&config).unwrap();
        assert_eq!(
            algorithm.evaluate(Azimuth::new(0.0), &target(7.0)),
            Decision::NoAction
        );
    }

    #[test]
    fn integer_parameters_are_accepted() {
        let config = AlgorithmConfig::new("simple").with_parameter("max_delta_azimuth", 3);
        assert!(construct(&config).is_ok());
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = construct(&AlgorithmConfig::new("no_such_algorithm")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownAlgorithm("no_such_algorithm".into())
        );
    }

    #[test]
    fn schema_violations_are_rejected() {
        let cases = [
            AlgorithmConfig::new("simple").with_parameter("max_delta_azimuth", -1.0),
            AlgorithmConfig::new("simple").with_parameter("max_delta_azimuth", "wide"),
            AlgorithmConfig::new("simple").with_parameter("max_daz", 5.0),
        ];
        for config in cases {
            assert!(
                matches!(
                    construct(&config),
                    Err(RegistryError::InvalidAlgorithmConfig { .. })
                ),
                "{:?} should be rejected",
                config.parameters
            );
        }
    }

    #[test]
    fn active_algorithm_keeps_its_config() {
        let config = AlgorithmConfig::new("simple").with_parameter("max_delta_azimuth", 2.5);
        let active = ActiveAlgorithm::build(config.clone()).unwrap();
        assert_eq!(active.config(), &config);
        assert_eq!(active.algorithm().name(), AlgorithmName::Simple);
    }
}
