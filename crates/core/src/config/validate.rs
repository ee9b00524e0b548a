use crate::catalog::SatelliteFamily;

use super::{types::Config, ConfigError};

/// Validate configuration.
///
/// Every enabled family needs credentials, at least one parseable box and a
/// stage list whose stages all belong to that family.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let enabled = config.enabled_families();

    if !enabled.is_empty() && !config.copernicus.has_credentials() {
        return Err(invalid(
            "copernicus.username and copernicus.password are required when a family is enabled",
        ));
    }

    for family in enabled {
        validate_family(config, family)?;
    }

    let runner = &config.runner;
    if runner.max_parallel_regions == 0
        || runner.max_parallel_acquisitions == 0
        || runner.max_parallel_products == 0
    {
        return Err(invalid("runner parallelism limits must be greater than 0"));
    }
    if runner.interval_secs == Some(0) {
        return Err(invalid("runner.interval_secs cannot be 0"));
    }

    if config.server.enabled && config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    Ok(())
}

fn validate_family(config: &Config, family: SatelliteFamily) -> Result<(), ConfigError> {
    let key = family.dir_name();
    let fc = config.family(family);

    let regions = fc
        .regions()
        .map_err(|e| ConfigError::ValidationError(format!("{}.boxes: {}", key, e)))?;
    if regions.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{}.boxes must contain at least one box",
            key
        )));
    }

    let stages = fc
        .stages_for(family)
        .map_err(|e| ConfigError::ValidationError(format!("{}.stages: {}", key, e)))?;
    if let Some(stage) = stages.iter().find(|s| s.family() != family) {
        return Err(ConfigError::ValidationError(format!(
            "{}.stages: {} is not a {} stage",
            key, stage, family
        )));
    }

    if !(0.0..50.0).contains(&fc.percentile) {
        return Err(ConfigError::ValidationError(format!(
            "{}.percentile must be in [0, 50)",
            key
        )));
    }
    if fc.max_records == 0 || fc.max_pages == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{}.max_records and {}.max_pages must be greater than 0",
            key, key
        )));
    }

    Ok(())
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CopernicusConfig, FamilyConfig, ServerConfig};
    use crate::stage::StageName;

    fn valid_config() -> Config {
        Config {
            copernicus: CopernicusConfig::default().with_credentials("user", "pass"),
            s2: FamilyConfig::enabled_with_boxes(&["10,45,11,46"]),
            ..Config::default()
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_missing_credentials_fails() {
        let mut config = valid_config();
        config.copernicus.password.clear();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_enabled_family_without_boxes_fails() {
        let mut config = valid_config();
        config.s1.enabled = true;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("s1.boxes"));
    }

    #[test]
    fn test_stage_of_other_family_fails() {
        let mut config = valid_config();
        config.s2 = config.s2.with_stages(&[StageName::TrueColor, StageName::Ratio]);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("RATIO"));
    }

    #[test]
    fn test_bad_percentile_fails() {
        let mut config = valid_config();
        config.s2.percentile = 50.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = valid_config();
        config.server = ServerConfig {
            enabled: true,
            port: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
