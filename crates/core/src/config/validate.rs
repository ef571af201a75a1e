use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - HTTP timeout is not 0
/// - User agent is not blank
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.http.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "http.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.http.user_agent.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "http.user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let config = Config {
            http: HttpConfig {
                timeout_secs: 0,
                ..HttpConfig::default()
            },
            ..Config::default()
        };
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_blank_user_agent_fails() {
        let config = Config {
            http: HttpConfig {
                user_agent: "  ".to_string(),
                ..HttpConfig::default()
            },
            ..Config::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
