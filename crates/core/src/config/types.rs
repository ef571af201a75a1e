use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::transport::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Register the built-in providers before caller-supplied ones
    #[serde(default = "default_install_default_providers")]
    pub install_default_providers: bool,
    #[serde(default)]
    pub http: HttpConfig,
    /// Per-provider overrides, keyed by provider name
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            install_default_providers: default_install_default_providers(),
            http: HttpConfig::default(),
            providers: HashMap::new(),
        }
    }
}

fn default_install_default_providers() -> bool {
    true
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout() -> u32 {
    DEFAULT_TIMEOUT_SECS
}

/// Provider override
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Force the provider on or off; unset keeps the provider's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cookies: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.install_default_providers);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.http.user_agent, DEFAULT_USER_AGENT);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
install_default_providers = false

[http]
user_agent = "test-agent"
timeout_secs = 10

[providers.rarbg]
enabled = true

[providers.1337x]
enabled = false
cookies = ["session=abc"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(!config.install_default_providers);
        assert_eq!(config.http.user_agent, "test-agent");
        assert_eq!(config.http.timeout_secs, 10);

        let rarbg = config.providers.get("rarbg").unwrap();
        assert_eq!(rarbg.enabled, Some(true));

        let x1337 = config.providers.get("1337x").unwrap();
        assert_eq!(x1337.enabled, Some(false));
        assert_eq!(x1337.cookies, vec!["session=abc".to_string()]);
    }

    #[test]
    fn test_provider_config_without_enabled() {
        let toml = r#"
[providers.yts]
username = "someone"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let yts = config.providers.get("yts").unwrap();
        assert!(yts.enabled.is_none());
        assert_eq!(yts.username.as_deref(), Some("someone"));
    }
}
