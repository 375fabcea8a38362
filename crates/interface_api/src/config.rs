//! API configuration

use core_kernel::Currency;
use serde::Deserialize;

/// API configuration
///
/// Loaded from `API_`-prefixed environment variables, e.g. `API_PORT=9000`
/// or `API_DEFAULT_CURRENCY=MYR`. Unset keys fall back to the defaults below.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// HMAC secret for bearer tokens
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub database_url: String,
    pub database_max_connections: u32,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Currency of new bills when the client does not name one
    pub default_currency: Currency,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/splitledger".to_string(),
            database_max_connections: 10,
            log_level: "info".to_string(),
            default_currency: Currency::MYR,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port)?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("jwt_expiration_secs", defaults.jwt_expiration_secs)?
            .set_default("database_url", defaults.database_url)?
            .set_default("database_max_connections", defaults.database_max_connections)?
            .set_default("log_level", defaults.log_level)?
            .set_default("default_currency", defaults.default_currency.code())?
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load_without_environment() {
        let config = ApiConfig::from_env().unwrap();
        assert_eq!(config.default_currency, ApiConfig::default().default_currency);
        assert!(config.port > 0);
    }

    #[test]
    fn test_server_addr() {
        let config = ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            ..Default::default()
        };
        assert_eq!(config.server_addr(), "127.0.0.1:3000");
    }
}
