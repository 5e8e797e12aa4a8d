use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Configuration for the discovery registry and its coordination backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Root path under which instance records are stored.
    pub base_path: String,
    /// Maximum age of a cached instance list before a backend fetch is forced.
    #[serde(with = "humantime_serde")]
    pub max_staleness: Duration,
    /// Per-call timeout for coordination backend operations.
    #[serde(with = "humantime_serde")]
    pub backend_timeout: Duration,
    /// Retry policy for the calling layer. The registry itself never retries.
    pub retry: RetryConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            base_path: String::from("/discovery"),
            max_staleness: Duration::from_secs(1),
            backend_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy applied by callers to transient backend failures.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Fixed sleep between attempts.
    #[serde(with = "humantime_serde")]
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP gateway.
    pub bind: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: String::from("0.0.0.0"),
            http_port: 8080,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    pub discovery: DiscoveryConfig,
    pub server: ServerConfig,
}

impl Configuration {
    /// Defaults, overlaid with `beacon.toml` and `BEACON__`-prefixed
    /// environment variables (`BEACON__DISCOVERY__MAX_STALENESS=2s`).
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file("beacon.toml"))
            .merge(Env::prefixed("BEACON__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    /// Like [`load`](Self::load) but with an explicit config file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("BEACON__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = Configuration::default();

        assert_eq!(config.discovery.base_path, "/discovery");
        assert_eq!(config.discovery.max_staleness, Duration::from_secs(1));
        assert_eq!(config.discovery.backend_timeout, Duration::from_secs(5));
        assert_eq!(config.discovery.retry.attempts, 3);
        assert_eq!(config.server.http_port, 8080);
    }

    #[test]
    fn test_configless_operation() {
        // Defaults extract cleanly without any config file present
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .extract::<Configuration>()
            .unwrap();

        assert_eq!(config.discovery.base_path, "/discovery");
        assert_eq!(config.server.bind, "0.0.0.0");
    }

    #[test]
    fn test_env_var_override() {
        // SAFETY: test-local environment mutation
        unsafe {
            std::env::set_var("BEACON__DISCOVERY__BASE_PATH", "/services");
            std::env::set_var("BEACON__DISCOVERY__MAX_STALENESS", "250ms");
            std::env::set_var("BEACON__SERVER__HTTP_PORT", "9090");
        }

        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Env::prefixed("BEACON__").split("__"))
            .extract::<Configuration>()
            .unwrap();

        assert_eq!(config.discovery.base_path, "/services");
        assert_eq!(config.discovery.max_staleness, Duration::from_millis(250));
        assert_eq!(config.server.http_port, 9090);

        // Clean up
        // SAFETY: test-local environment mutation
        unsafe {
            std::env::remove_var("BEACON__DISCOVERY__BASE_PATH");
            std::env::remove_var("BEACON__DISCOVERY__MAX_STALENESS");
            std::env::remove_var("BEACON__SERVER__HTTP_PORT");
        }
    }
}
