use anyhow::{Context, Result};
use std::{env, sync::OnceLock, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Bridge connection configuration
    pub bridge: BridgeConfig,
}

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Host name or IP address of the bridge
    pub address: String,
    /// Whitelisted API user name
    pub username: String,
    pub request_timeout: Duration,
    /// Talk to the bridge over HTTPS
    pub use_tls: bool,
    /// Accept the bridge's self-signed certificate; only relevant with `use_tls`
    pub accept_invalid_certs: bool,
}

impl AppConfig {
    /// Get or load the application configuration
    ///
    /// Returns a reference to the cached configuration. On first call, it loads
    /// and validates all configuration from environment variables. Subsequent
    /// calls return the cached instance.
    ///
    /// # Panics
    /// Panics if configuration loading fails. The binary cannot talk to a
    /// bridge without valid configuration.
    pub fn get() -> &'static Self {
        static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();
        APP_CONFIG.get_or_init(|| Self::load().expect("failed to load application configuration"))
    }

    /// Load all configuration from environment variables
    pub fn load() -> Result<Self> {
        Ok(Self {
            bridge: BridgeConfig::load(|key| env::var(key).ok())?,
        })
    }
}

impl BridgeConfig {
    fn load(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let address = var("BRIDGE_ADDRESS").unwrap_or_else(|| "127.0.0.1".to_string());
        let username = var("BRIDGE_USERNAME").unwrap_or_default();

        let request_timeout = var("BRIDGE_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u64>()
            .map(Duration::from_secs)
            .context("failed to parse BRIDGE_REQUEST_TIMEOUT_SECS: invalid format")?;

        let use_tls = var("BRIDGE_USE_TLS")
            .unwrap_or_else(|| "false".to_string())
            .parse::<bool>()
            .context("failed to parse BRIDGE_USE_TLS: invalid format")?;

        let accept_invalid_certs = var("BRIDGE_ACCEPT_INVALID_CERTS")
            .unwrap_or_else(|| "true".to_string())
            .parse::<bool>()
            .context("failed to parse BRIDGE_ACCEPT_INVALID_CERTS: invalid format")?;

        Ok(Self {
            address,
            username,
            request_timeout,
            use_tls,
            accept_invalid_certs,
        })
    }

    /// Whether the HTTP client skips certificate verification; plain http never does
    pub fn relaxed_certificate_checks(&self) -> bool {
        self.use_tls && self.accept_invalid_certs
    }

    /// Base URL of the authenticated API, e.g. `http://192.168.1.2/api/<user>`
    pub fn api_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{scheme}://{}/api/{}", self.address, self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<BridgeConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BridgeConfig::load(|key| vars.get(key).cloned())
    }

    #[test]
    fn uses_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.address, "127.0.0.1");
        assert!(config.username.is_empty());
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(!config.use_tls);
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn certificate_checks_can_be_enforced() {
        let config = load(&[
            ("BRIDGE_USE_TLS", "true"),
            ("BRIDGE_ACCEPT_INVALID_CERTS", "false"),
        ])
        .unwrap();

        assert!(config.use_tls);
        assert!(!config.accept_invalid_certs);
        assert!(!config.relaxed_certificate_checks());
    }

    #[test]
    fn plain_http_never_relaxes_certificates() {
        let http = load(&[]).unwrap();
        let https = load(&[("BRIDGE_USE_TLS", "true")]).unwrap();

        assert!(!http.relaxed_certificate_checks());
        assert!(https.relaxed_certificate_checks());
    }

    #[test]
    fn builds_api_url() {
        let config = load(&[
            ("BRIDGE_ADDRESS", "192.168.1.2"),
            ("BRIDGE_USERNAME", "abc123"),
            ("BRIDGE_USE_TLS", "true"),
        ])
        .unwrap();

        assert_eq!(config.api_url(), "https://192.168.1.2/api/abc123");
    }

    #[test]
    fn rejects_invalid_timeout() {
        let err = load(&[("BRIDGE_REQUEST_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("BRIDGE_REQUEST_TIMEOUT_SECS"));
    }
}
