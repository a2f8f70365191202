//! Remote source configuration.

use std::time::Duration;

/// Configuration for the HTTP rate source and the network monitor.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    /// API access key sent as `access_key`.
    pub access_key: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// `host:port` the network monitor connects to.
    pub probe_addr: String,
    /// Time between reachability probes.
    pub probe_interval: Duration,
    /// Connect timeout for a single probe.
    pub probe_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.exchangeratesapi.io/v1".to_string(),
            access_key: String::new(),
            request_timeout: Duration::from_secs(30),
            probe_addr: "api.exchangeratesapi.io:443".to_string(),
            probe_interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(3),
        }
    }
}

impl RemoteConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("FX_API_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(key) = std::env::var("FX_API_KEY") {
            config.access_key = key;
        }

        if let Ok(addr) = std::env::var("FX_PROBE_ADDR") {
            config.probe_addr = addr;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!("API URL must be http(s), got {:?}", self.base_url));
        }

        if self.access_key.is_empty() {
            return Err("API access key cannot be empty (set FX_API_KEY)".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be zero".to_string());
        }

        if self.probe_addr.is_empty() {
            return Err("Probe address cannot be empty".to_string());
        }

        if self.probe_interval.is_zero() || self.probe_timeout.is_zero() {
            return Err("Probe interval and timeout cannot be zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_needs_key() {
        let mut config = RemoteConfig::default();
        assert!(config.validate().is_err());

        config.access_key = "secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_url() {
        let config = RemoteConfig {
            base_url: "ftp://rates".to_string(),
            access_key: "secret".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
