// MIT License - Copyright (c) 2026 Peter Wright
// Hub connection configuration

use crate::constants::DEFAULT_HUB_PORT;
use crate::error::{K1Error, Result};

/// Configuration for a session with a K1 hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Hub IP address or host name
    pub hub_ip: String,
    /// Hub UDP port (default: 1025)
    pub hub_port: u16,
    /// Hub device token, `ST_` followed by 12 hex digits
    pub device_token: String,
    /// Application id placed in `appTid` of every frame (default: "0")
    pub app_id: String,
    /// Interval between handshake probes in milliseconds (default: 1000)
    pub handshake_interval_ms: u64,
    /// Delay before the first roster sync after the handshake (default: 5000)
    pub startup_sync_delay_ms: u64,
    /// Keep-alive/poll interval in milliseconds (default: 30000)
    pub keepalive_interval_ms: u64,
    /// Consecutive receive failures tolerated before the session ends (default: 3)
    pub recv_retry_attempts: u32,
    /// Pause between receive attempts in milliseconds (default: 1000)
    pub recv_retry_delay_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            hub_ip: "192.168.0.100".to_string(),
            hub_port: DEFAULT_HUB_PORT,
            device_token: String::new(),
            app_id: "0".to_string(),
            handshake_interval_ms: 1000,
            startup_sync_delay_ms: 5000,
            keepalive_interval_ms: 30000,
            recv_retry_attempts: 3,
            recv_retry_delay_ms: 1000,
        }
    }
}

impl HubConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> HubConfigBuilder {
        HubConfigBuilder::default()
    }

    /// Check the settings the hub would otherwise silently ignore.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_device_token(&self.device_token) {
            return Err(K1Error::InvalidConfig {
                details: format!(
                    "device token must be ST_ followed by 12 hex digits, got {:?}",
                    self.device_token
                ),
            });
        }
        if self.hub_ip.trim().is_empty() {
            return Err(K1Error::InvalidConfig {
                details: "hub address is empty".to_string(),
            });
        }
        if self.hub_port == 0 {
            return Err(K1Error::InvalidConfig {
                details: "hub port must be non-zero".to_string(),
            });
        }
        if self.recv_retry_attempts == 0 {
            return Err(K1Error::InvalidConfig {
                details: "recv_retry_attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// `host:port` of the hub.
    pub fn hub_addr(&self) -> String {
        format!("{}:{}", self.hub_ip, self.hub_port)
    }
}

/// Whether `token` looks like `ST_` + 12 hex digits.
pub fn is_valid_device_token(token: &str) -> bool {
    token
        .strip_prefix("ST_")
        .is_some_and(|hex| hex.len() == 12 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Builder for HubConfig.
#[derive(Debug, Clone, Default)]
pub struct HubConfigBuilder {
    config: HubConfig,
}

impl HubConfigBuilder {
    pub fn hub_ip(mut self, ip: impl Into<String>) -> Self {
        self.config.hub_ip = ip.into();
        self
    }

    pub fn hub_port(mut self, port: u16) -> Self {
        self.config.hub_port = port;
        self
    }

    pub fn device_token(mut self, token: impl Into<String>) -> Self {
        self.config.device_token = token.into();
        self
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.config.app_id = app_id.into();
        self
    }

    pub fn handshake_interval_ms(mut self, ms: u64) -> Self {
        self.config.handshake_interval_ms = ms;
        self
    }

    pub fn startup_sync_delay_ms(mut self, ms: u64) -> Self {
        self.config.startup_sync_delay_ms = ms;
        self
    }

    pub fn keepalive_interval_ms(mut self, ms: u64) -> Self {
        self.config.keepalive_interval_ms = ms;
        self
    }

    pub fn recv_retry_attempts(mut self, attempts: u32) -> Self {
        self.config.recv_retry_attempts = attempts;
        self
    }

    pub fn recv_retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.recv_retry_delay_ms = ms;
        self
    }

    pub fn build(self) -> HubConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.hub_port, 1025);
        assert_eq!(config.app_id, "0");
        assert_eq!(config.keepalive_interval_ms, 30000);
        assert_eq!(config.handshake_interval_ms, 1000);
        assert_eq!(config.recv_retry_attempts, 3);
    }

    #[test]
    fn test_config_builder() {
        let config = HubConfig::builder()
            .hub_ip("10.0.0.5")
            .hub_port(2025)
            .device_token("ST_abcdef012345")
            .keepalive_interval_ms(10000)
            .build();

        assert_eq!(config.hub_ip, "10.0.0.5");
        assert_eq!(config.hub_port, 2025);
        assert_eq!(config.device_token, "ST_abcdef012345");
        assert_eq!(config.keepalive_interval_ms, 10000);
        assert_eq!(config.hub_addr(), "10.0.0.5:2025");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_device_token_format() {
        assert!(is_valid_device_token("ST_0123456789ab"));
        assert!(is_valid_device_token("ST_0123456789AB"));
        assert!(!is_valid_device_token("ST_0123456789a"));
        assert!(!is_valid_device_token("ST_0123456789abc"));
        assert!(!is_valid_device_token("XX_0123456789ab"));
        assert!(!is_valid_device_token("ST_0123456789zz"));
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let missing_token = HubConfig::builder().build();
        assert!(matches!(
            missing_token.validate(),
            Err(K1Error::InvalidConfig { .. })
        ));

        let zero_port = HubConfig::builder()
            .device_token("ST_0123456789ab")
            .hub_port(0)
            .build();
        assert!(zero_port.validate().is_err());

        let no_retries = HubConfig::builder()
            .device_token("ST_0123456789ab")
            .recv_retry_attempts(0)
            .build();
        assert!(no_retries.validate().is_err());
    }
}
