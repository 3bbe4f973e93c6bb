//! Bridge configuration.

use std::env;

const ENV_POISON_DISPOSED: &str = "TENSORBRIDGE_POISON_DISPOSED";
const ENV_HOST_DEVICE: &str = "TENSORBRIDGE_HOST_DEVICE";

/// Configuration for a [`crate::Backend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Keep a `Disposed` tombstone per released handle so later use reports
    /// the tensor's shape and dtype.
    pub poison_disposed: bool,
    /// Device-name suffix treated as host memory, compared case-insensitively.
    pub host_device: String,
    /// Warn with the list of live handles when the registry is cleared.
    pub warn_on_leaks: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poison_disposed: cfg!(debug_assertions),
            host_device: "cpu:0".to_string(),
            warn_on_leaks: true,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `TENSORBRIDGE_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = env::var(ENV_POISON_DISPOSED) {
            if !value.trim().is_empty() {
                config.poison_disposed = parse_bool(&value);
            }
        }
        if let Ok(value) = env::var(ENV_HOST_DEVICE) {
            let value = value.trim();
            if !value.is_empty() {
                config.host_device = value.to_string();
            }
        }
        config
    }

    pub fn with_poison_disposed(mut self, enabled: bool) -> Self {
        self.poison_disposed = enabled;
        self
    }

    pub fn with_host_device(mut self, device: impl Into<String>) -> Self {
        self.host_device = device.into();
        self
    }

    pub fn with_warn_on_leaks(mut self, enabled: bool) -> Self {
        self.warn_on_leaks = enabled;
        self
    }

    /// Whether a native device name refers to host memory.
    pub fn is_host_device(&self, device: &str) -> bool {
        device
            .to_ascii_lowercase()
            .ends_with(&self.host_device.to_ascii_lowercase())
    }
}

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        for value in ["1", "true", "YES", " on "] {
            assert!(parse_bool(value), "{value}");
        }
        for value in ["0", "false", "off", "nope"] {
            assert!(!parse_bool(value), "{value}");
        }
    }

    #[test]
    fn test_host_device_suffix() {
        let config = BridgeConfig::default();
        assert!(config.is_host_device("/job:localhost/replica:0/task:0/device:CPU:0"));
        assert!(!config.is_host_device("/job:localhost/replica:0/task:0/device:GPU:0"));
        assert!(!config.is_host_device("/device:CPU:1"));

        let config = config.with_host_device("gpu:0");
        assert!(config.is_host_device("/device:GPU:0"));
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::default()
            .with_poison_disposed(true)
            .with_warn_on_leaks(false);
        assert!(config.poison_disposed);
        assert!(!config.warn_on_leaks);
        assert_eq!(config.host_device, "cpu:0");
    }
}
