//! Concurrency configuration with sane defaults

use serde::{Deserialize, Serialize};

/// Concurrency limiting configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum concurrent requests to the store
    pub max_concurrent_requests: usize,
    /// Whether concurrency limiting is enabled
    pub enabled: bool,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 3, // Keep backend load low during uploads
            enabled: true,
        }
    }
}

impl ConcurrencyConfig {
    /// Create a config with a specific request limit
    pub fn with_limit(max_concurrent_requests: usize) -> Self {
        Self {
            max_concurrent_requests: max_concurrent_requests.max(1),
            enabled: true,
        }
    }

    /// Run every request one after the other
    pub fn sequential() -> Self {
        Self::with_limit(1)
    }

    /// Disable limiting entirely
    pub fn unlimited() -> Self {
        Self {
            max_concurrent_requests: 0,
            enabled: false,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.max_concurrent_requests == 0 {
            return Err("max_concurrent_requests must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConcurrencyConfig::default();
        assert_eq!(config.max_concurrent_requests, 3);
        assert!(config.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_limit_clamps_zero() {
        assert_eq!(ConcurrencyConfig::with_limit(0).max_concurrent_requests, 1);
    }

    #[test]
    fn test_validate_zero_enabled() {
        let config = ConcurrencyConfig {
            max_concurrent_requests: 0,
            enabled: true,
        };
        assert!(config.validate().is_err());
        assert!(ConcurrencyConfig::unlimited().validate().is_ok());
    }
}
