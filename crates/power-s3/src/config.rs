//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_REGION;
use crate::error::{PowerError, Result};

/// Connection settings for remote stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// AWS region of the bucket
    pub region: String,

    /// Custom S3 endpoint (e.g. a MinIO mirror). None uses AWS.
    pub endpoint: Option<String>,

    /// Allow plain HTTP to a custom endpoint
    pub allow_http: bool,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            allow_http: false,
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("POWER_S3_REGION") {
            if !val.trim().is_empty() {
                config.region = val;
            }
        }

        if let Ok(val) = std::env::var("POWER_S3_ENDPOINT") {
            if !val.trim().is_empty() {
                config.endpoint = Some(val);
            }
        }

        if let Ok(val) = std::env::var("POWER_S3_ALLOW_HTTP") {
            config.allow_http = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("POWER_CONNECT_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.connect_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("POWER_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.request_timeout_secs = secs;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(PowerError::config("region must not be empty"));
        }

        if self.connect_timeout_secs == 0 {
            return Err(PowerError::config("connect_timeout_secs must be > 0"));
        }

        if self.request_timeout_secs == 0 {
            return Err(PowerError::config("request_timeout_secs must be > 0"));
        }

        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(PowerError::config(format!(
                    "endpoint '{}' must start with http:// or https://",
                    endpoint
                )));
            }
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
