//! Client and transport configuration.
//!
//! Both structs implement `Default` and deserialize with every field optional,
//! so a partial JSON document only overrides what it names:
//!
//! ```
//! use tether::config::ClientConfig;
//!
//! let config = ClientConfig::from_json(r#"{ "accept": "application/vnd.api+json" }"#).unwrap();
//! assert_eq!(config.accept, "application/vnd.api+json");
//! assert!(!config.cache_api_errors);
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Default `Accept` value sent by [`Client::new_request`](crate::client::Client::new_request).
pub const DEFAULT_ACCEPT: &str = "application/json";

/// Maximum response size the TCP transport buffers before giving up (8 MiB).
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 8 * 1024 * 1024;

/// Default per-request timeout for the TCP transport.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Negotiation header placed on every new request; also part of the cache key.
    pub accept: String,
    pub user_agent: Option<String>,
    /// Store responses whose status is an API error as well as successes.
    pub cache_api_errors: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            accept: DEFAULT_ACCEPT.to_owned(),
            user_agent: Some(concat!("tether/", env!("CARGO_PKG_VERSION")).to_owned()),
            cache_api_errors: false,
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Deadline for one complete exchange, connect through last body byte.
    pub timeout_ms: u64,
    pub max_response_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }
}

impl TransportConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(ClientConfig::from_json("{}").unwrap(), ClientConfig::default());
        assert_eq!(
            TransportConfig::from_json("{}").unwrap(),
            TransportConfig::default()
        );
    }

    #[test]
    fn overrides() {
        let config = ClientConfig::from_json(
            r#"{ "user_agent": null, "cache_api_errors": true }"#,
        )
        .unwrap();
        assert_eq!(config.accept, DEFAULT_ACCEPT);
        assert_eq!(config.user_agent, None);
        assert!(config.cache_api_errors);

        let transport = TransportConfig::from_json(r#"{ "timeout_ms": 250 }"#).unwrap();
        assert_eq!(transport.timeout(), Duration::from_millis(250));
        assert_eq!(transport.max_response_size, DEFAULT_MAX_RESPONSE_SIZE);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(TransportConfig::from_json(r#"{ "timeout_ms": "soon" }"#).is_err());
    }
}
