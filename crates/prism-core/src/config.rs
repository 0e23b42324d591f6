//! Configuration structures for Prism clients.
//!
//! A [`PrismConfig`] names the control-plane endpoint and its TLS policy; a
//! [`Credential`] holds the basic-auth pair. Both are handed to the client at
//! construction and never read from ambient global state.

use crate::error::{Error, Result};
use crate::types::{API_PATH_PREFIX, DEFAULT_PRISM_PORT};
use crate::uuid::UuidPolicy;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Configuration for a Prism client instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PrismConfig {
    /// Host name or address of the Prism endpoint
    #[validate(length(min = 1, max = 253))]
    pub endpoint: String,

    /// Port of the v3 API
    #[validate(range(min = 1))]
    #[serde(default = "default_port")]
    pub port: u16,

    /// Full API root override (scheme, host, port and path prefix)
    #[validate(url)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional path to custom CA certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<std::path::PathBuf>,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Identifier checking applied before uuids are placed in request paths
    #[serde(default)]
    pub uuid_policy: UuidPolicy,
}

const fn default_port() -> u16 {
    DEFAULT_PRISM_PORT
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl PrismConfig {
    /// Create a new client configuration for `endpoint`.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Host name or address of Prism (e.g. "prism.example.com")
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] if the endpoint is empty, or a configuration
    /// error if validation fails.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let config = Self {
            endpoint: endpoint.into().trim().to_string(),
            ..Self::default()
        };
        config.ensure_valid()?;
        Ok(config)
    }

    /// Override the full API root, e.g. `http://127.0.0.1:8080/api/nutanix/v3`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the API port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set custom CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: std::path::PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set the identifier checking policy.
    #[must_use]
    pub const fn with_uuid_policy(mut self, policy: UuidPolicy) -> Self {
        self.uuid_policy = policy;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration, reporting a missing endpoint as `NotConfigured`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is missing or any field is out of range.
    pub fn ensure_valid(&self) -> Result<()> {
        if self.endpoint.is_empty() && self.base_url.is_none() {
            return Err(Error::NotConfigured(
                "Prism endpoint is not set".to_string(),
            ));
        }
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))
    }

    /// Resolve the API root URL.
    ///
    /// Defaults to `https://{endpoint}:{port}/api/nutanix/v3`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the URL cannot be parsed.
    pub fn api_root(&self) -> Result<Url> {
        let raw = match &self.base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}:{}{API_PATH_PREFIX}", self.endpoint, self.port),
        };
        Ok(Url::parse(&raw)?)
    }
}

impl Default for PrismConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            port: default_port(),
            base_url: None,
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            request_timeout_secs: default_request_timeout_secs(),
            uuid_policy: UuidPolicy::default(),
        }
    }
}

/// Basic-auth username and password.
///
/// The password is held in a [`SecretString`] so it is redacted from `Debug` output
/// and zeroized on drop.
pub struct Credential {
    username: String,
    password: SecretString,
}

impl Credential {
    /// Create a new credential.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Username half of the pair.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password half of the pair.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prism_config_new() {
        let config = PrismConfig::new("prism.example.com").unwrap();
        assert_eq!(config.endpoint, "prism.example.com");
        assert_eq!(config.port, 9440);
        assert!(config.tls_verify);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.uuid_policy, UuidPolicy::NonEmpty);
    }

    #[test]
    fn test_missing_endpoint_is_not_configured() {
        let err = PrismConfig::new("  ").unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
        assert!(matches!(
            PrismConfig::default().ensure_valid(),
            Err(Error::NotConfigured(_))
        ));
    }

    #[test]
    fn test_api_root_default() {
        let config = PrismConfig::new("10.0.0.5").unwrap();
        let url = config.api_root().unwrap();
        assert_eq!(url.as_str(), "https://10.0.0.5:9440/api/nutanix/v3");
    }

    #[test]
    fn test_api_root_override() {
        let config = PrismConfig::new("prism")
            .unwrap()
            .with_base_url("http://127.0.0.1:8080/api/nutanix/v3/");
        let url = config.api_root().unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.port(), Some(8080));
        assert_eq!(url.path(), "/api/nutanix/v3");
    }

    #[test]
    fn test_api_root_unparseable_is_invalid_endpoint() {
        let config = PrismConfig::new("bad host name").unwrap();
        assert!(matches!(config.api_root(), Err(Error::InvalidEndpoint(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = PrismConfig::new("prism")
            .unwrap()
            .with_port(443)
            .with_tls_verify(false)
            .with_timeout(60)
            .with_uuid_policy(UuidPolicy::Rfc4122);

        assert_eq!(config.port, 443);
        assert!(!config.tls_verify);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.uuid_policy, UuidPolicy::Rfc4122);
    }

    #[test]
    fn test_config_validation_timeout_range() {
        let mut config = PrismConfig::new("prism").unwrap();
        config.request_timeout_secs = 0;
        assert!(matches!(config.ensure_valid(), Err(Error::ConfigError(_))));

        config.request_timeout_secs = 301;
        assert!(config.ensure_valid().is_err());

        config.request_timeout_secs = 30;
        assert!(config.ensure_valid().is_ok());
    }

    #[test]
    fn test_config_validation_base_url() {
        let config = PrismConfig::new("prism").unwrap().with_base_url("not a url");
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = PrismConfig::new("prism.example.com")
            .unwrap()
            .with_tls_verify(false);

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: PrismConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.endpoint, "prism.example.com");
        assert!(!deserialized.tls_verify);
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: PrismConfig = serde_json::from_str(r#"{"endpoint": "prism"}"#).unwrap();
        assert_eq!(config.port, 9440);
        assert!(config.tls_verify);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("admin", "hunter2");
        assert_eq!(credential.username(), "admin");
        assert_eq!(credential.password(), "hunter2");

        let debug = format!("{credential:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }
}
