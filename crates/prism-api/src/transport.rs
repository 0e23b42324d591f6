//! Authenticated request dispatch against the v3 API.
//!
//! [`Transport`] is the seam the resolver, task tracker and VM service are written
//! against; [`PrismClient`] is its reqwest implementation. One call is one
//! request/response cycle: nothing is retried and no connection state is shared
//! beyond the pooled HTTP client.

use async_trait::async_trait;
use prism_core::client::{ClientConfig, CLIENT_TYPE, CLIENT_TYPE_HEADER};
use prism_core::config::{Credential, PrismConfig};
use prism_core::uuid::UuidPolicy;
use prism_core::{Error, RequestTrace, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::resolver::EntityResolver;
use crate::task::TaskTracker;
use crate::vm::VmService;

const USER_AGENT: &str = concat!("prism-api/", env!("CARGO_PKG_VERSION"));
const JSON: &str = "application/json";

/// One request to dispatch: method, path relative to the API root, optional body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the API root, e.g. `/vms/list`
    pub path: String,
    /// JSON body; omitted from the wire entirely when `None`
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Create a request.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }

    /// `GET path` without a body.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path, None)
    }

    /// `POST path` with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path, Some(body))
    }

    /// `PUT path` with a JSON body.
    #[must_use]
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path, Some(body))
    }

    /// `DELETE path` without a body.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path, None)
    }

    /// Method, path and body as attached to server errors.
    #[must_use]
    pub fn trace(&self) -> RequestTrace {
        RequestTrace {
            method: self.method.to_string(),
            path: self.path.clone(),
            body: self.body.clone(),
        }
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.trace())
    }
}

/// Performs a single request/response cycle and classifies the outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatch `request` and return the parsed response document.
    ///
    /// A success with an empty body yields an empty JSON object.
    async fn dispatch(&self, request: ApiRequest) -> Result<Value>;
}

/// Builder for [`PrismClient`].
#[derive(Debug)]
pub struct PrismClientBuilder {
    config: PrismConfig,
    http_config: ClientConfig,
    credential: Option<Credential>,
}

impl PrismClientBuilder {
    /// Create a builder for the given endpoint configuration.
    #[must_use]
    pub fn new(config: PrismConfig) -> Self {
        let http_config = ClientConfig::new().with_timeout(config.timeout());
        Self {
            config,
            http_config,
            credential: None,
        }
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Configure HTTP basic authentication.
    #[must_use]
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credential = Some(Credential::new(username, password));
        self
    }

    /// Use an existing credential.
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Build the client instance.
    ///
    /// A missing credential is not an error here: dispatch reports it as
    /// `NotConfigured` until one is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is missing, the configuration is invalid or
    /// the CA certificate cannot be loaded.
    pub fn build(self) -> Result<PrismClient> {
        self.config.ensure_valid()?;
        let api_root = self.config.api_root()?;

        let mut builder = ClientBuilder::new()
            .timeout(self.http_config.timeout)
            .user_agent(USER_AGENT)
            .pool_idle_timeout(self.http_config.pool_idle_timeout)
            .pool_max_idle_per_host(self.http_config.pool_max_idle_per_host)
            .connect_timeout(self.http_config.connect_timeout);

        if !self.http_config.enable_compression {
            builder = builder.no_gzip();
        }

        if !self.config.tls_verify {
            warn!(endpoint = %api_root, "TLS verification disabled for Prism client");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ca_cert) = &self.config.tls_ca_cert {
            debug!("loading Prism CA certificate from {}", ca_cert.display());
            let bytes = std::fs::read(ca_cert).map_err(|err| {
                Error::ConfigError(format!(
                    "Failed to read Prism CA certificate {}: {err}",
                    ca_cert.display()
                ))
            })?;
            let cert = reqwest::Certificate::from_pem(&bytes)
                .map_err(|err| Error::ConfigError(format!("Invalid Prism CA certificate: {err}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder.build().map_err(|err| {
            Error::ConfigError(format!("Failed to build Prism HTTP client: {err}"))
        })?;

        Ok(PrismClient {
            http,
            api_root,
            credential: Arc::new(RwLock::new(self.credential.map(Arc::new))),
            uuid_policy: self.config.uuid_policy,
            enable_logging: self.http_config.enable_logging,
        })
    }
}

/// Asynchronous client for the Prism v3 API.
///
/// Clones share the HTTP connection pool and the credential slot.
#[derive(Clone)]
pub struct PrismClient {
    http: Client,
    api_root: Url,
    credential: Arc<RwLock<Option<Arc<Credential>>>>,
    uuid_policy: UuidPolicy,
    enable_logging: bool,
}

impl PrismClient {
    /// Construct a client with basic-auth credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: PrismConfig, credential: Credential) -> Result<Self> {
        PrismClientBuilder::new(config)
            .with_credential(credential)
            .build()
    }

    /// Start a builder.
    #[must_use]
    pub fn builder(config: PrismConfig) -> PrismClientBuilder {
        PrismClientBuilder::new(config)
    }

    /// Access the API root URL.
    #[must_use]
    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    /// Identifier checking applied by services built from this client.
    #[must_use]
    pub const fn uuid_policy(&self) -> UuidPolicy {
        self.uuid_policy
    }

    /// Replace the credential; the next dispatch authenticates with it.
    pub fn set_credential(&self, credential: Credential) {
        let mut slot = self.credential.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(credential));
    }

    /// Remove the credential; dispatch fails with `NotConfigured` until one is set.
    pub fn clear_credential(&self) {
        let mut slot = self.credential.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    /// Name resolver sharing this client.
    #[must_use]
    pub fn resolver(&self) -> EntityResolver {
        EntityResolver::new(Arc::new(self.clone())).with_policy(self.uuid_policy)
    }

    /// Task tracker sharing this client.
    #[must_use]
    pub fn tasks(&self) -> TaskTracker {
        TaskTracker::new(Arc::new(self.clone()))
    }

    /// VM operations sharing this client.
    #[must_use]
    pub fn vms(&self) -> VmService {
        VmService::new(Arc::new(self.clone())).with_policy(self.uuid_policy)
    }

    fn current_credential(&self) -> Option<Arc<Credential>> {
        // The slot holds a whole `Arc`, so a poisoned lock still guards a valid value.
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        let root = self.api_root.as_str().trim_end_matches('/');
        let url = if path.starts_with('/') {
            format!("{root}{path}")
        } else {
            format!("{root}/{path}")
        };
        Url::parse(&url)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid Prism path `{path}`: {err}")))
    }
}

impl fmt::Debug for PrismClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrismClient")
            .field("api_root", &self.api_root.as_str())
            .field("uuid_policy", &self.uuid_policy)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for PrismClient {
    async fn dispatch(&self, request: ApiRequest) -> Result<Value> {
        let Some(credential) = self.current_credential() else {
            return Err(Error::NotConfigured(
                "Prism credential is not set".to_string(),
            ));
        };

        let url = self.build_url(&request.path)?;
        if self.enable_logging {
            info!(method = %request.method, path = %request.path, "Prism request");
        }
        debug!("{request}");

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .basic_auth(credential.username(), Some(credential.password()))
            .header(CONTENT_TYPE, JSON)
            .header(ACCEPT, JSON)
            .header(CLIENT_TYPE_HEADER, CLIENT_TYPE);
        if let Some(body) = &request.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| {
            Error::Network(format!("Failed to read Prism response body: {err}"))
        })?;

        if status == StatusCode::OK || status == StatusCode::ACCEPTED {
            return parse_success(&request.path, &bytes);
        }

        Err(server_error(status, &bytes, &request))
    }
}

fn parse_success(path: &str, bytes: &[u8]) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes).map_err(|err| {
        Error::InvalidResponse(format!("Failed to parse Prism response for `{path}`: {err}"))
    })
}

fn server_error(status: StatusCode, bytes: &[u8], request: &ApiRequest) -> Error {
    let text = String::from_utf8_lossy(bytes).trim().to_string();
    let body: Option<Value> = serde_json::from_slice(bytes).ok();
    let message = body
        .as_ref()
        .and_then(error_message)
        .or_else(|| (!text.is_empty()).then(|| text.clone()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string()
        });

    debug!(status = status.as_u16(), %message, "Prism request rejected");

    Error::ServerError {
        status: status.as_u16(),
        message,
        request: Some(Box::new(request.trace())),
        body,
    }
}

/// Extract the human-readable message from a v3 error body.
///
/// The server reports either a top-level `message` or a `message_list` of
/// `{message, reason}` entries.
fn error_message(body: &Value) -> Option<String> {
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    let messages: Vec<&str> = body
        .get("message_list")?
        .as_array()?
        .iter()
        .filter_map(|entry| entry.get("message").and_then(Value::as_str))
        .collect();
    (!messages.is_empty()).then(|| messages.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> PrismClient {
        let config = PrismConfig::new("prism.example.com").unwrap();
        PrismClient::new(config, Credential::new("admin", "secret")).unwrap()
    }

    #[test]
    fn test_build_url_appends_path_to_root() {
        let client = client();
        assert_eq!(
            client.build_url("/vms/list").unwrap().as_str(),
            "https://prism.example.com:9440/api/nutanix/v3/vms/list"
        );
        assert_eq!(
            client.build_url("tasks/T-1").unwrap().as_str(),
            "https://prism.example.com:9440/api/nutanix/v3/tasks/T-1"
        );
    }

    #[test]
    fn test_request_display() {
        let request = ApiRequest::post("/vms/list", json!({"kind": "vm"}));
        assert_eq!(request.to_string(), "POST /vms/list\n{\"kind\":\"vm\"}");
        assert_eq!(ApiRequest::delete("/vms/abc").to_string(), "DELETE /vms/abc");
    }

    #[test]
    fn test_error_message_variants() {
        assert_eq!(
            error_message(&json!({"message": "vm not found"})).as_deref(),
            Some("vm not found")
        );
        assert_eq!(
            error_message(&json!({
                "state": "ERROR",
                "message_list": [
                    {"message": "bad spec", "reason": "INVALID_REQUEST"},
                    {"message": "memory too small"}
                ]
            }))
            .as_deref(),
            Some("bad spec; memory too small")
        );
        assert_eq!(error_message(&json!({"code": 500})), None);
    }

    #[test]
    fn test_server_error_falls_back_to_text_then_reason() {
        let request = ApiRequest::get("/vms/x");
        let err = server_error(StatusCode::BAD_GATEWAY, b"upstream down", &request);
        assert_eq!(err.server_message(), Some("upstream down"));
        assert_eq!(err.http_status(), Some(502));

        let err = server_error(StatusCode::UNAUTHORIZED, b"", &request);
        assert_eq!(err.server_message(), Some("Unauthorized"));
        assert!(err.diagnostic().unwrap().starts_with("GET /vms/x"));
    }

    #[test]
    fn test_parse_success_empty_body() {
        assert_eq!(parse_success("/vms", b"").unwrap(), json!({}));
        assert_eq!(parse_success("/vms", b"  \n").unwrap(), json!({}));
        assert!(matches!(
            parse_success("/vms", b"<html>"),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_debug_hides_credential() {
        let debug = format!("{:?}", client());
        assert!(!debug.contains("secret"));
        assert!(debug.contains("prism.example.com"));
    }

    #[test]
    fn test_credential_rotation_survives_poisoned_lock() {
        let client = client();
        let slot = Arc::clone(&client.credential);
        let _ = std::thread::spawn(move || {
            let _guard = slot.write().unwrap();
            panic!("writer panicked while holding the credential lock");
        })
        .join();
        assert!(client.credential.is_poisoned());

        client.set_credential(Credential::new("ops", "rotated"));
        assert_eq!(client.current_credential().unwrap().username(), "ops");

        client.clear_credential();
        assert!(client.current_credential().is_none());
    }

    #[test]
    fn test_tls_opt_out_builds() {
        let config = PrismConfig::new("prism").unwrap().with_tls_verify(false);
        assert!(PrismClient::builder(config).build().is_ok());
    }

    #[test]
    fn test_missing_ca_cert_is_config_error() {
        let config = PrismConfig::new("prism")
            .unwrap()
            .with_ca_cert("/nonexistent/prism-ca.pem".into());
        assert!(matches!(
            PrismClient::builder(config).build(),
            Err(Error::ConfigError(_))
        ));
    }
}
