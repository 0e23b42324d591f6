//! Error types for Prism operations.
//!
//! This module provides the error taxonomy shared by the transport, resolver, payload
//! builder, and task tracker, along with the request diagnostics surfaced when the
//! server rejects a call.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::types::TaskStatus;

/// Main error type for Prism operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The client is missing its endpoint or credential
    #[error("Client not configured: {0}")]
    NotConfigured(String),

    /// Connection-level failure (DNS, TLS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status
    #[error("Server error {status}: {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Message extracted from the error body
        message: String,
        /// The request that produced the error
        request: Option<Box<RequestTrace>>,
        /// Parsed error body, when the server sent one
        body: Option<serde_json::Value>,
    },

    /// No entity matched the lookup
    #[error("Not found: {0}")]
    NotFound(String),

    /// More than one entity matched a name lookup
    #[error("Name `{name}` is ambiguous, {} candidates: {}", candidates.len(), format_candidates(candidates))]
    Ambiguous {
        /// The name that was looked up
        name: String,
        /// Every matching entity
        candidates: Vec<Candidate>,
    },

    /// Caller-supplied data failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid UUID format
    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),

    /// The task reached `FAILED` or `ABORTED`
    #[error("Task {task_uuid} {status}: {detail}")]
    TaskFailed {
        /// Task identifier
        task_uuid: String,
        /// Terminal status observed
        status: TaskStatus,
        /// Server-provided error detail, verbatim
        detail: String,
    },

    /// Waiting for a task exceeded the caller's deadline
    #[error("Timeout waiting for task: {0}")]
    Timeout(String),

    /// Waiting for a task was cancelled by the caller
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// The server response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Specialized result type for Prism operations.
pub type Result<T> = std::result::Result<T, Error>;

/// One entity matching an ambiguous name lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Position in the server's result list, used to disambiguate for a human
    pub index: usize,
    /// Entity uuid
    pub uuid: String,
    /// Entity name as reported by the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "#{} {} ({name})", self.index, self.uuid),
            None => write!(f, "#{} {}", self.index, self.uuid),
        }
    }
}

fn format_candidates(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Method, path, and body of a dispatched request.
///
/// Attached to [`Error::ServerError`] so callers can show what was sent. Never
/// contains headers, so the credential cannot leak through it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestTrace {
    /// HTTP method
    pub method: String,
    /// Path relative to the API root
    pub path: String,
    /// JSON body, if one was sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl fmt::Display for RequestTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        if let Some(body) = &self.body {
            write!(f, "\n{body}")?;
        }
        Ok(())
    }
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "NOT_CONFIGURED",
            Self::Network(_) => "NETWORK",
            Self::ServerError { .. } => "SERVER_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Ambiguous { .. } => "AMBIGUOUS",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidUuid(_) => "INVALID_UUID",
            Self::TaskFailed { .. } => "TASK_FAILED",
            Self::Timeout(_) => "TIMEOUT",
            Self::Cancelled(_) => "CANCELLED",
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
        }
    }

    /// HTTP status of a server error.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message reported by the server, if this error came from the server.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::ServerError { message, .. } => Some(message),
            Self::TaskFailed { detail, .. } => Some(detail),
            _ => None,
        }
    }

    /// Returns true when waiting may be resumed later with the same task handle.
    #[must_use]
    pub const fn is_resumable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Cancelled(_))
    }

    /// Render the request and the server's error body for debugging.
    ///
    /// Only server errors carry a diagnostic.
    #[must_use]
    pub fn diagnostic(&self) -> Option<String> {
        let Self::ServerError {
            status,
            message,
            request,
            body,
        } = self
        else {
            return None;
        };

        let mut out = String::new();
        if let Some(request) = request {
            out.push_str(&request.to_string());
            out.push('\n');
        }
        match body {
            Some(body) => {
                let pretty = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
                out.push_str(&format!("=> {status}\n{pretty}"));
            }
            None => out.push_str(&format!("=> {status} {message}")),
        }
        Some(out)
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Self::InvalidUuid(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server_error() -> Error {
        Error::ServerError {
            status: 404,
            message: "vm not found".to_string(),
            request: Some(Box::new(RequestTrace {
                method: "GET".to_string(),
                path: "/vms/abc".to_string(),
                body: None,
            })),
            body: Some(json!({"message": "vm not found"})),
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::NotConfigured("test".to_string()).error_code(),
            "NOT_CONFIGURED"
        );
        assert_eq!(Error::Network("test".to_string()).error_code(), "NETWORK");
        assert_eq!(server_error().error_code(), "SERVER_ERROR");
        assert_eq!(
            Error::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            Error::Ambiguous {
                name: "golden".to_string(),
                candidates: vec![]
            }
            .error_code(),
            "AMBIGUOUS"
        );
        assert_eq!(
            Error::TaskFailed {
                task_uuid: "T-1".to_string(),
                status: TaskStatus::Failed,
                detail: "boom".to_string()
            }
            .error_code(),
            "TASK_FAILED"
        );
        assert_eq!(Error::Timeout("test".to_string()).error_code(), "TIMEOUT");
        assert_eq!(
            Error::Cancelled("test".to_string()).error_code(),
            "CANCELLED"
        );
        assert_eq!(
            Error::InvalidResponse("test".to_string()).error_code(),
            "INVALID_RESPONSE"
        );
    }

    #[test]
    fn test_server_error_accessors() {
        let err = server_error();
        assert_eq!(err.http_status(), Some(404));
        assert_eq!(err.server_message(), Some("vm not found"));
        assert_eq!(err.to_string(), "Server error 404: vm not found");

        let err = Error::Network("dns".to_string());
        assert_eq!(err.http_status(), None);
        assert_eq!(err.server_message(), None);
    }

    #[test]
    fn test_ambiguous_display_lists_every_candidate() {
        let err = Error::Ambiguous {
            name: "golden".to_string(),
            candidates: vec![
                Candidate {
                    index: 0,
                    uuid: "IMG-2".to_string(),
                    name: Some("golden".to_string()),
                },
                Candidate {
                    index: 1,
                    uuid: "IMG-3".to_string(),
                    name: None,
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("2 candidates"));
        assert!(text.contains("#0 IMG-2 (golden)"));
        assert!(text.contains("#1 IMG-3"));
    }

    #[test]
    fn test_diagnostic_includes_request_and_body() {
        let diagnostic = server_error().diagnostic().unwrap();
        assert!(diagnostic.starts_with("GET /vms/abc\n"));
        assert!(diagnostic.contains("=> 404"));
        assert!(diagnostic.contains("vm not found"));

        assert!(Error::Timeout("t".to_string()).diagnostic().is_none());
    }

    #[test]
    fn test_request_trace_display() {
        let trace = RequestTrace {
            method: "POST".to_string(),
            path: "/vms/list".to_string(),
            body: Some(json!({"filter": "vm_name==web01"})),
        };
        assert_eq!(
            trace.to_string(),
            "POST /vms/list\n{\"filter\":\"vm_name==web01\"}"
        );
    }

    #[test]
    fn test_resumable() {
        assert!(Error::Timeout("t".to_string()).is_resumable());
        assert!(Error::Cancelled("c".to_string()).is_resumable());
        assert!(!Error::TaskFailed {
            task_uuid: "T-1".to_string(),
            status: TaskStatus::Aborted,
            detail: "aborted".to_string()
        }
        .is_resumable());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let prism_err: Error = err.into();
        assert!(matches!(prism_err, Error::InvalidEndpoint(_)));
    }

    #[test]
    fn test_from_uuid_error() {
        let err = uuid::Uuid::parse_str("not-a-uuid").unwrap_err();
        let prism_err: Error = err.into();
        assert!(matches!(prism_err, Error::InvalidUuid(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let prism_err: Error = err.into();
        assert!(matches!(prism_err, Error::InvalidResponse(_)));
    }
}
