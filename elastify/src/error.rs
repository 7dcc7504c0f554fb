//! Error types for elastify

use serde_json::Value;

/// Errors raised while building or executing Elasticsearch requests
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Call to undefined method {0}()")]
    UndefinedMethod(String),

    #[error("Elasticsearch connection [{0}] not configured")]
    ConnectionNotConfigured(String),

    #[error("No hosts configured for connection")]
    NoHosts,

    #[error("Query is not bound to a connection")]
    NoConnection,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Request signing failed: {0}")]
    Signing(String),

    #[error("Elasticsearch error ({status}) {error_type}: {reason}")]
    Api {
        status: u16,
        error_type: String,
        reason: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an API error from a cluster error response body.
    ///
    /// Elasticsearch replies with `{"error": {"type": .., "reason": ..}, "status": ..}`
    /// for most failures, but older versions and proxies send a bare string.
    pub fn from_response(status: u16, body: &Value) -> Self {
        let error = body.get("error");

        let error_type = error
            .and_then(|e| e.get("type"))
            .and_then(Value::as_str)
            .unwrap_or(match status {
                404 => "not_found",
                401 | 403 => "security_exception",
                _ => "http_error",
            })
            .to_string();

        let reason = error
            .and_then(|e| e.get("reason").and_then(Value::as_str).or_else(|| e.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());

        Self::Api {
            status,
            error_type,
            reason,
        }
    }

    /// Whether the cluster answered 404 for this request
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// HTTP status reported by the cluster, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
