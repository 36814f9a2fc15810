//! Caller-visible failures of the forwarding pipeline.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde_json::json;

use super::rewriter::RewriteError;
use crate::ports::{BackendError, CredentialError};

pub const INCOMPLETE_IDENTITY_MESSAGE: &str =
    "Incomplete data received from authentication component";
pub const TRANSPORT_FAILURE_MESSAGE: &str =
    "Kubernetes service unavailable or disabled for this shard";

/// Result type for gateway request handling
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Every way a forwarded request can fail before (or instead of) reaching the
/// caller as a backend response.
///
/// Relay errors after a connection has been hijacked are not represented here;
/// they only close the connection.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// Credential check denied the caller
    #[error("{0}")]
    Unauthorized(String),

    /// Credential check failed with a non-auth status
    #[error("{message}")]
    AuthBackendFailure { status: StatusCode, message: String },

    /// Credential check succeeded but node or space is missing
    #[error("{}", INCOMPLETE_IDENTITY_MESSAGE)]
    IncompleteIdentity,

    /// The tenant's certificate pair could not be obtained or used
    #[error("Error retrieving client certificate: {0}")]
    CertificateFailure(String),

    /// Tenant annotation could not be injected into the request body
    #[error("Error updating Kube body: {0}")]
    BodyRewriteFailure(#[from] RewriteError),

    /// Every forward attempt failed at the transport level
    #[error("{}", TRANSPORT_FAILURE_MESSAGE)]
    TransportFailure(#[source] BackendError),

    /// Path is not one the gateway forwards
    #[error("Unsupported URI: {0}")]
    UnsupportedUri(String),

    /// Upgrade protocol other than TCP while strict upgrade handling is on
    #[error("Unsupported upgrade protocol: {0}")]
    UnsupportedUpgrade(String),

    /// Inbound request body exceeded the configured limit
    #[error("Request body larger than {0} bytes")]
    RequestTooLarge(usize),

    /// Inbound request body could not be read
    #[error("Error reading request body: {0}")]
    RequestBody(String),

    /// Any other I/O failure while relaying the backend response
    #[error("Error relaying backend response: {0}")]
    Upstream(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AuthBackendFailure { status, .. } => *status,
            GatewayError::IncompleteIdentity => StatusCode::NOT_FOUND,
            GatewayError::CertificateFailure(_) => StatusCode::BAD_GATEWAY,
            GatewayError::BodyRewriteFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::TransportFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UnsupportedUri(_) => StatusCode::NOT_FOUND,
            GatewayError::UnsupportedUpgrade(_) => StatusCode::NOT_IMPLEMENTED,
            GatewayError::RequestTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::RequestBody(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<CredentialError> for GatewayError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::Unauthorized(message) => GatewayError::Unauthorized(message),
            CredentialError::Backend { status, .. } if status == StatusCode::UNAUTHORIZED => {
                GatewayError::Unauthorized(e.to_string())
            }
            CredentialError::Backend { status, message } => {
                // Only error statuses are meaningful to echo back.
                let status = if status.is_client_error() || status.is_server_error() {
                    status
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                GatewayError::AuthBackendFailure { status, message }
            }
            CredentialError::Certificate(message) => GatewayError::CertificateFailure(message),
        }
    }
}

impl From<BackendError> for GatewayError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::InvalidCertificate(message) => GatewayError::CertificateFailure(message),
            other => GatewayError::TransportFailure(other),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = ?self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "Request rejected");
        }

        let body = json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;

    async fn render(error: GatewayError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_status_body_shape() {
        let (status, body) = render(GatewayError::IncompleteIdentity).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "Status");
        assert_eq!(body["status"], "Failure");
        assert_eq!(body["code"], 404);
        assert_eq!(body["message"], INCOMPLETE_IDENTITY_MESSAGE);
    }

    #[tokio::test]
    async fn test_transport_failure_hides_transport_detail() {
        let error = GatewayError::from(BackendError::Connect("connection refused".into()));
        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], TRANSPORT_FAILURE_MESSAGE);
    }

    #[test]
    fn test_credential_error_mapping() {
        let unauthorized = GatewayError::from(CredentialError::Unauthorized("no token".into()));
        assert_eq!(unauthorized.status_code(), StatusCode::UNAUTHORIZED);

        let denied = GatewayError::from(CredentialError::Backend {
            status: StatusCode::UNAUTHORIZED,
            message: "denied".into(),
        });
        assert_eq!(denied.status_code(), StatusCode::UNAUTHORIZED);

        let forbidden = GatewayError::from(CredentialError::Backend {
            status: StatusCode::FORBIDDEN,
            message: "disabled".into(),
        });
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

        let odd = GatewayError::from(CredentialError::Backend {
            status: StatusCode::OK,
            message: "ok?".into(),
        });
        assert_eq!(odd.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let cert = GatewayError::from(CredentialError::Certificate("missing".into()));
        assert_eq!(cert.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_backend_error_mapping() {
        let cert = GatewayError::from(BackendError::InvalidCertificate("bad pem".into()));
        assert!(matches!(cert, GatewayError::CertificateFailure(_)));

        let timeout = GatewayError::from(BackendError::Timeout(std::time::Duration::from_secs(5)));
        assert_eq!(timeout.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_body_rewrite_failure_message() {
        let error = GatewayError::from(RewriteError::NotAnObject {
            segment: "metadata".into(),
            found: "a string",
        });
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error.to_string().starts_with("Error updating Kube body: "));
    }
}
