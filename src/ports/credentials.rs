use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::core::identity::{CertificatePair, Identity};

/// Errors reported by a credential provider
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CredentialError {
    /// The caller presented no credential, or one the provider denied
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The credential check itself failed with the given status
    #[error("Credential backend returned {status}: {message}")]
    Backend {
        /// Status code reported by the credential check
        status: StatusCode,
        /// Human readable reason
        message: String,
    },

    /// The tenant's client certificate pair could not be retrieved
    #[error("Certificate retrieval failed: {0}")]
    Certificate(String),
}

/// Result type alias for credential operations
pub type CredentialResult<T> = Result<T, CredentialError>;

/// CredentialProvider defines the port for resolving who a caller is and which
/// mutual-TLS identity their requests are forwarded with
#[async_trait]
pub trait CredentialProvider: Send + Sync + 'static {
    /// Resolve the caller's identity from the inbound request headers
    async fn resolve_identity(&self, headers: &HeaderMap) -> CredentialResult<Identity>;

    /// Fetch the client certificate pair for an identity
    async fn certificates(&self, identity: &Identity) -> CredentialResult<CertificatePair>;

    /// Map a tenant identity to the Kubernetes namespace it is confined to
    fn namespace_for(&self, identity: &Identity) -> String;
}
