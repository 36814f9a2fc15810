use async_trait::async_trait;
use axum::body::Body as AxumBody;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Response};
use thiserror::Error;

use crate::core::identity::{BackendTarget, CertificatePair};

/// Custom error type for backend dispatch
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BackendError {
    /// TCP connection to the backend failed
    #[error("Connection error: {0}")]
    Connect(String),

    /// Connecting or handshaking took longer than the configured timeout
    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// TLS handshake with the backend failed
    #[error("TLS error: {0}")]
    Tls(String),

    /// HTTP exchange with the backend failed
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The tenant's certificate pair could not be used for client auth
    #[error("Invalid client certificate: {0}")]
    InvalidCertificate(String),

    /// The outbound request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl BackendError {
    /// Whether another attempt could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::Connect(_)
                | BackendError::Timeout(_)
                | BackendError::Tls(_)
                | BackendError::Protocol(_)
        )
    }
}

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// BackendConnector defines the port for sending one request to a tenant's API
/// server over mutual TLS
#[async_trait]
pub trait BackendConnector: Send + Sync + 'static {
    /// Send `req` to `target`, authenticating with `certificates`
    ///
    /// The returned response keeps its extensions so that an upgrade on a
    /// `101 Switching Protocols` response can still be taken over by the caller.
    async fn send(
        &self,
        target: &BackendTarget,
        certificates: &CertificatePair,
        req: Request<Full<Bytes>>,
    ) -> BackendResult<Response<AxumBody>>;
}
