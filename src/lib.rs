//! kubegate - a multi-tenant forwarding gateway for the Kubernetes API.
//!
//! For every inbound API request the gateway resolves the caller's tenant, confines
//! the request to the tenant's namespace, forwards it over mutual TLS to the
//! tenant's API server and scrubs cluster-internal fields (node names, host IPs,
//! scheduler diagnostics) out of the JSON response. Upgraded connections (`exec`,
//! `attach`, `port-forward`) and byte streams are relayed untouched.
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations) while
//! keeping the forwarding logic inside `core`:
//! - [`core::rewriter`] scopes paths and bodies to the tenant namespace
//! - [`core::forwarding`] dispatches with retry and picks buffered relay or hijack
//! - [`core::hijack`] bridges raw bytes once HTTP framing is gone
//! - [`core::filter`] is the declarative response redaction engine
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use kubegate::{
//!     adapters::{FileCredentialProvider, MtlsConnector},
//!     config::ServerConfig,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config: ServerConfig = kubegate::config::loader::load_config("kubegate.yaml").await?;
//! let credentials = Arc::new(FileCredentialProvider::new(&config.auth)?);
//! let connector = Arc::new(MtlsConnector::from_config(&config.backend)?);
//! let app = kubegate::build_router(&config, credentials, connector, CancellationToken::new())?;
//! let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
//! axum::serve(listener, app).await?;
//! # Ok(()) }
//! ```
//!
//! # Error Handling
//! Request-level failures are [`core::GatewayError`] values rendered as Kubernetes
//! `Status` objects. Start-up and configuration APIs return `eyre::Result<T>`.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

use std::sync::Arc;

use axum::Router;
use eyre::{Result, WrapErr};
use http::HeaderName;
use tokio_util::sync::CancellationToken;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{FileCredentialProvider, KubeHandler, MtlsConnector},
    config::ServerConfig,
    core::{ForwardingEngine, ResponseFilterEngine},
    ports::{BackendConnector, CredentialProvider},
    utils::GracefulShutdown,
};
use crate::core::{FilterRegistry, RequestRewriter, RetryPolicy};

/// Build the forwarding engine described by `config` on top of `connector`.
pub fn build_engine(
    config: &ServerConfig,
    connector: Arc<dyn BackendConnector>,
    relay_cancel: CancellationToken,
) -> Result<ForwardingEngine> {
    let registry = Arc::new(FilterRegistry::from_config(&config.filters));
    let rewriter = RequestRewriter::from_config(&config.annotations)
        .wrap_err("Invalid annotation configuration")?;
    let credential_header = HeaderName::from_bytes(config.auth.token_header.as_bytes())
        .wrap_err_with(|| format!("Invalid token header '{}'", config.auth.token_header))?;

    Ok(
        ForwardingEngine::new(connector, ResponseFilterEngine::new(registry), rewriter)
            .with_retry_policy(RetryPolicy::from(&config.retry))
            .with_upgrade_policy(config.upgrade.reject_non_tcp)
            .with_body_limits(
                config.backend.max_request_body_bytes,
                config.backend.max_response_body_bytes,
            )
            .with_credential_header(credential_header)
            .with_relay_cancellation(relay_cancel),
    )
}

/// Build the complete axum application.
pub fn build_router(
    config: &ServerConfig,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn BackendConnector>,
    relay_cancel: CancellationToken,
) -> Result<Router> {
    let engine = build_engine(config, connector, relay_cancel)?;
    let handler = KubeHandler::new(credentials, Arc::new(engine), config.backend.port);
    Ok(adapters::router(Arc::new(handler)))
}
