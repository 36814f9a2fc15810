use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use bytes::Bytes;
use eyre::{Result, WrapErr};
use http_body_util::Full;
use hyper::{Request, Response, client::conn::http1};
use hyper_util::rt::TokioIo;
use rustls::{ClientConfig, RootCertStore, pki_types::ServerName};
use rustls_native_certs::load_native_certs;
use tokio::{net::TcpStream, time::timeout};
use tokio_rustls::TlsConnector;

use crate::{
    config::BackendConfig,
    core::identity::{BackendTarget, CertificatePair},
    ports::backend::{BackendConnector, BackendError, BackendResult},
};

/// Backend connector that opens a fresh mutual-TLS connection per request.
///
/// Connections are never pooled: every tenant authenticates with its own client
/// certificate, and an upgraded connection is consumed by its relay anyway.
pub struct MtlsConnector {
    roots: Arc<RootCertStore>,
    connect_timeout: Duration,
}

impl MtlsConnector {
    pub fn new(ca_cert_path: Option<&Path>, connect_timeout: Duration) -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let roots = load_roots(ca_cert_path)?;
        Ok(Self {
            roots: Arc::new(roots),
            connect_timeout,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(config.ca_cert_path.as_deref(), config.connect_timeout)
    }

    /// TLS client configuration presenting `certificates` as the client identity.
    pub fn client_config(&self, certificates: &CertificatePair) -> BackendResult<ClientConfig> {
        let mut cert_pem = certificates.cert_pem();
        let chain = rustls_pemfile::certs(&mut cert_pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError::InvalidCertificate(format!("unreadable certificate: {e}")))?;
        if chain.is_empty() {
            return Err(BackendError::InvalidCertificate(
                "no certificate found in PEM".to_string(),
            ));
        }

        let mut key_pem = certificates.key_pem();
        let key = rustls_pemfile::private_key(&mut key_pem)
            .map_err(|e| BackendError::InvalidCertificate(format!("unreadable private key: {e}")))?
            .ok_or_else(|| {
                BackendError::InvalidCertificate("no private key found in PEM".to_string())
            })?;

        let mut config = ClientConfig::builder()
            .with_root_certificates(self.roots.clone())
            .with_client_auth_cert(chain, key)
            .map_err(|e| BackendError::InvalidCertificate(e.to_string()))?;
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        Ok(config)
    }

    async fn connect(
        &self,
        target: &BackendTarget,
        config: ClientConfig,
    ) -> BackendResult<tokio_rustls::client::TlsStream<TcpStream>> {
        let server_name = ServerName::try_from(target.host().to_owned())
            .map_err(|e| BackendError::InvalidRequest(format!("invalid backend host: {e}")))?;
        let connector = TlsConnector::from(Arc::new(config));

        let handshake = async {
            let tcp = TcpStream::connect((target.host(), target.port()))
                .await
                .map_err(|e| BackendError::Connect(format!("{target}: {e}")))?;
            if let Err(e) = tcp.set_nodelay(true) {
                tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
            }
            connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| BackendError::Tls(format!("{target}: {e}")))
        };

        timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| BackendError::Timeout(self.connect_timeout))?
    }
}

#[async_trait]
impl BackendConnector for MtlsConnector {
    async fn send(
        &self,
        target: &BackendTarget,
        certificates: &CertificatePair,
        req: Request<Full<Bytes>>,
    ) -> BackendResult<Response<AxumBody>> {
        let config = self.client_config(certificates)?;
        let stream = self.connect(target, config).await?;

        let (mut sender, connection) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| BackendError::Protocol(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.with_upgrades().await {
                tracing::debug!(error = %e, "Backend connection closed with error");
            }
        });

        let response = sender
            .send_request(req)
            .await
            .map_err(|e| BackendError::Protocol(e.to_string()))?;
        tracing::debug!(status = %response.status(), backend = %target, "Backend responded");

        Ok(response.map(AxumBody::new))
    }
}

fn load_roots(ca_cert_path: Option<&Path>) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();

    let native_certs = load_native_certs();
    for cert in native_certs.certs {
        if roots.add(cert).is_err() {
            tracing::warn!("Failed to add native certificate to rustls RootCertStore");
        }
    }
    if !native_certs.errors.is_empty() {
        tracing::warn!(
            errors = ?native_certs.errors,
            "Some native certificates failed to load"
        );
    }

    if let Some(path) = ca_cert_path {
        let pem = std::fs::read(path)
            .wrap_err_with(|| format!("Failed to read backend CA bundle {}", path.display()))?;
        let mut reader = pem.as_slice();
        for cert in rustls_pemfile::certs(&mut reader) {
            let cert = cert.wrap_err_with(|| format!("Invalid PEM in {}", path.display()))?;
            roots
                .add(cert)
                .wrap_err_with(|| format!("Invalid CA certificate in {}", path.display()))?;
        }
    }

    tracing::info!(roots = roots.len(), "Backend trust roots loaded");
    Ok(roots)
}
