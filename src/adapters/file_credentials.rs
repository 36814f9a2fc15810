use std::collections::HashMap;

use async_trait::async_trait;
use http::{HeaderMap, HeaderName, StatusCode};

use crate::{
    config::{AuthConfig, TenantConfig},
    core::identity::{CertificatePair, Identity},
    ports::credentials::{CredentialError, CredentialProvider, CredentialResult},
};

const BEARER_PREFIX: &str = "Bearer ";

/// Credential provider backed by the static tenant table in the configuration.
///
/// Tokens map to tenants; certificate pairs are read from disk on every request so
/// that rotated files are picked up without a restart. Certificates are looked up
/// by `(space_id, node)` in declaration order.
pub struct FileCredentialProvider {
    token_header: HeaderName,
    namespace_template: String,
    tenants: Vec<TenantConfig>,
    by_token: HashMap<String, usize>,
}

impl FileCredentialProvider {
    pub fn new(config: &AuthConfig) -> eyre::Result<Self> {
        let token_header = HeaderName::from_bytes(config.token_header.as_bytes())
            .map_err(|e| eyre::eyre!("Invalid token header '{}': {e}", config.token_header))?;

        let by_token = config
            .tenants
            .iter()
            .enumerate()
            .map(|(i, tenant)| (tenant.token.clone(), i))
            .collect::<HashMap<_, _>>();
        tracing::info!(tenants = by_token.len(), "Loaded tenant credential table");

        Ok(Self {
            token_header,
            namespace_template: config.namespace_template.clone(),
            tenants: config.tenants.clone(),
            by_token,
        })
    }

    fn token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        let value = headers.get(&self.token_header)?.to_str().ok()?.trim();
        let token = value.strip_prefix(BEARER_PREFIX).unwrap_or(value).trim();
        (!token.is_empty()).then_some(token)
    }

    fn tenant_for(&self, identity: &Identity) -> Option<&TenantConfig> {
        self.tenants
            .iter()
            .find(|tenant| tenant.space_id == identity.space_id && tenant.node == identity.node)
    }
}

#[async_trait]
impl CredentialProvider for FileCredentialProvider {
    async fn resolve_identity(&self, headers: &HeaderMap) -> CredentialResult<Identity> {
        let Some(token) = self.token(headers) else {
            return Err(CredentialError::Unauthorized(format!(
                "missing {} header",
                self.token_header
            )));
        };
        let Some(tenant) = self.by_token.get(token).map(|&i| &self.tenants[i]) else {
            return Err(CredentialError::Unauthorized("unknown token".to_string()));
        };
        if tenant.disabled {
            return Err(CredentialError::Backend {
                status: StatusCode::FORBIDDEN,
                message: format!("Tenant space {} is disabled", tenant.space_id),
            });
        }

        Ok(Identity::new(&tenant.node, &tenant.space_id))
    }

    async fn certificates(&self, identity: &Identity) -> CredentialResult<CertificatePair> {
        let tenant = self.tenant_for(identity).ok_or_else(|| {
            CredentialError::Certificate(format!("no certificates for space {}", identity.space_id))
        })?;

        let cert_pem = tokio::fs::read(&tenant.cert_path).await.map_err(|e| {
            CredentialError::Certificate(format!("{}: {e}", tenant.cert_path.display()))
        })?;
        let key_pem = tokio::fs::read(&tenant.key_path).await.map_err(|e| {
            CredentialError::Certificate(format!("{}: {e}", tenant.key_path.display()))
        })?;

        Ok(CertificatePair::new(cert_pem, key_pem))
    }

    fn namespace_for(&self, identity: &Identity) -> String {
        self.namespace_template
            .replace("{space_id}", &identity.space_id)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use http::HeaderValue;
    use tempfile::NamedTempFile;

    use super::*;

    fn tenant(token: &str, space_id: &str, cert: &NamedTempFile, key: &NamedTempFile) -> TenantConfig {
        TenantConfig {
            token: token.to_string(),
            node: "https://kube-shard-1:443".to_string(),
            space_id: space_id.to_string(),
            cert_path: cert.path().to_path_buf(),
            key_path: key.path().to_path_buf(),
            disabled: false,
        }
    }

    fn pem_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[tokio::test]
    async fn test_resolves_identity_and_certificates() {
        let cert = pem_file("CERT");
        let key = pem_file("KEY");
        let config = AuthConfig {
            tenants: vec![tenant("secret-1", "42", &cert, &key)],
            ..AuthConfig::default()
        };
        let provider = FileCredentialProvider::new(&config).unwrap();

        let identity = provider
            .resolve_identity(&headers("Bearer secret-1"))
            .await
            .unwrap();
        assert_eq!(identity.space_id, "42");
        assert!(identity.is_complete());
        assert_eq!(provider.namespace_for(&identity), "s42-default");

        let pair = provider.certificates(&identity).await.unwrap();
        assert_eq!(pair.cert_pem(), b"CERT");
        assert_eq!(pair.key_pem(), b"KEY");

        // Bare tokens are accepted as well.
        assert!(provider.resolve_identity(&headers("secret-1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_or_missing_token() {
        let provider = FileCredentialProvider::new(&AuthConfig::default()).unwrap();

        let missing = provider.resolve_identity(&HeaderMap::new()).await;
        assert!(matches!(missing, Err(CredentialError::Unauthorized(_))));

        let unknown = provider.resolve_identity(&headers("Bearer nope")).await;
        assert!(matches!(unknown, Err(CredentialError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_disabled_tenant() {
        let cert = pem_file("CERT");
        let key = pem_file("KEY");
        let mut disabled = tenant("secret-2", "7", &cert, &key);
        disabled.disabled = true;
        let config = AuthConfig {
            tenants: vec![disabled],
            ..AuthConfig::default()
        };
        let provider = FileCredentialProvider::new(&config).unwrap();

        let err = provider
            .resolve_identity(&headers("Bearer secret-2"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Backend { status, .. } if status == StatusCode::FORBIDDEN
        ));
    }

    #[tokio::test]
    async fn test_missing_certificate_file() {
        let cert = pem_file("CERT");
        let key = pem_file("KEY");
        let mut broken = tenant("secret-3", "9", &cert, &key);
        broken.key_path = "/nonexistent/tenant.key".into();
        let config = AuthConfig {
            tenants: vec![broken],
            ..AuthConfig::default()
        };
        let provider = FileCredentialProvider::new(&config).unwrap();

        let identity = provider
            .resolve_identity(&headers("Bearer secret-3"))
            .await
            .unwrap();
        let err = provider.certificates(&identity).await.unwrap_err();
        assert!(matches!(err, CredentialError::Certificate(_)));
    }

    #[tokio::test]
    async fn test_shared_space_uses_first_declared_certificates() {
        let (cert_a, key_a) = (pem_file("CERT-A"), pem_file("KEY-A"));
        let (cert_b, key_b) = (pem_file("CERT-B"), pem_file("KEY-B"));
        let config = AuthConfig {
            tenants: vec![
                tenant("first", "42", &cert_a, &key_a),
                tenant("second", "42", &cert_b, &key_b),
            ],
            ..AuthConfig::default()
        };
        let provider = FileCredentialProvider::new(&config).unwrap();

        for token in ["Bearer first", "Bearer second"] {
            let identity = provider.resolve_identity(&headers(token)).await.unwrap();
            let pair = provider.certificates(&identity).await.unwrap();
            assert_eq!(pair.cert_pem(), b"CERT-A");
        }
    }

    #[tokio::test]
    async fn test_custom_token_header_and_template() {
        let cert = pem_file("CERT");
        let key = pem_file("KEY");
        let config = AuthConfig {
            token_header: "x-tenant-token".to_string(),
            namespace_template: "tenant-{space_id}".to_string(),
            tenants: vec![tenant("abc", "5", &cert, &key)],
        };
        let provider = FileCredentialProvider::new(&config).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-token", HeaderValue::from_static("abc"));
        let identity = provider.resolve_identity(&headers).await.unwrap();
        assert_eq!(provider.namespace_for(&identity), "tenant-5");
    }
}
