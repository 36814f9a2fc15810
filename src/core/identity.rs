use std::fmt;

/// Caller identity as resolved by the credential provider.
///
/// Immutable for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Node (or URL of the node) hosting the tenant's API server endpoint
    pub node: String,
    /// Tenant space identifier, mapped to a namespace by the provider
    pub space_id: String,
}

impl Identity {
    pub fn new(node: impl Into<String>, space_id: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            space_id: space_id.into(),
        }
    }

    /// Both the routing node and the tenant space are known.
    pub fn is_complete(&self) -> bool {
        !self.node.trim().is_empty() && !self.space_id.trim().is_empty()
    }
}

/// PEM encoded client certificate chain and private key of one tenant.
///
/// Fetched per request and only used for that request's outbound connection.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificatePair {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
}

impl CertificatePair {
    pub fn new(cert_pem: impl Into<Vec<u8>>, key_pem: impl Into<Vec<u8>>) -> Self {
        Self {
            cert_pem: cert_pem.into(),
            key_pem: key_pem.into(),
        }
    }

    pub fn cert_pem(&self) -> &[u8] {
        &self.cert_pem
    }

    pub fn key_pem(&self) -> &[u8] {
        &self.key_pem
    }
}

impl fmt::Debug for CertificatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificatePair")
            .field("cert_pem", &format_args!("{} bytes", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

/// Host and port of the API server a tenant's requests are sent to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendTarget {
    host: String,
    port: u16,
}

impl BackendTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Derive the target from a resolved node, which may carry an `http://` or
    /// `https://` scheme and its own port. Both are dropped in favour of
    /// `port`.
    pub fn from_node(node: &str, port: u16) -> Self {
        let node = node.trim();
        let without_scheme = node
            .strip_prefix("https://")
            .or_else(|| node.strip_prefix("http://"))
            .unwrap_or(node);
        let host = without_scheme
            .split(['/', ':'])
            .next()
            .unwrap_or(without_scheme);

        Self::new(host, port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, suitable for a `Host` header.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://{}:{}", self.host, self.port)
    }
}
