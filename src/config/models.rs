//! Configuration data structures for kubegate.
//!
//! These types map directly to YAML (also JSON / TOML) configuration files. Every
//! section has defaults so a minimal file only needs the tenant table.
use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::duration_format;
use crate::core::filter::Selector;

/// Main server configuration structure
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the gateway listens on (e.g. "0.0.0.0:8443")
    pub listen_addr: String,
    pub backend: BackendConfig,
    pub retry: RetryConfig,
    pub annotations: AnnotationConfig,
    pub upgrade: UpgradeConfig,
    pub auth: AuthConfig,
    pub filters: FilterConfig,
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8443".to_string(),
            backend: BackendConfig::default(),
            retry: RetryConfig::default(),
            annotations: AnnotationConfig::default(),
            upgrade: UpgradeConfig::default(),
            auth: AuthConfig::default(),
            filters: FilterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Tenant API server connection settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    /// Port every tenant API server listens on; any port in the resolved node is replaced
    pub port: u16,
    /// Extra CA bundle trusted for backend server certificates
    pub ca_cert_path: Option<PathBuf>,
    /// Limit on TCP connect plus TLS handshake
    #[serde(with = "duration_format")]
    pub connect_timeout: Duration,
    /// Largest inbound body read for annotation injection
    pub max_request_body_bytes: usize,
    /// Largest backend response buffered for filtering
    pub max_response_body_bytes: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            port: 6443,
            ca_cert_path: None,
            connect_timeout: Duration::from_secs(10),
            max_request_body_bytes: 4 * 1024 * 1024,
            max_response_body_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Outbound dispatch retry settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    #[serde(with = "duration_format")]
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

/// Tenant annotation injected into workload-creating request bodies
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Annotation key written into the object's annotations
    pub annotation_key: String,
    /// Key inside the JSON annotation value naming the tenant namespace
    pub tenant_label: String,
    /// HTTP methods whose bodies are annotated
    pub methods: Vec<String>,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            annotation_key: "containers-annotations.alpha.kubernetes.io".to_string(),
            tenant_label: "kubegate.io/tenant".to_string(),
            methods: vec!["POST".to_string()],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Answer upgrades to anything but `tcp` with 501 instead of relaying them
    pub reject_non_tcp: bool,
}

/// Static tenant table used by the file credential provider
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// Header carrying the caller's token (a `Bearer ` prefix is accepted)
    pub token_header: String,
    /// Namespace derived from the tenant space; `{space_id}` is substituted
    pub namespace_template: String,
    pub tenants: Vec<TenantConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_header: "authorization".to_string(),
            namespace_template: "s{space_id}-default".to_string(),
            tenants: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TenantConfig {
    pub token: String,
    /// Node (host, host:port or URL) hosting the tenant's API server
    pub node: String,
    pub space_id: String,
    /// PEM client certificate chain
    pub cert_path: PathBuf,
    /// PEM private key
    pub key_path: PathBuf,
    /// Reject the tenant's requests with 403
    pub disabled: bool,
}

/// Response redaction settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct FilterConfig {
    /// Install the node/host scrubbing rules
    pub builtin_rules: bool,
    /// Replacement for node names
    pub placeholder_host: String,
    /// Replacement for host IPs
    pub placeholder_ip: String,
    /// Extra rules appended after the built-in ones
    pub rules: Vec<FilterRuleConfig>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            builtin_rules: true,
            placeholder_host: "host".to_string(),
            placeholder_ip: "1.1.1.1".to_string(),
            rules: Vec::new(),
        }
    }
}

/// One extra redaction rule declared in configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FilterRuleConfig {
    /// Resource kind the rule applies to (e.g. "Node")
    pub kind: String,
    pub selector: Selector,
    /// Field of the selected parent object to act on
    pub field: String,
    pub action: FilterActionConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterActionConfig {
    Remove,
    Blank,
    Replace { value: Value },
    RegexReplace { pattern: String, replacement: String },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}
