use std::{
    collections::{HashMap, HashSet, hash_map::Entry},
    net::SocketAddr,
};

use http::Method;
use regex::Regex;

use crate::config::models::{
    AnnotationConfig, AuthConfig, FilterActionConfig, FilterConfig, ServerConfig,
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration, reporting every problem at once
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if config.backend.port == 0 {
            errors.push(invalid("backend.port", "Port must be non-zero"));
        }
        if config.backend.max_request_body_bytes == 0 {
            errors.push(invalid(
                "backend.max_request_body_bytes",
                "Limit must be non-zero",
            ));
        }
        if config.backend.max_response_body_bytes == 0 {
            errors.push(invalid(
                "backend.max_response_body_bytes",
                "Limit must be non-zero",
            ));
        }
        if config.retry.max_attempts == 0 {
            errors.push(invalid("retry.max_attempts", "At least one attempt is required"));
        }

        Self::validate_annotations(&config.annotations, &mut errors);
        Self::validate_auth(&config.auth, &mut errors);
        Self::validate_filters(&config.filters, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8443')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_annotations(config: &AnnotationConfig, errors: &mut Vec<ValidationError>) {
        if config.annotation_key.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "annotations.annotation_key".to_string(),
            });
        }
        if config.tenant_label.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "annotations.tenant_label".to_string(),
            });
        }
        for method in &config.methods {
            if Method::from_bytes(method.to_ascii_uppercase().as_bytes()).is_err() {
                errors.push(invalid(
                    "annotations.methods",
                    format!("'{method}' is not a valid HTTP method"),
                ));
            }
        }
    }

    fn validate_auth(config: &AuthConfig, errors: &mut Vec<ValidationError>) {
        if config.token_header.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "auth.token_header".to_string(),
            });
        } else if http::HeaderName::from_bytes(config.token_header.as_bytes()).is_err() {
            errors.push(invalid(
                "auth.token_header",
                format!("'{}' is not a valid header name", config.token_header),
            ));
        }

        if !config.namespace_template.contains("{space_id}") {
            errors.push(invalid(
                "auth.namespace_template",
                "Template must contain '{space_id}'",
            ));
        }

        let mut tokens = HashSet::new();
        // Certificates are looked up by (space_id, node); one pair per key.
        let mut spaces = HashMap::new();
        for (i, tenant) in config.tenants.iter().enumerate() {
            let field = format!("auth.tenants[{i}]");
            if tenant.token.is_empty() {
                errors.push(invalid(&field, "Tenant token must not be empty"));
            } else if !tokens.insert(tenant.token.as_str()) {
                errors.push(invalid(&field, "Tenant token is not unique"));
            }
            if tenant.cert_path.as_os_str().is_empty() || tenant.key_path.as_os_str().is_empty() {
                errors.push(invalid(&field, "Both cert_path and key_path are required"));
            }

            let key = (tenant.space_id.as_str(), tenant.node.as_str());
            let pair = (&tenant.cert_path, &tenant.key_path);
            match spaces.entry(key) {
                Entry::Occupied(entry) => {
                    let (first, other) = *entry.get();
                    if other != pair {
                        errors.push(invalid(
                            &field,
                            format!(
                                "Space '{}' on node '{}' already uses different certificates in auth.tenants[{first}]",
                                tenant.space_id, tenant.node
                            ),
                        ));
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert((i, pair));
                }
            }
        }
    }

    fn validate_filters(config: &FilterConfig, errors: &mut Vec<ValidationError>) {
        for (i, rule) in config.rules.iter().enumerate() {
            let field = format!("filters.rules[{i}]");
            if rule.kind.trim().is_empty() {
                errors.push(invalid(&field, "Rule kind must not be empty"));
            }
            if rule.selector.path.is_empty() {
                errors.push(invalid(&field, "Selector path must not be empty"));
            }
            if rule.field.is_empty() {
                errors.push(invalid(&field, "Rule field must not be empty"));
            }
            if let FilterActionConfig::RegexReplace { pattern, .. } = &rule.action {
                if let Err(e) = Regex::new(pattern) {
                    errors.push(invalid(&field, format!("Invalid regex '{pattern}': {e}")));
                }
            }
        }
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        let lines: Vec<String> = errors
            .iter()
            .enumerate()
            .map(|(i, e)| format!("  {}. {e}", i + 1))
            .collect();
        format!(
            "Found {} configuration error(s):\n{}",
            errors.len(),
            lines.join("\n")
        )
    }
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidField {
        field: field.into(),
        message: message.into(),
    }
}
