//! Tenant scoping of outbound requests.
//!
//! Two rewrites are applied before a request leaves the gateway:
//! the namespace segment of the path is forced to the caller's namespace, and
//! workload-creating bodies get an annotation naming the tenant.

use bytes::Bytes;
use http::{Method, Uri};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::AnnotationConfig;

const NAMESPACES_SEGMENT: &str = "namespaces";
const POD_ANNOTATIONS: &[&str] = &["metadata", "annotations"];
const TEMPLATE_ANNOTATIONS: &[&str] = &["spec", "template", "metadata", "annotations"];

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RewriteError {
    #[error("cannot inject annotation: `{segment}` is {found}, not an object")]
    NotAnObject {
        segment: String,
        found: &'static str,
    },

    #[error("failed to serialize annotated body: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid HTTP method `{0}` in annotation methods")]
    InvalidMethod(String),
}

#[derive(Debug, Clone)]
pub struct RequestRewriter {
    annotation_key: String,
    tenant_label: String,
    methods: Vec<Method>,
}

impl RequestRewriter {
    pub fn new(
        annotation_key: impl Into<String>,
        tenant_label: impl Into<String>,
        methods: Vec<Method>,
    ) -> Self {
        Self {
            annotation_key: annotation_key.into(),
            tenant_label: tenant_label.into(),
            methods,
        }
    }

    pub fn from_config(config: &AnnotationConfig) -> Result<Self, RewriteError> {
        let methods = config
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| RewriteError::InvalidMethod(m.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(
            &config.annotation_key,
            &config.tenant_label,
            methods,
        ))
    }

    /// Replace the segment following every `namespaces` segment with `namespace`.
    ///
    /// Empty segments (leading, trailing or doubled slashes) are preserved, and a
    /// trailing `namespaces` with nothing after it is left alone.
    pub fn rewrite_path(path: &str, namespace: &str) -> String {
        let mut replace_next = false;
        path.split('/')
            .map(|segment| {
                let rewritten = if replace_next { namespace } else { segment };
                replace_next = segment == NAMESPACES_SEGMENT;
                rewritten
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Rewrite the path of `uri` and return it as origin-form `path[?query]`.
    pub fn rewrite_uri(uri: &Uri, namespace: &str) -> String {
        let path = Self::rewrite_path(uri.path(), namespace);
        match uri.query() {
            Some(query) => format!("{path}?{query}"),
            None => path,
        }
    }

    pub fn annotates(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// Inject the tenant annotation into a request body when the method and the
    /// body's `kind` call for it; otherwise return `body` unchanged.
    ///
    /// Bodies that cannot be parsed are forwarded as-is. Failing to inject into a
    /// parsed body is an error.
    pub fn rewrite_body(
        &self,
        method: &Method,
        body: Bytes,
        namespace: &str,
    ) -> Result<Bytes, RewriteError> {
        if !self.annotates(method) {
            return Ok(body);
        }

        let mut document: Value = match serde_json::from_slice(&body) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, "Request body is not JSON, forwarding unchanged");
                return Ok(body);
            }
        };
        let Some(object) = document.as_object_mut() else {
            tracing::warn!("Request body is not a JSON object, forwarding unchanged");
            return Ok(body);
        };
        let Some(kind) = object.get("kind").and_then(Value::as_str) else {
            tracing::warn!("Request body has no string `kind`, forwarding unchanged");
            return Ok(body);
        };
        let Some(target) = annotation_target(kind) else {
            return Ok(body);
        };

        tracing::debug!(kind = kind, path = ?target, "Injecting tenant annotation");
        let value = self.annotation_value(namespace);
        insert_annotation(object, target, &self.annotation_key, value)?;

        let annotated = serde_json::to_vec(&document)?;
        Ok(Bytes::from(annotated))
    }

    /// JSON encoded `{"<tenant_label>": "<namespace>"}`.
    fn annotation_value(&self, namespace: &str) -> String {
        let mut entry = Map::new();
        entry.insert(
            self.tenant_label.clone(),
            Value::String(namespace.to_owned()),
        );
        Value::Object(entry).to_string()
    }
}

fn annotation_target(kind: &str) -> Option<&'static [&'static str]> {
    match kind {
        "Pod" => Some(POD_ANNOTATIONS),
        "Deployment" | "ReplicaSet" | "ReplicationController" | "Job" => {
            Some(TEMPLATE_ANNOTATIONS)
        }
        _ => None,
    }
}

fn insert_annotation(
    object: &mut Map<String, Value>,
    path: &[&str],
    key: &str,
    value: String,
) -> Result<(), RewriteError> {
    let mut current = object;
    for segment in path {
        let slot = current
            .entry(*segment)
            .or_insert_with(|| Value::Object(Map::new()));
        if slot.is_null() {
            *slot = Value::Object(Map::new());
        }

        current = match slot {
            Value::Object(map) => map,
            other => {
                return Err(RewriteError::NotAnObject {
                    segment: (*segment).to_string(),
                    found: json_type(other),
                });
            }
        };
    }

    current.insert(key.to_string(), Value::String(value));
    Ok(())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
