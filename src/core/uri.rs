//! Kubernetes API paths the gateway is willing to forward.

/// Paths accepted only on an exact match; they carry no namespace.
pub const EXACT_PATTERNS: &[&str] = &["/api", "/apis", "/version"];

/// Path prefixes accepted for forwarding.
pub const PREFIX_PATTERNS: &[&str] = &[
    "/apis/",
    "/api/v1/namespaces/",
    "/api/v1/watch/namespaces/",
    "/api/v1/proxy/namespaces/",
    "/api/v1",
    "/apis/extensions",
    "/swaggerapi/",
];

/// Outcome of checking a request path against the accepted patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriMatch {
    Exact,
    Prefix,
    Rejected,
}

impl UriMatch {
    pub fn is_accepted(self) -> bool {
        !matches!(self, UriMatch::Rejected)
    }
}

/// Classify a request path (without query string).
pub fn classify(path: &str) -> UriMatch {
    if EXACT_PATTERNS.contains(&path) {
        UriMatch::Exact
    } else if PREFIX_PATTERNS
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        UriMatch::Prefix
    } else {
        UriMatch::Rejected
    }
}
