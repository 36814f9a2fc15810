//! Dispatch of tenant requests to their API server and relay of the answer.
//!
//! A request goes through
//! `INIT -> REWRITE -> DISPATCH -> (RETRY | FAILED | RESPONSE_RECEIVED) -> (HIJACK | BUFFERED_RELAY)`.
//! Buffered responses are run through the [`ResponseFilterEngine`]. Upgraded
//! connections and byte streams are handed over untouched.

use std::{fmt, sync::Arc};

use axum::body::Body as AxumBody;
use bytes::Bytes;
use http::{
    HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, header,
};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::{
    error::{GatewayError, GatewayResult},
    filter::ResponseFilterEngine,
    hijack::HijackBridge,
    identity::{BackendTarget, CertificatePair},
    retry::RetryPolicy,
    rewriter::RequestRewriter,
};
use crate::{
    ports::{BackendConnector, BackendError},
    tracing_setup::create_backend_span,
    utils::http_headers::{TCP_UPGRADE, is_stream, is_upgrade, upgrade_protocol},
};

const DEFAULT_MAX_REQUEST_BODY: usize = 4 * 1024 * 1024;
const DEFAULT_MAX_RESPONSE_BODY: usize = 64 * 1024 * 1024;

/// Everything resolved about the caller before forwarding starts.
#[derive(Debug, Clone)]
pub struct ForwardContext {
    pub target: BackendTarget,
    pub namespace: String,
    pub certificates: CertificatePair,
}

/// How a backend response is returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardMode {
    /// Raw pass-through; no framing or filtering after the headers
    Hijack,
    /// Whole body read, filtered and re-framed
    Buffered,
}

impl ForwardMode {
    pub fn select(request_upgrade: bool, response_upgrade: bool, response_stream: bool) -> Self {
        if request_upgrade || response_upgrade || response_stream {
            ForwardMode::Hijack
        } else {
            ForwardMode::Buffered
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ForwardMode::Hijack => "hijack",
            ForwardMode::Buffered => "buffered",
        }
    }
}

impl fmt::Display for ForwardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tenant-scoped request as it is sent to the backend, rebuilt for every
/// attempt.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutboundRequest {
    pub fn to_request(&self) -> Result<Request<Full<Bytes>>, BackendError> {
        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(self.path_and_query.as_str())
            .body(Full::new(self.body.clone()))
            .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;
        *request.headers_mut() = self.headers.clone();
        Ok(request)
    }
}

/// Inbound headers minus framing and the caller's credential, with `Host`
/// pointed at the backend.
///
/// `Accept-Encoding` is dropped so buffered responses always arrive as plain
/// JSON the filter engine can read.
pub fn outbound_headers(
    inbound: &HeaderMap,
    target: &BackendTarget,
    stripped: &[HeaderName],
) -> HeaderMap {
    let mut headers = inbound.clone();
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::ACCEPT_ENCODING);
    for name in stripped {
        headers.remove(name);
    }

    match HeaderValue::from_str(&target.authority()) {
        Ok(host) => {
            headers.insert(header::HOST, host);
        }
        Err(e) => tracing::warn!(target = %target, error = %e, "Backend authority is not a valid Host header"),
    }
    headers
}

/// Forwards one request per call to a tenant's API server.
///
/// Shared across requests; all per-request state lives on the stack of
/// [`ForwardingEngine::forward`].
pub struct ForwardingEngine {
    connector: Arc<dyn BackendConnector>,
    filters: ResponseFilterEngine,
    rewriter: RequestRewriter,
    retry: RetryPolicy,
    reject_non_tcp: bool,
    stripped_headers: Vec<HeaderName>,
    max_request_body: usize,
    max_response_body: usize,
    relay_cancel: CancellationToken,
}

impl ForwardingEngine {
    pub fn new(
        connector: Arc<dyn BackendConnector>,
        filters: ResponseFilterEngine,
        rewriter: RequestRewriter,
    ) -> Self {
        Self {
            connector,
            filters,
            rewriter,
            retry: RetryPolicy::default(),
            reject_non_tcp: false,
            stripped_headers: vec![header::AUTHORIZATION],
            max_request_body: DEFAULT_MAX_REQUEST_BODY,
            max_response_body: DEFAULT_MAX_RESPONSE_BODY,
            relay_cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reject upgrades to protocols other than `tcp` instead of relaying them
    /// with a warning.
    pub fn with_upgrade_policy(mut self, reject_non_tcp: bool) -> Self {
        self.reject_non_tcp = reject_non_tcp;
        self
    }

    pub fn with_body_limits(mut self, max_request_body: usize, max_response_body: usize) -> Self {
        self.max_request_body = max_request_body;
        self.max_response_body = max_response_body;
        self
    }

    /// Header carrying the caller's gateway credential; never forwarded.
    pub fn with_credential_header(mut self, name: HeaderName) -> Self {
        if !self.stripped_headers.contains(&name) {
            self.stripped_headers.push(name);
        }
        self
    }

    pub fn with_relay_cancellation(mut self, token: CancellationToken) -> Self {
        self.relay_cancel = token;
        self
    }

    pub async fn forward(
        &self,
        mut req: Request<AxumBody>,
        ctx: &ForwardContext,
    ) -> GatewayResult<Response<AxumBody>> {
        let request_upgrade = is_upgrade(req.headers());
        if request_upgrade {
            self.check_upgrade_protocol(req.headers())?;
        }
        // Must be taken before the request is consumed.
        let client_upgrade = request_upgrade.then(|| hyper::upgrade::on(&mut req));

        let (parts, body) = req.into_parts();
        let body = read_request_body(body, self.max_request_body).await?;

        let outbound = OutboundRequest {
            body: self.rewriter.rewrite_body(&parts.method, body, &ctx.namespace)?,
            path_and_query: RequestRewriter::rewrite_uri(&parts.uri, &ctx.namespace),
            headers: outbound_headers(&parts.headers, &ctx.target, &self.stripped_headers),
            method: parts.method,
        };

        let span = create_backend_span(
            &ctx.target.to_string(),
            outbound.method.as_str(),
            &outbound.path_and_query,
        );
        let response = self
            .dispatch(&outbound, ctx)
            .instrument(span.clone())
            .await?;

        let response_upgrade =
            response.status() == StatusCode::SWITCHING_PROTOCOLS || is_upgrade(response.headers());
        let response_stream = is_stream(response.headers());
        let mode = ForwardMode::select(request_upgrade, response_upgrade, response_stream);

        span.record("forward.mode", mode.as_str());
        span.record("http.status_code", response.status().as_u16());
        tracing::debug!(
            parent: &span,
            request_upgrade,
            response_upgrade,
            response_stream,
            mode = %mode,
            "Backend response received"
        );

        match mode {
            ForwardMode::Hijack => {
                if response_upgrade && !request_upgrade {
                    self.check_upgrade_protocol(response.headers())?;
                }
                self.hijack(response, client_upgrade, span)
            }
            ForwardMode::Buffered => self.buffered(response).await,
        }
    }

    async fn dispatch(
        &self,
        outbound: &OutboundRequest,
        ctx: &ForwardContext,
    ) -> GatewayResult<Response<AxumBody>> {
        let connector = &self.connector;
        let target = &ctx.target;
        let certificates = &ctx.certificates;

        self.retry
            .run("backend_dispatch", BackendError::is_retryable, move || async move {
                let request = outbound.to_request()?;
                connector.send(target, certificates, request).await
            })
            .await
            .map_err(GatewayError::from)
    }

    fn check_upgrade_protocol(&self, headers: &HeaderMap) -> GatewayResult<()> {
        let protocol = upgrade_protocol(headers).unwrap_or_default();
        if protocol == TCP_UPGRADE {
            return Ok(());
        }

        if self.reject_non_tcp {
            return Err(GatewayError::UnsupportedUpgrade(protocol));
        }
        tracing::warn!(protocol = %protocol, "Relaying upgrade to a protocol other than tcp");
        Ok(())
    }

    /// Hand the connection over: switch protocols and bridge raw bytes, or stream
    /// the body through unframed.
    fn hijack(
        &self,
        mut response: Response<AxumBody>,
        client_upgrade: Option<OnUpgrade>,
        span: tracing::Span,
    ) -> GatewayResult<Response<AxumBody>> {
        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            // Streams and refused upgrades: pass the body through as it arrives.
            response.headers_mut().remove(header::TRANSFER_ENCODING);
            return Ok(response);
        }

        let Some(client_upgrade) = client_upgrade else {
            return Err(GatewayError::Upstream(
                "backend switched protocols without an upgrade request".to_string(),
            ));
        };
        let backend_upgrade = hyper::upgrade::on(&mut response);
        let bridge = HijackBridge::new(self.relay_cancel.clone());

        tokio::spawn(
            async move {
                match tokio::try_join!(client_upgrade, backend_upgrade) {
                    Ok((client, backend)) => {
                        bridge.relay(TokioIo::new(client), TokioIo::new(backend)).await;
                    }
                    Err(e) => tracing::warn!(error = %e, "Connection upgrade failed"),
                }
            }
            .instrument(span),
        );

        let (parts, _) = response.into_parts();
        Ok(Response::from_parts(parts, AxumBody::empty()))
    }

    async fn buffered(&self, response: Response<AxumBody>) -> GatewayResult<Response<AxumBody>> {
        let (mut parts, body) = response.into_parts();
        let bytes = match Limited::new(body, self.max_response_body).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                return Err(GatewayError::Upstream(format!(
                    "failed to read backend response: {e}"
                )));
            }
        };

        let (body, changed) = if bytes.is_empty() {
            (bytes, false)
        } else {
            self.filters.apply(bytes)
        };

        parts.headers.remove(header::TRANSFER_ENCODING);
        if changed {
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        Ok(Response::from_parts(parts, AxumBody::from(body)))
    }
}

async fn read_request_body(body: AxumBody, limit: usize) -> GatewayResult<Bytes> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(GatewayError::RequestTooLarge(limit))
        }
        Err(e) => Err(GatewayError::RequestBody(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex, time::Duration};

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        core::filter::FilterRegistry,
        ports::BackendResult,
    };

    #[derive(Debug)]
    struct Recorded {
        method: Method,
        uri: String,
        headers: HeaderMap,
        body: Bytes,
    }

    type Reply = BackendResult<Response<AxumBody>>;

    #[derive(Default)]
    struct MockConnector {
        replies: Mutex<VecDeque<Box<dyn FnOnce() -> Reply + Send>>>,
        seen: Mutex<Vec<Recorded>>,
    }

    impl MockConnector {
        fn reply(self, f: impl FnOnce() -> Reply + Send + 'static) -> Self {
            self.replies.lock().unwrap().push_back(Box::new(f));
            self
        }

        fn json(self, status: StatusCode, body: Value) -> Self {
            self.reply(move || {
                Ok(Response::builder()
                    .status(status)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(AxumBody::from(body.to_string()))
                    .unwrap())
            })
        }

        fn attempts(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl BackendConnector for MockConnector {
        async fn send(
            &self,
            _target: &BackendTarget,
            _certificates: &CertificatePair,
            req: Request<Full<Bytes>>,
        ) -> BackendResult<Response<AxumBody>> {
            let (parts, body) = req.into_parts();
            let body = body.collect().await.unwrap().to_bytes();
            self.seen.lock().unwrap().push(Recorded {
                method: parts.method,
                uri: parts.uri.to_string(),
                headers: parts.headers,
                body,
            });

            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(reply) => reply(),
                None => Err(BackendError::Connect("no reply queued".to_string())),
            }
        }
    }

    fn engine(connector: Arc<MockConnector>) -> ForwardingEngine {
        ForwardingEngine::new(
            connector,
            ResponseFilterEngine::new(Arc::new(FilterRegistry::with_builtin_rules(
                "host", "1.1.1.1",
            ))),
            RequestRewriter::new("tenant-annotation", "tenant", vec![Method::POST]),
        )
    }

    fn ctx() -> ForwardContext {
        ForwardContext {
            target: BackendTarget::new("kube-shard-1", 6443),
            namespace: "s42-default".to_string(),
            certificates: CertificatePair::new("cert", "key"),
        }
    }

    fn get(uri: &str) -> Request<AxumBody> {
        Request::builder()
            .uri(uri)
            .header(header::HOST, "gateway.example.com")
            .header(header::AUTHORIZATION, "Bearer secret")
            .body(AxumBody::empty())
            .unwrap()
    }

    async fn body_json(response: Response<AxumBody>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(ForwardMode::select(false, false, false), ForwardMode::Buffered);
        assert_eq!(ForwardMode::select(true, false, false), ForwardMode::Hijack);
        assert_eq!(ForwardMode::select(false, true, false), ForwardMode::Hijack);
        assert_eq!(ForwardMode::select(false, false, true), ForwardMode::Hijack);
    }

    #[test]
    fn test_outbound_headers() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("gateway"));
        inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer x"));
        inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        inbound.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        inbound.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        inbound.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));

        let target = BackendTarget::new("kube-shard-1", 6443);
        let headers = outbound_headers(&inbound, &target, &[header::AUTHORIZATION]);

        assert_eq!(headers[header::HOST], "kube-shard-1:6443");
        assert_eq!(headers[header::ACCEPT], "application/json");
        assert!(!headers.contains_key(header::AUTHORIZATION));
        assert!(!headers.contains_key(header::CONTENT_LENGTH));
        assert!(!headers.contains_key(header::TRANSFER_ENCODING));
        assert!(!headers.contains_key(header::ACCEPT_ENCODING));
    }

    #[tokio::test]
    async fn test_forward_rewrites_namespace_and_headers() {
        let connector = Arc::new(MockConnector::default().json(
            StatusCode::OK,
            json!({"kind": "ServiceList", "items": []}),
        ));
        let engine = engine(connector.clone());

        let response = engine
            .forward(get("/api/v1/namespaces/other/services?limit=5"), &ctx())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let seen = connector.seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::GET);
        assert_eq!(seen[0].uri, "/api/v1/namespaces/s42-default/services?limit=5");
        assert_eq!(seen[0].headers[header::HOST], "kube-shard-1:6443");
        assert!(!seen[0].headers.contains_key(header::AUTHORIZATION));
    }

    #[tokio::test]
    async fn test_forward_annotates_post_body() {
        let connector = Arc::new(
            MockConnector::default().json(StatusCode::CREATED, json!({"kind": "Pod"})),
        );
        let engine = engine(connector.clone());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/namespaces/x/pods")
            .body(AxumBody::from(json!({"kind": "Pod", "metadata": {}}).to_string()))
            .unwrap();
        let response = engine.forward(request, &ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let seen = connector.seen.lock().unwrap();
        let sent: Value = serde_json::from_slice(&seen[0].body).unwrap();
        assert_eq!(
            sent["metadata"]["annotations"]["tenant-annotation"],
            json!(r#"{"tenant":"s42-default"}"#)
        );
    }

    #[tokio::test]
    async fn test_body_rewrite_failure_is_not_dispatched() {
        let connector = Arc::new(MockConnector::default());
        let engine = engine(connector.clone());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/namespaces/x/pods")
            .body(AxumBody::from(r#"{"kind":"Pod","metadata":[]}"#))
            .unwrap();
        let err = engine.forward(request, &ctx()).await.unwrap_err();

        assert!(matches!(err, GatewayError::BodyRewriteFailure(_)));
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test]
    async fn test_request_body_limit() {
        let connector = Arc::new(MockConnector::default());
        let engine = engine(connector.clone()).with_body_limits(8, 1024);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/namespaces/x/pods")
            .body(AxumBody::from("this body is too large"))
            .unwrap();
        let err = engine.forward(request, &ctx()).await.unwrap_err();

        assert!(matches!(err, GatewayError::RequestTooLarge(8)));
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let connector = Arc::new(
            MockConnector::default()
                .reply(|| Err(BackendError::Connect("refused".into())))
                .reply(|| Err(BackendError::Timeout(Duration::from_secs(1))))
                .json(StatusCode::OK, json!({"kind": "Status"})),
        );
        let engine = engine(connector.clone())
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)));

        let response = engine.forward(get("/api/v1"), &ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(connector.attempts(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_service_unavailable() {
        let connector = Arc::new(MockConnector::default());
        let engine = engine(connector.clone())
            .with_retry_policy(RetryPolicy::new(2, Duration::ZERO));

        let err = engine.forward(get("/api/v1"), &ctx()).await.unwrap_err();
        assert!(matches!(err, GatewayError::TransportFailure(_)));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test]
    async fn test_invalid_certificate_is_not_retried() {
        let connector = Arc::new(
            MockConnector::default()
                .reply(|| Err(BackendError::InvalidCertificate("no key".into()))),
        );
        let engine = engine(connector.clone())
            .with_retry_policy(RetryPolicy::new(5, Duration::ZERO));

        let err = engine.forward(get("/api/v1"), &ctx()).await.unwrap_err();
        assert!(matches!(err, GatewayError::CertificateFailure(_)));
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn test_buffered_response_is_filtered() {
        let connector = Arc::new(MockConnector::default().json(
            StatusCode::OK,
            json!({"kind": "PodList", "items": [{"spec": {"nodeName": "worker-7"}}]}),
        ));
        let engine = engine(connector);

        let response = engine
            .forward(get("/api/v1/namespaces/x/pods"), &ctx())
            .await
            .unwrap();
        let length: usize = response.headers()[header::CONTENT_LENGTH]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(length, bytes.len());
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["items"][0]["spec"]["nodeName"], json!("host"));
    }

    #[tokio::test]
    async fn test_unfiltered_response_keeps_headers() {
        let raw = r#"{"kind":"ConfigMap", "data": {}}"#;
        let connector = Arc::new(MockConnector::default().reply(move || {
            Ok(Response::builder()
                .header(header::CONTENT_LENGTH, raw.len())
                .header("x-backend", "1")
                .body(AxumBody::from(raw))
                .unwrap())
        }));
        let engine = engine(connector);

        let response = engine
            .forward(get("/api/v1/namespaces/x/configmaps/a"), &ctx())
            .await
            .unwrap();
        assert_eq!(response.headers()["x-backend"], "1");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], raw.len().to_string().as_str());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), raw.as_bytes());
    }

    #[tokio::test]
    async fn test_stream_response_is_not_filtered() {
        let raw = r#"{"kind":"Pod","spec":{"nodeName":"worker-7"}}"#;
        let connector = Arc::new(MockConnector::default().reply(move || {
            Ok(Response::builder()
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .header(header::TRANSFER_ENCODING, "chunked")
                .body(AxumBody::from(raw))
                .unwrap())
        }));
        let engine = engine(connector);

        let response = engine
            .forward(get("/api/v1/namespaces/x/pods/web/log?follow=true"), &ctx())
            .await
            .unwrap();
        assert!(!response.headers().contains_key(header::TRANSFER_ENCODING));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), raw.as_bytes());
    }

    #[tokio::test]
    async fn test_switching_protocols_returns_headers_only() {
        let connector = Arc::new(MockConnector::default().reply(|| {
            Ok(Response::builder()
                .status(StatusCode::SWITCHING_PROTOCOLS)
                .header(header::CONNECTION, "Upgrade")
                .header(header::UPGRADE, "tcp")
                .body(AxumBody::empty())
                .unwrap())
        }));
        let engine = engine(connector.clone());

        let request = Request::builder()
            .uri("/api/v1/namespaces/x/pods/web/exec?command=sh")
            .header(header::CONNECTION, "Upgrade")
            .header(header::UPGRADE, "tcp")
            .body(AxumBody::empty())
            .unwrap();
        let response = engine.forward(request, &ctx()).await.unwrap();

        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(response.headers()[header::UPGRADE], "tcp");
        let seen = connector.seen.lock().unwrap();
        assert_eq!(seen[0].headers[header::UPGRADE], "tcp");
        assert_eq!(seen[0].headers[header::CONNECTION], "Upgrade");
    }

    #[tokio::test]
    async fn test_unexpected_switching_protocols_is_rejected() {
        let connector = Arc::new(MockConnector::default().reply(|| {
            Ok(Response::builder()
                .status(StatusCode::SWITCHING_PROTOCOLS)
                .header(header::CONNECTION, "Upgrade")
                .header(header::UPGRADE, "tcp")
                .body(AxumBody::empty())
                .unwrap())
        }));
        let engine = engine(connector);

        let err = engine.forward(get("/api/v1"), &ctx()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_non_tcp_upgrade_policy() {
        let upgrade_request = || {
            Request::builder()
                .uri("/api/v1/namespaces/x/pods/web/attach")
                .header(header::CONNECTION, "Upgrade")
                .header(header::UPGRADE, "SPDY/3.1")
                .body(AxumBody::empty())
                .unwrap()
        };

        let strict_connector = Arc::new(MockConnector::default());
        let strict = engine(strict_connector.clone()).with_upgrade_policy(true);
        let err = strict.forward(upgrade_request(), &ctx()).await.unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedUpgrade(ref p) if p == "spdy/3.1"));
        assert_eq!(strict_connector.attempts(), 0);

        // Lenient mode relays anyway; the refused upgrade comes back as-is.
        let lenient_connector = Arc::new(
            MockConnector::default().json(StatusCode::BAD_REQUEST, json!({"kind": "Status"})),
        );
        let lenient = engine(lenient_connector.clone());
        let response = lenient.forward(upgrade_request(), &ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(lenient_connector.attempts(), 1);
        assert_eq!(body_json(response).await["kind"], "Status");
    }
}
