use std::{sync::Arc, time::Instant};

use axum::{
    Router,
    body::Body as AxumBody,
    extract::State,
    response::IntoResponse,
};
use http::{HeaderValue, Request, Response};
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    core::{
        error::{GatewayError, GatewayResult},
        forwarding::{ForwardContext, ForwardingEngine},
        identity::BackendTarget,
        uri,
    },
    ports::credentials::CredentialProvider,
    tracing_setup::create_request_span,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Gateway entry point: admits a request, resolves the tenant behind it and hands
/// it to the [`ForwardingEngine`].
pub struct KubeHandler {
    credentials: Arc<dyn CredentialProvider>,
    engine: Arc<ForwardingEngine>,
    backend_port: u16,
}

impl KubeHandler {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        engine: Arc<ForwardingEngine>,
        backend_port: u16,
    ) -> Self {
        Self {
            credentials,
            engine,
            backend_port,
        }
    }

    /// Handle one request, always producing a response.
    pub async fn handle(&self, req: Request<AxumBody>) -> Response<AxumBody> {
        let request_id = Uuid::new_v4().to_string();
        let span = create_request_span(req.method().as_str(), req.uri().path(), &request_id);
        let start = Instant::now();

        let mut response = match self.process(req).instrument(span.clone()).await {
            Ok(response) => response,
            Err(e) => span.in_scope(|| e.into_response()),
        };

        span.record("http.status_code", response.status().as_u16());
        span.record("duration_ms", start.elapsed().as_millis() as u64);
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }

    async fn process(&self, req: Request<AxumBody>) -> GatewayResult<Response<AxumBody>> {
        // Checked before any credential lookup.
        if !uri::classify(req.uri().path()).is_accepted() {
            return Err(GatewayError::UnsupportedUri(req.uri().path().to_string()));
        }

        let identity = self.credentials.resolve_identity(req.headers()).await?;
        if !identity.is_complete() {
            tracing::error!(
                node = %identity.node,
                space_id = %identity.space_id,
                "Credential check returned incomplete identity"
            );
            return Err(GatewayError::IncompleteIdentity);
        }

        let target = BackendTarget::from_node(&identity.node, self.backend_port);
        tracing::debug!(node = %identity.node, target = %target, "Resolved backend target");

        let certificates = self.credentials.certificates(&identity).await?;
        let namespace = self.credentials.namespace_for(&identity);
        tracing::Span::current().record("tenant.namespace", namespace.as_str());

        let ctx = ForwardContext {
            target,
            namespace,
            certificates,
        };
        self.engine.forward(req, &ctx).await
    }
}

async fn proxy(State(handler): State<Arc<KubeHandler>>, req: Request<AxumBody>) -> Response<AxumBody> {
    handler.handle(req).await
}

/// Every path is routed to the handler; admission happens inside.
pub fn router(handler: Arc<KubeHandler>) -> Router {
    Router::new()
        .fallback(proxy)
        .with_state(handler)
        .layer(TraceLayer::new_for_http())
}
