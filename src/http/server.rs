//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Run the unzip pipeline on each inbound request (receive phase)
//! - Apply the configured failure policy
//! - Forward requests to the upstream and stream responses back

use axum::{
    body::Body,
    extract::State,
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderMap, Request, StatusCode, Uri,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{FailurePolicy, ProxyConfig, UnzipConfig};
use crate::http::body::BodyConnection;
use crate::http::request::{request_id, request_id_middleware, X_REQUEST_ID};
use crate::observability::metrics;
use crate::unzip::{
    try_unzip_request, BumpArena, Connection, HeaderStore, RequestContext, UnzipError,
    UnzipOutcome, UnzipSettings,
};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Arc<Authority>,
    pub unzip: UnzipConfig,
    /// Longest wait for each request body frame while unzipping.
    pub body_read_timeout: Duration,
}

/// HTTP server for the unzip proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, axum::http::uri::InvalidUri> {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let upstream = Authority::from_str(&config.upstream.address)?;

        let state = AppState {
            client,
            upstream: Arc::new(upstream),
            unzip: config.unzip.clone(),
            body_read_timeout: Duration::from_secs(config.timeouts.request_secs),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            unzip_enabled = self.config.unzip.enabled,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Main proxy handler.
/// Unzips the request body when eligible, then forwards the request.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&request).unwrap_or("unknown").to_string();
    let (mut parts, body) = request.into_parts();

    tracing::debug!(method = %parts.method, path = %parts.uri.path(), "Proxying request");

    let body = if state.unzip.enabled && parts.headers.contains_key(header::CONTENT_ENCODING) {
        match unzip_body(&state, &mut parts.headers, body).await {
            Ok(body) => body,
            Err(response) => {
                metrics::record_request(response.status().as_u16(), start_time);
                return response;
            }
        }
    } else {
        body
    };

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some((*state.upstream).clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    let uri = Uri::from_parts(uri_parts).unwrap_or_else(|_| parts.uri.clone());

    let mut builder = Request::builder().method(parts.method).uri(uri).version(parts.version);
    if let Some(headers) = builder.headers_mut() {
        *headers = parts.headers;
        if let Ok(value) = header::HeaderValue::from_str(&request_id) {
            headers.insert(X_REQUEST_ID, value);
        }
    }
    let req = match builder.body(body) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build upstream request");
            metrics::record_request(500, start_time);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match state.client.request(req).await {
        Ok(response) => {
            metrics::record_request(response.status().as_u16(), start_time);
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(error = %e, upstream = %state.upstream, "Upstream error");
            metrics::record_request(502, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Run the unzip pipeline over `body` on the blocking pool.
///
/// Rewrites `headers` in place and returns the body to forward, or the
/// response to send when the failure policy rejects the request.
async fn unzip_body(
    state: &AppState,
    headers: &mut HeaderMap,
    body: Body,
) -> Result<Body, Response> {
    let config = &state.unzip;
    let mut conn = BodyConnection::new(body, Handle::current())
        .with_read_timeout(state.body_read_timeout)
        .with_content_length(headers.content_length());
    if let Err(e) = conn.prime().await {
        tracing::error!(error = %e, "Failed to read request body");
        return Err((StatusCode::BAD_REQUEST, "Unreadable request body").into_response());
    }

    let ctx = RequestContext::new(
        std::mem::take(headers),
        conn,
        BumpArena::with_capacity(config.workspace_bytes),
        UnzipSettings::from(config),
    );
    let (ctx, result) = tokio::task::spawn_blocking(move || {
        let mut ctx = ctx;
        let result = try_unzip_request(&mut ctx);
        (ctx, result)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Unzip task failed");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })?;

    let (rewritten, mut conn) = ctx.into_parts();
    *headers = rewritten;

    match result {
        Ok(UnzipOutcome::Inflated { .. }) => Ok(Body::from(conn.pipeline_mut().take())),
        Ok(UnzipOutcome::InvalidLength(len)) if config.on_failure == FailurePolicy::Reject => {
            tracing::warn!(content_length = len, "Rejecting request with invalid Content-Length");
            Err((StatusCode::BAD_REQUEST, "Invalid Content-Length").into_response())
        }
        Ok(_) => Ok(conn.into_body()),
        Err(e @ UnzipError::Read(_)) => Err(reject(&e)),
        Err(e) if config.on_failure == FailurePolicy::Reject => Err(reject(&e)),
        Err(e) => {
            tracing::warn!(error = %e, "Forwarding request with its original body");
            Ok(conn.into_body())
        }
    }
}

/// Error response for a request rejected by the unzip pipeline.
fn reject(error: &UnzipError) -> Response {
    let status = match error {
        UnzipError::UnsupportedEncoding { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        UnzipError::Read(_) | UnzipError::Decompress { .. } => StatusCode::BAD_REQUEST,
        UnzipError::Phase(_) | UnzipError::EngineInit(_) | UnzipError::WorkspaceExhausted(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, error.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unzip::error::InflateCode;

    #[test]
    fn test_reject_status_mapping() {
        let unsupported = UnzipError::UnsupportedEncoding {
            header: "Content-Encoding",
            value: "br".into(),
        };
        assert_eq!(reject(&unsupported).status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let corrupt = UnzipError::Decompress {
            code: InflateCode::DataError,
            message: "invalid distance".into(),
        };
        assert_eq!(reject(&corrupt).status(), StatusCode::BAD_REQUEST);

        let phase = UnzipError::Phase(crate::unzip::RequestPhase::Deliver);
        assert_eq!(reject(&phase).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_server_rejects_bad_upstream() {
        let mut config = ProxyConfig::default();
        config.upstream.address = "not a host".into();
        assert!(HttpServer::new(config).is_err());
    }

    #[test]
    fn test_hostname_upstream_passes_validation_and_startup() {
        let mut config = ProxyConfig::default();
        config.upstream.address = "backend.internal:3000".into();
        assert!(crate::config::validation::validate_config(&config).is_ok());
        assert!(HttpServer::new(config).is_ok());
    }
}
