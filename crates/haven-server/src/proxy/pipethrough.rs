//! Appview Proxy: a reverse proxy over N ordered appview backends, each
//! tracked with a health flag. Selection is first-healthy-wins; if none
//! are healthy the first backend is used anyway (fail-open) so a
//! meaningful upstream error reaches the client instead of a local one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::response::Response;

use haven_core::Store;

use crate::error::XrpcError;
use crate::state::AppState;

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

struct Backend {
    url: String,
    healthy: AtomicBool,
}

pub struct AppviewProxy {
    backends: Vec<Backend>,
    client: reqwest::Client,
}

impl AppviewProxy {
    pub fn new(backend_urls: Vec<String>) -> Arc<Self> {
        let backends = backend_urls
            .into_iter()
            .map(|url| Backend {
                url,
                healthy: AtomicBool::new(true),
            })
            .collect();
        Arc::new(Self {
            backends,
            client: reqwest::Client::new(),
        })
    }

    /// Starts the 30s health-check loop. Spawned once per process alongside
    /// the firehose dispatcher.
    pub fn spawn_health_checks(self: &Arc<Self>) {
        let proxy = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);
            loop {
                interval.tick().await;
                proxy.check_all().await;
            }
        });
    }

    async fn check_all(&self) {
        for backend in &self.backends {
            let url = format!("{}/xrpc/_health", backend.url.trim_end_matches('/'));
            let healthy = match self
                .client
                .get(&url)
                .timeout(HEALTH_CHECK_TIMEOUT)
                .send()
                .await
            {
                Ok(resp) => resp.status() == StatusCode::OK,
                Err(_) => false,
            };
            backend.healthy.store(healthy, Ordering::Relaxed);
            tracing::debug!("appview health check: {} healthy={}", backend.url, healthy);
        }
    }

    fn select(&self) -> Option<&str> {
        if self.backends.is_empty() {
            return None;
        }
        self.backends
            .iter()
            .find(|b| b.healthy.load(Ordering::Relaxed))
            .or_else(|| self.backends.first())
            .map(|b| b.url.as_str())
    }
}

/// Forwards an unmatched `/xrpc/app.*` request to the first healthy appview
/// backend, verbatim. No cross-backend retry on a 5xx — that's left to the
/// next health-check tick flipping the backend unhealthy. Any other
/// unmatched path (including unrecognized `com.atproto.*` methods) is a
/// plain 404 rather than a proxied guess.
pub async fn pipethrough_fallback<S: Store>(
    State(state): State<AppState<S>>,
    request: Request,
) -> Result<Response, XrpcError> {
    if !request.uri().path().starts_with("/xrpc/app.") {
        return Err(XrpcError::new(
            StatusCode::NOT_FOUND,
            "MethodNotImplemented",
            "no such method",
        ));
    }

    let Some(backend) = state.appview.select() else {
        return Err(XrpcError::new(
            StatusCode::NOT_FOUND,
            "MethodNotImplemented",
            "no appview backend configured",
        ));
    };

    let path = request.uri().path().to_string();
    let query = request.uri().query().map(|q| format!("?{q}")).unwrap_or_default();
    let upstream_url = format!("{}{}{}", backend.trim_end_matches('/'), path, query);

    let method = request.method().clone();
    let mut builder = state.appview.client.request(method, &upstream_url);
    for (name, value) in request.headers() {
        if name == header::HOST {
            continue;
        }
        if let Ok(v) = value.to_str() {
            builder = builder.header(name.as_str(), v);
        }
    }

    let body_bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| XrpcError::new(StatusCode::BAD_REQUEST, "InvalidRequest", e.to_string()))?;
    if !body_bytes.is_empty() {
        builder = builder.body(body_bytes.to_vec());
    }

    let upstream_resp = builder
        .send()
        .await
        .map_err(|e| XrpcError::new(StatusCode::BAD_GATEWAY, "UpstreamFailure", e.to_string()))?;

    let status =
        StatusCode::from_u16(upstream_resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response_builder = Response::builder().status(status);
    for (name, value) in upstream_resp.headers() {
        if name == header::TRANSFER_ENCODING {
            continue;
        }
        response_builder = response_builder.header(name, value);
    }

    let resp_body = upstream_resp
        .bytes()
        .await
        .map_err(|e| XrpcError::new(StatusCode::BAD_GATEWAY, "UpstreamFailure", e.to_string()))?;

    response_builder
        .body(Body::from(resp_body))
        .map_err(|e| XrpcError::new(StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError", e.to_string()))
}
