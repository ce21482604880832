use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;

use haven_core::{HostConfig, Store};

use crate::error::XrpcError;
use crate::state::AppState;

/// The host a request resolved to. Stored in request extensions by
/// [`resolve_host`]; handlers that need tenant-scoped config (the signing
/// key, the service DID, user-domain suffixes) read it from there.
#[derive(Clone)]
pub struct ResolvedHost {
    /// The raw `Host` header value, port stripped.
    pub hostname: String,
    /// The configured hostname this request matched against. Equal to
    /// `hostname` for an exact match; a configured tenant hostname when
    /// `hostname` matched via a `user_domains` suffix instead.
    pub name: String,
    pub config: HostConfig,
}

impl ResolvedHost {
    /// True when the request's `Host` header named the tenant hostname
    /// itself, rather than a handle under one of its user domains.
    pub fn is_exact_match(&self) -> bool {
        self.hostname == self.name
    }
}

/// Resolves the `Host` header (port stripped) against the configured
/// tenant map and stores the result in request extensions. Every route
/// runs behind this middleware; an unmatched host never reaches route
/// logic.
pub async fn resolve_host<S: Store>(
    State(state): State<AppState<S>>,
    mut request: Request,
    next: Next,
) -> Result<Response, XrpcError> {
    let host_header = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            XrpcError::new(StatusCode::BAD_REQUEST, "InvalidRequest", "missing Host header")
        })?;
    let hostname = host_header.split(':').next().unwrap_or(host_header).to_string();

    let (name, config) = state.config.resolve_host(&hostname).ok_or_else(|| {
        XrpcError::new(
            StatusCode::BAD_REQUEST,
            "InvalidRequest",
            format!("unrecognized host: {hostname}"),
        )
    })?;

    request.extensions_mut().insert(ResolvedHost {
        hostname,
        name: name.to_string(),
        config: config.clone(),
    });

    Ok(next.run(request).await)
}
