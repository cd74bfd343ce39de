//! Development server for the built console front-end.
//!
//! SYSTEM CONTEXT
//! ==============
//! Serves the static bundle from a directory and forwards everything under
//! the proxy prefix to the backend, so the browser only ever talks to one
//! origin. Unknown static paths fall back to `index.html` and the client-side
//! router takes over from there.
//!
//! ERROR HANDLING
//! ==============
//! Upstream transport failures become `502 Bad Gateway`; upstream error
//! statuses are passed through untouched.

#[cfg(test)]
#[path = "devserver_test.rs"]
mod devserver_test;

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::config::{DEFAULT_CONNECT_TIMEOUT_SECS, DevServerConfig};

/// Largest request body forwarded upstream.
const MAX_PROXY_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum DevServerError {
    #[error("failed to build proxy client: {0}")]
    HttpClientBuild(reqwest::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: std::net::SocketAddr, source: std::io::Error },

    #[error("server failed: {0}")]
    Serve(std::io::Error),
}

#[derive(Clone)]
struct ProxyState {
    http: reqwest::Client,
    upstream: String,
}

/// Assemble the dev-server router.
///
/// # Errors
///
/// Returns [`DevServerError::HttpClientBuild`] if the proxy client cannot be
/// constructed.
pub fn router(config: &DevServerConfig) -> Result<Router, DevServerError> {
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(DevServerError::HttpClientBuild)?;
    let state = ProxyState { http, upstream: config.upstream.clone() };

    let prefix = config.proxy_prefix.trim_end_matches('/');
    let exact = if prefix.is_empty() { "/".to_owned() } else { prefix.to_owned() };
    let wildcard = format!("{prefix}/{{*rest}}");

    let index = config.static_dir.join("index.html");
    let static_files = ServeDir::new(&config.static_dir)
        .append_index_html_on_directories(true)
        .fallback(ServeFile::new(index));

    Ok(Router::new()
        .route(&exact, any(proxy))
        .route(&wildcard, any(proxy))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Bind `config.addr` and serve until the process exits.
///
/// # Errors
///
/// Returns [`DevServerError`] if the listener cannot bind or the server fails.
pub async fn serve(config: &DevServerConfig) -> Result<(), DevServerError> {
    let app = router(config)?;
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|source| DevServerError::Bind { addr: config.addr, source })?;

    tracing::info!(
        addr = %config.addr,
        static_dir = %config.static_dir.display(),
        prefix = %config.proxy_prefix,
        upstream = %config.upstream,
        "dev server listening"
    );
    axum::serve(listener, app).await.map_err(DevServerError::Serve)
}

async fn proxy(State(state): State<ProxyState>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let url = format!("{}{path_and_query}", state.upstream);

    let body = match axum::body::to_bytes(body, MAX_PROXY_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, %url, "failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
        }
    };

    let upstream = state
        .http
        .request(parts.method.clone(), &url)
        .headers(forwardable(&parts.headers))
        .body(body)
        .send()
        .await;

    let upstream = match upstream {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(error = %e, method = %parts.method, %url, "upstream request failed");
            return (StatusCode::BAD_GATEWAY, format!("upstream unavailable: {e}")).into_response();
        }
    };

    let status = upstream.status();
    let headers = forwardable(upstream.headers());
    match upstream.bytes().await {
        Ok(bytes) => {
            tracing::debug!(method = %parts.method, %url, status = status.as_u16(), "proxied");
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Err(e) => {
            tracing::warn!(error = %e, %url, "upstream body read failed");
            (StatusCode::BAD_GATEWAY, format!("upstream body read failed: {e}")).into_response()
        }
    }
}

/// Drop hop-by-hop headers plus the ones the proxy client recomputes.
/// Removing `host` makes the upstream see its own authority.
fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in [header::HOST, header::CONNECTION, header::CONTENT_LENGTH, header::TRANSFER_ENCODING, header::UPGRADE] {
        out.remove(name);
    }
    out
}
