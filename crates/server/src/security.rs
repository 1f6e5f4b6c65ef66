//! DNS-rebinding defense (spec.md §4.6): every request's `Host` header, and
//! its `Origin` header if present, must name loopback. There is no
//! precedent for this exact check anywhere in the retrieval pack — the
//! reverse proxy it protects has no counterpart in the examples either —
//! so this is authored fresh in the shape of
//! `davidrudduck-vk-swarm`'s `middleware::from_fn_with_state` auth gates
//! (`remote::auth::middleware::require_session`): a `State`-extracting
//! `Request`/`Next` function returning a plain `Response` on rejection.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::app_state::AppState;

fn is_loopback_host(value: &str) -> bool {
    let host = value.split(':').next().unwrap_or(value);
    host == "localhost" || host == "127.0.0.1" || host == "[::1]" || host == "::1"
}

/// Rejects any request whose `Host` header isn't loopback, and any request
/// that carries an `Origin` header that isn't loopback either (a same-origin
/// browser request has no `Origin` on top-level navigation but always has
/// one on fetch/XHR and WebSocket upgrades).
pub async fn reject_non_loopback(
    State(_app): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let host_ok = req
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(is_loopback_host)
        .unwrap_or(false);

    if !host_ok {
        tracing::warn!("rejected request with non-loopback Host header");
        return StatusCode::FORBIDDEN.into_response();
    }

    if let Some(origin) = req.headers().get(axum::http::header::ORIGIN) {
        let origin_ok = origin
            .to_str()
            .ok()
            .and_then(|v| v.parse::<axum::http::Uri>().ok())
            .and_then(|uri| uri.host().map(|h| is_loopback_host(h)))
            .unwrap_or(false);
        if !origin_ok {
            tracing::warn!("rejected request with non-loopback Origin header");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_hosts_are_recognized_with_and_without_port() {
        assert!(is_loopback_host("localhost"));
        assert!(is_loopback_host("localhost:4200"));
        assert!(is_loopback_host("127.0.0.1"));
        assert!(is_loopback_host("127.0.0.1:4200"));
    }

    #[test]
    fn non_loopback_hosts_are_rejected() {
        assert!(!is_loopback_host("evil.example.com"));
        assert!(!is_loopback_host("evil.example.com:4200"));
        assert!(!is_loopback_host("192.168.1.5"));
    }
}
