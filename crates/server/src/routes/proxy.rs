//! `GET /terminal/<id>` and `/terminal/<id>/…`: the reverse proxy at the
//! heart of the Dashboard Server (spec.md §4.6). One loopback port is all a
//! remote operator ever needs to forward over SSH — every child bridge port
//! stays behind this prefix, resolved fresh from the State Store on every
//! request rather than cached (spec.md §9's no-cache-layer design note).
//!
//! The HTTP leg is grounded on `davidrudduck-vk-swarm`'s
//! `remote::routes::electric_proxy::proxy_table` (reqwest request, header
//! filtering, streamed response body). There's no teacher precedent for the
//! WebSocket leg — axum's `ws` module is server-side only, so tunneling a
//! second hop to the child bridge means re-dialing it as a client, for which
//! `tokio_tungstenite::connect_async` is the natural counterpart to the
//! `hive_client`'s use of the same function for its own long-lived socket.

use std::str::FromStr;

use axum::body::Body;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Path, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt, TryStreamExt};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

use af_core::TerminalId;
use af_utils::ApiResponse;

use crate::app_state::AppState;

/// Caps the buffered request body the proxy will forward in one shot. Large
/// transfers belong on the WebSocket leg, not a one-shot HTTP POST to a
/// terminal bridge.
const MAX_PROXY_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/terminal/{id}", any(proxy_root))
        .route("/terminal/{id}/{*rest}", any(proxy_tail))
}

async fn proxy_root(
    State(app): State<AppState>,
    Path(id): Path<String>,
    req: Request<Body>,
) -> Response {
    proxy_common(app, id, String::new(), req).await
}

async fn proxy_tail(
    State(app): State<AppState>,
    Path((id, rest)): Path<(String, String)>,
    req: Request<Body>,
) -> Response {
    proxy_common(app, id, format!("/{rest}"), req).await
}

async fn resolve_port(app: &AppState, id: &str) -> Result<u16, Response> {
    let terminal_id = TerminalId::from_str(id)
        .map_err(|_| not_found(format!("unrecognized terminal id: {id}")))?;

    let snapshot = app
        .state_db
        .load_state()
        .await
        .map_err(|e| bad_gateway(format!("state store unavailable: {e}")))?;

    let port = match terminal_id {
        TerminalId::Architect => snapshot.architect.map(|a| a.port),
        TerminalId::Builder(bid) => snapshot.builders.iter().find(|b| b.id == bid).map(|b| b.port),
        TerminalId::Util(uid) => snapshot.utils.iter().find(|u| u.id == uid).map(|u| u.port),
    };

    port.ok_or_else(|| not_found(format!("no such terminal: {id}")))
}

async fn proxy_common(app: AppState, id: String, tail: String, req: Request<Body>) -> Response {
    let port = match resolve_port(&app, &id).await {
        Ok(port) => port,
        Err(resp) => return resp,
    };

    let (mut parts, body) = req.into_parts();
    match WebSocketUpgrade::from_request_parts(&mut parts, &app).await {
        Ok(upgrade) => {
            let query = parts.uri.query().map(str::to_string);
            upgrade.on_upgrade(move |socket| bridge_websocket(socket, port, tail, query))
        }
        Err(_) => {
            let req = Request::from_parts(parts, body);
            proxy_http(&app, port, &tail, req).await
        }
    }
}

async fn proxy_http(app: &AppState, port: u16, tail: &str, req: Request<Body>) -> Response {
    let (parts, body) = req.into_parts();

    let body_bytes = match axum::body::to_bytes(body, MAX_PROXY_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => return bad_gateway(format!("failed to buffer request body: {e}")),
    };

    let path = if tail.is_empty() { "/".to_string() } else { tail.to_string() };
    let mut url = format!("http://127.0.0.1:{port}{path}");
    if let Some(query) = parts.uri.query() {
        url.push('?');
        url.push_str(query);
    }

    let method =
        reqwest::Method::from_bytes(parts.method.as_str().as_bytes()).unwrap_or(reqwest::Method::GET);
    let mut builder = app.http.request(method, &url);
    for (name, value) in parts.headers.iter() {
        if name == axum::http::header::HOST || name == axum::http::header::CONNECTION {
            continue;
        }
        if let Ok(v) = value.to_str() {
            builder = builder.header(name.as_str(), v);
        }
    }
    builder = builder.body(body_bytes.to_vec());

    let upstream = match builder.send().await {
        Ok(resp) => resp,
        Err(e) => return bad_gateway(format!("terminal bridge at 127.0.0.1:{port} unavailable: {e}")),
    };

    let status = upstream.status();
    let mut response_builder = Response::builder().status(status.as_u16());
    for (name, value) in upstream.headers() {
        if name == reqwest::header::CONTENT_ENCODING
            || name == reqwest::header::CONTENT_LENGTH
            || name == reqwest::header::TRANSFER_ENCODING
        {
            continue;
        }
        response_builder = response_builder.header(name.as_str(), value.as_bytes());
    }

    let stream = upstream.bytes_stream().map_err(std::io::Error::other);
    response_builder
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| bad_gateway("failed to construct proxied response"))
}

/// Tunnels the dashboard's WebSocket connection to the child bridge's own
/// socket at the same path, frame for frame, including ping/pong (spec.md
/// §4.6's transparency requirement). Either side closing ends the tunnel.
async fn bridge_websocket(socket: WebSocket, port: u16, tail: String, query: Option<String>) {
    let path = if tail.is_empty() { "/".to_string() } else { tail };
    let mut url = format!("ws://127.0.0.1:{port}{path}");
    if let Some(q) = query {
        url.push('?');
        url.push_str(&q);
    }

    let (upstream, _) = match tokio_tungstenite::connect_async(&url).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!("failed to dial terminal bridge at {url}: {e}");
            return;
        }
    };

    let (mut upstream_tx, mut upstream_rx) = upstream.split();
    let (mut downstream_tx, mut downstream_rx) = socket.split();

    let client_to_upstream = async {
        while let Some(Ok(msg)) = downstream_rx.next().await {
            let done = matches!(msg, WsMessage::Close(_));
            let forwarded = match msg {
                WsMessage::Text(t) => UpstreamMessage::Text(t.to_string().into()),
                WsMessage::Binary(b) => UpstreamMessage::Binary(b.to_vec().into()),
                WsMessage::Ping(p) => UpstreamMessage::Ping(p.to_vec().into()),
                WsMessage::Pong(p) => UpstreamMessage::Pong(p.to_vec().into()),
                WsMessage::Close(_) => UpstreamMessage::Close(None),
            };
            if upstream_tx.send(forwarded).await.is_err() || done {
                break;
            }
        }
    };

    let upstream_to_client = async {
        while let Some(Ok(msg)) = upstream_rx.next().await {
            let forwarded = match msg {
                UpstreamMessage::Text(t) => WsMessage::Text(t.to_string().into()),
                UpstreamMessage::Binary(b) => WsMessage::Binary(b.to_vec().into()),
                UpstreamMessage::Ping(p) => WsMessage::Ping(p.to_vec().into()),
                UpstreamMessage::Pong(p) => WsMessage::Pong(p.to_vec().into()),
                UpstreamMessage::Close(_) => WsMessage::Close(None),
                UpstreamMessage::Frame(_) => continue,
            };
            let done = matches!(forwarded, WsMessage::Close(_));
            if downstream_tx.send(forwarded).await.is_err() || done {
                break;
            }
        }
    };

    tokio::select! {
        _ = client_to_upstream => {}
        _ = upstream_to_client => {}
    }
}

fn not_found(message: impl Into<String>) -> Response {
    (StatusCode::NOT_FOUND, Json(ApiResponse::<()>::error(message))).into_response()
}

fn bad_gateway(message: impl Into<String>) -> Response {
    (StatusCode::BAD_GATEWAY, Json(ApiResponse::<()>::error(message))).into_response()
}
