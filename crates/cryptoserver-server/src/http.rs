//! HTTP request routing and API key authentication.
//!
//! [`handle`] is the whole request pipeline as a plain async function over a
//! [`RequestContext`], so it can be driven directly by tests. [`router`] wraps
//! it as an axum fallback handler for the listener.
//!
//! # Routes
//!
//! | Method | Path                        | Key    | Response                     |
//! |--------|-----------------------------|--------|------------------------------|
//! | GET    | `/loopback`                 | none   | greeting                     |
//! | GET    | `/_cryptoserver/connections`| admin  | open connection records      |
//! | GET    | `/_cryptoserver/config`     | admin  | redacted settings            |
//! | POST   | `/encrypt`                  | crypto | operation JSON               |
//! | POST   | `/decrypt`                  | crypto | cleartext bytes              |
//!
//! Paths compare case-insensitively; the query string is ignored.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use cryptoserver_core::{DecryptRequest, Environment, OperationError};
use serde::Serialize;

use crate::AppState;

/// Greeting returned by `GET /loopback`.
pub const LOOPBACK_GREETING: &str = "Hello from CryptoServer!";

const TEXT: &str = "text/plain; charset=utf-8";
const JSON: &str = "application/json";
const OCTET_STREAM: &str = "application/octet-stream";

/// Transport-independent view of an inbound request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Peer address
    pub source: SocketAddr,
    /// HTTP method
    pub method: Method,
    /// Path without query string
    pub path: String,
    /// `Host` header
    pub host: Option<String>,
    /// Value of the configured API key header
    pub api_key: Option<String>,
    /// Raw request body
    pub body: Bytes,
}

/// Response produced by [`handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// HTTP status
    pub status: StatusCode,
    /// `Content-Type` header value
    pub content_type: &'static str,
    /// Response body
    pub body: Vec<u8>,
}

impl Reply {
    fn text(status: StatusCode, message: &str) -> Self {
        Self { status, content_type: TEXT, body: message.as_bytes().to_vec() }
    }

    fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self { status: StatusCode::OK, content_type: JSON, body },
            Err(e) => {
                tracing::error!("Unable to serialize response: {}", e);
                Self::internal_error()
            },
        }
    }

    fn bytes(body: Vec<u8>) -> Self {
        Self { status: StatusCode::OK, content_type: OCTET_STREAM, body }
    }

    fn internal_error() -> Self {
        Self::text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    fn unknown_endpoint() -> Self {
        Self::text(StatusCode::BAD_REQUEST, "Unknown API endpoint or verb")
    }

    fn operation_failed(err: &OperationError) -> Self {
        Self::text(StatusCode::INTERNAL_SERVER_ERROR, &err.reason())
    }

    /// Body as UTF-8 text (lossy).
    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let content_type = HeaderValue::from_static(self.content_type);
        (self.status, [(header::CONTENT_TYPE, content_type)], self.body).into_response()
    }
}

/// Authorization level granted by the presented API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    Admin,
    Crypto,
}

/// Serve one request.
///
/// Every request other than the loopback check is recorded in the
/// connection registry for its whole duration.
pub async fn handle(state: &AppState, ctx: RequestContext) -> Reply {
    let started = state.env.now();
    let logging = &state.settings.logging;

    if logging.log_requests {
        tracing::info!(
            "Request {}:{} {} {} ({} bytes)",
            ctx.source.ip(),
            ctx.source.port(),
            ctx.method,
            ctx.path,
            ctx.body.len()
        );
    }

    let reply = route(state, &ctx).await;

    if logging.log_responses {
        tracing::info!(
            "Response {}:{} {} {} {} ({} bytes)",
            ctx.source.ip(),
            ctx.source.port(),
            ctx.method,
            ctx.path,
            reply.status.as_u16(),
            reply.body.len()
        );
    }

    let elapsed = state.env.now() - started;
    tracing::debug!(
        "{}:{} {} {} {} {:.2}ms",
        ctx.source.ip(),
        ctx.source.port(),
        ctx.method,
        ctx.path,
        reply.status.as_u16(),
        elapsed.as_secs_f64() * 1000.0
    );

    reply
}

async fn route(state: &AppState, ctx: &RequestContext) -> Reply {
    if ctx.method == Method::GET && path_is(&ctx.path, "/loopback") {
        return Reply::text(StatusCode::OK, LOOPBACK_GREETING);
    }

    let connection = state.registry.open(ctx.source, ctx.method.as_str(), &ctx.path);
    connection.update(
        &state.settings.server.dns_hostname,
        ctx.host.as_deref().unwrap_or_default(),
        &state.settings.server.node_name,
    );

    match authenticate(state, ctx.api_key.as_deref()) {
        Err(reply) => reply,
        Ok(Grant::Admin) => admin_api(state, ctx),
        Ok(Grant::Crypto) => crypto_api(state, ctx).await,
    }
}

fn authenticate(state: &AppState, api_key: Option<&str>) -> Result<Grant, Reply> {
    let auth = &state.settings.auth;

    match api_key {
        None | Some("") => {
            Err(Reply::text(StatusCode::UNAUTHORIZED, "No authentication material"))
        },
        Some(key) if key == auth.admin_api_key => Ok(Grant::Admin),
        Some(key) if key == auth.crypto_api_key => Ok(Grant::Crypto),
        Some(_) => {
            tracing::warn!("Invalid API key supplied");
            Err(Reply::text(StatusCode::UNAUTHORIZED, "Invalid API key"))
        },
    }
}

fn admin_api(state: &AppState, ctx: &RequestContext) -> Reply {
    tracing::info!("Admin API key used for {}", ctx.path);

    if ctx.method == Method::GET {
        if path_is(&ctx.path, "/_cryptoserver/connections") {
            return Reply::json(&state.registry.list());
        }
        if path_is(&ctx.path, "/_cryptoserver/config") {
            return Reply::json(&state.settings.redacted());
        }
    }

    tracing::warn!("Unknown admin API endpoint: {} {}", ctx.method, ctx.path);
    Reply::unknown_endpoint()
}

async fn crypto_api(state: &AppState, ctx: &RequestContext) -> Reply {
    if ctx.method == Method::POST {
        if path_is(&ctx.path, "/encrypt") {
            return encrypt(state, ctx.body.clone()).await;
        }
        if path_is(&ctx.path, "/decrypt") {
            return decrypt(state, &ctx.body).await;
        }
    }

    tracing::warn!("Unknown crypto API endpoint: {} {}", ctx.method, ctx.path);
    Reply::unknown_endpoint()
}

async fn encrypt(state: &AppState, body: Bytes) -> Reply {
    let crypto = Arc::clone(&state.crypto);

    match tokio::task::spawn_blocking(move || crypto.encrypt(&body)).await {
        Ok(Ok(operation)) => Reply::json(&operation),
        Ok(Err(err)) => {
            tracing::warn!("Unable to encrypt: {}", err.reason());
            Reply::operation_failed(&err)
        },
        Err(join_err) => {
            tracing::error!("Encrypt task failed: {}", join_err);
            Reply::internal_error()
        },
    }
}

async fn decrypt(state: &AppState, body: &[u8]) -> Reply {
    let request: DecryptRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Unable to deserialize decrypt request: {}", e);
            return Reply::text(StatusCode::BAD_REQUEST, "Unable to deserialize request body");
        },
    };

    let crypto = Arc::clone(&state.crypto);

    match tokio::task::spawn_blocking(move || crypto.decrypt(&request)).await {
        Ok(Ok(clear)) => {
            tracing::debug!("Decrypt returning {} bytes", clear.len());
            Reply::bytes(clear)
        },
        Ok(Err(err)) => {
            tracing::warn!("Unable to decrypt: {}", err.reason());
            Reply::operation_failed(&err)
        },
        Err(join_err) => {
            tracing::error!("Decrypt task failed: {}", join_err);
            Reply::internal_error()
        },
    }
}

fn path_is(path: &str, expected: &str) -> bool {
    path.eq_ignore_ascii_case(expected)
}

/// Router serving every path through [`handle`].
///
/// Request bodies are read whole with no size cap, so payloads of any length
/// reach `/encrypt`. Must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new().fallback(dispatch).layer(DefaultBodyLimit::disable()).with_state(state)
}

async fn dispatch(
    State(state): State<Arc<AppState>>,
    ConnectInfo(source): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    let api_key = headers
        .get(state.settings.auth.api_key_header.as_str())
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
    let host = headers
        .get(header::HOST)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    let ctx = RequestContext { source, method, path: uri.path().to_string(), host, api_key, body };

    handle(&state, ctx).await
}
