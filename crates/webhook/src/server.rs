//! HTTP listener: `POST /{endpoint}` resolves a route, checks the delivery
//! and hands formatted lines to the relay core.
use std::{io, net::SocketAddr, sync::Arc};

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::{Path, State},
        http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
        response::IntoResponse,
        routing::{get, post},
    },
    secrecy::ExposeSecret,
    serde_json::Value,
    tokio::net::TcpListener,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {hookbot_config::Route, hookbot_relay::Core};

use crate::{
    error::Rejection,
    event::{EventHeaderError, EventKind},
    format::format,
    signature::{self, GITLAB_TOKEN_HEADER, SIGNATURE_HEADER},
};

/// Port the listener binds when none is configured.
pub const DEFAULT_PORT: u16 = 4567;

/// Address the listener binds when none is configured.
pub const DEFAULT_BIND: &str = "0.0.0.0";

#[derive(Clone)]
struct AppState {
    core: Arc<Core>,
}

/// Build the webhook router (shared between the binary and tests).
pub fn build_router(core: Arc<Core>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/{endpoint}", post(webhook_handler))
        .with_state(AppState { core })
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    core: Arc<Core>,
    shutdown: CancellationToken,
) -> io::Result<()> {
    let addr: Option<SocketAddr> = listener.local_addr().ok();
    info!(?addr, "webhook listener started");
    axum::serve(listener, build_router(core))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("webhook listener stopped");
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.core.pool().active_networks().len(),
    }))
}

async fn webhook_handler(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, Rejection> {
    let snapshot = state.core.store().snapshot();
    let route = snapshot
        .find_route_by_endpoint(&endpoint)
        .ok_or(Rejection::UnknownEndpoint)?;

    let kind = EventKind::from_headers(&headers).map_err(|e| match e {
        EventHeaderError::Missing => Rejection::MissingEvent,
        EventHeaderError::Unsupported(name) => Rejection::UnsupportedEvent(name),
    });

    if !authentic(route, &headers, &body, kind.as_ref().ok().copied()) {
        warn!(route = %route.name, "rejected delivery with an invalid signature");
        return Err(Rejection::InvalidSignature);
    }
    let kind = kind?;
    let payload = parse_payload(&headers, &body)?;

    let lines = format(kind, &payload);
    if lines.is_empty() {
        debug!(route = %route.name, event = %kind, "nothing to announce");
        return Ok((StatusCode::ACCEPTED, "Accepted"));
    }
    let messages = state.core.dispatch(route, &lines);
    info!(
        route = %route.name,
        event = %kind,
        lines = lines.len(),
        messages,
        "delivery accepted"
    );
    Ok((StatusCode::ACCEPTED, "Accepted"))
}

/// A route with an empty secret accepts every delivery. GitLab events may
/// authenticate with their plain token instead of a signature.
fn authentic(route: &Route, headers: &HeaderMap, body: &[u8], kind: Option<EventKind>) -> bool {
    if !route.verifies_signatures() {
        return true;
    }
    let secret = route.secret.expose_secret();
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(sig) = header(SIGNATURE_HEADER) {
        return signature::verify(body, secret, sig);
    }
    if kind.is_some_and(EventKind::is_gitlab)
        && let Some(token) = header(GITLAB_TOKEN_HEADER)
    {
        return signature::verify_token(secret, token);
    }
    false
}

/// JSON bodies are taken as is; form bodies carry the JSON in `payload`.
fn parse_payload(headers: &HeaderMap, body: &[u8]) -> Result<Value, Rejection> {
    let is_form = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        let payload = url::form_urlencoded::parse(body)
            .find(|(key, _)| key == "payload")
            .map(|(_, value)| value.into_owned())
            .ok_or(Rejection::MissingPayload)?;
        serde_json::from_str(&payload).map_err(Rejection::InvalidJson)
    } else {
        serde_json::from_slice(body).map_err(Rejection::InvalidJson)
    }
}
