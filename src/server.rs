//! HTTP server
//!
//! ## Routes
//!
//! - `GET  /`               - `{"status":"ok"}`
//! - `GET  /healthz`        - `"Healthy"`
//! - `GET  /debug/env`      - which key sources are configured
//! - `GET  /webhook`        - verify-token handshake
//! - `POST /webhook`        - inbound notifications, always 200
//! - `POST /flow-data`      - unencrypted delivery area dropdown
//! - `POST /flows/endpoint` - encrypted Flow data exchange

use crate::areas::AreaDirectory;
use crate::config::BridgeConfig;
use crate::endpoint::FlowEndpoint;
use crate::envelope::FlowCodec;
use crate::error::{BridgeError, Result};
use crate::flow::FlowResponder;
use crate::keys::load_private_key;
use crate::messenger::GraphClient;
use crate::webhook::WebhookHandler;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{body::Incoming, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

const APPLICATION_JSON: &str = "application/json";
const TEXT_PLAIN: &str = "text/plain";

/// Shared, read-only state for all connections
pub struct AppState {
    flow: FlowEndpoint,
    webhook: WebhookHandler,
    areas: AreaDirectory,
    has_pem: bool,
    has_b64: bool,
}

impl AppState {
    /// Builds the service state from configuration.
    ///
    /// A missing private key is tolerated (the Flow endpoint then answers
    /// 400); a key that is configured but unusable is an error.
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let codec = if config.has_key_source() {
            let pem = config.private_key_pem()?;
            Some(FlowCodec::new(load_private_key(&pem)?))
        } else {
            error!("No private key configured (PRIVATE_KEY_PEM / PRIVATE_KEY_PEM_B64), flow endpoint disabled");
            None
        };

        let areas = AreaDirectory::new(config.areas_url.clone(), config.areas_timeout)?;
        let messenger = config.messenger.clone().map(GraphClient::new).transpose()?;
        if messenger.is_none() {
            warn!("Messaging API not configured, flows will not be sent from the webhook");
        }

        Ok(Self {
            flow: FlowEndpoint::new(codec, FlowResponder::new(areas.clone())),
            webhook: WebhookHandler::new(
                config.verify_token.clone(),
                config.trigger_text.clone(),
                config.auto_reply,
                messenger,
            ),
            areas,
            has_pem: config.private_key_pem.is_some(),
            has_b64: config.private_key_pem_b64.is_some(),
        })
    }
}

/// Routes one request. Independent of the connection so it can be driven
/// directly in tests.
pub async fn route(
    state: &AppState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: Bytes,
) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/") => json(StatusCode::OK, serde_json::json!({ "status": "ok" })),
        (&Method::GET, "/healthz") => json(StatusCode::OK, serde_json::json!("Healthy")),
        (&Method::GET, "/debug/env") => json(
            StatusCode::OK,
            serde_json::json!({
                "keyPresent": state.has_pem || state.has_b64,
                "hasPem": state.has_pem,
                "hasB64": state.has_b64,
            }),
        ),
        (&Method::GET, "/webhook") => match state.webhook.verify(query.unwrap_or_default()) {
            Some(challenge) => respond(StatusCode::OK, Some(TEXT_PLAIN), Bytes::from(challenge)),
            None => respond(StatusCode::FORBIDDEN, None, Bytes::new()),
        },
        (&Method::POST, "/webhook") => {
            state.webhook.handle_notification(&body).await;
            respond(StatusCode::OK, None, Bytes::new())
        }
        (&Method::POST, "/flow-data") => {
            let dropdown = state.areas.dropdown().await;
            json(StatusCode::OK, serde_json::json!({ "delivery_areas": dropdown }))
        }
        (&Method::POST, "/flows/endpoint") => flow_endpoint(state, &body).await,
        _ => json(StatusCode::NOT_FOUND, serde_json::json!({ "error": "Not found" })),
    }
}

async fn flow_endpoint(state: &AppState, body: &[u8]) -> Response<Full<Bytes>> {
    match state.flow.handle(body).await {
        Ok(reply) => respond(StatusCode::OK, Some(APPLICATION_JSON), Bytes::from(reply)),
        Err(BridgeError::Config(msg)) | Err(BridgeError::InvalidRequest(msg)) => {
            warn!(error = %msg, "Flow request rejected");
            json(StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg }))
        }
        Err(e) => {
            // Full detail stays in the server log
            error!(error = %e, "Flow request failed");
            respond(e.status_code(), None, Bytes::new())
        }
    }
}

fn json(status: StatusCode, value: serde_json::Value) -> Response<Full<Bytes>> {
    respond(status, Some(APPLICATION_JSON), Bytes::from(value.to_string()))
}

fn respond(status: StatusCode, content_type: Option<&'static str>, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    response
}

async fn handle_http_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return Ok(json(
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": e.to_string() }),
            ));
        }
    };

    Ok(route(&state, &parts.method, parts.uri.path(), parts.uri.query(), body).await)
}

/// Accepts connections until the listener fails
pub async fn run_http_server(state: Arc<AppState>, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, "HTTP server listening");
    serve(listener, state).await
}

/// Serves HTTP/1 on an already-bound listener
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    loop {
        let (stream, remote_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_http_request(Arc::clone(&state), req));

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!(remote_addr = %remote_addr, error = %e, "Connection error");
            }
        });
    }
}
