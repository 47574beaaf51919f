//! WebSocket Bridge (§4.7) — collapsed to an in-process `Router::handle`
//! call per the Open Question resolution in DESIGN.md. Split send/receive
//! halves plus a keepalive task, grounded on `ConaryLabs-Mira`'s
//! `web/ws.rs` (the teacher has no WS server of its own).

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use router_core::error::ErrorCode;
use router_core::types::RouterResponse;
use router_policy::Router;

use crate::state::GatewayState;

const PING_INTERVAL: Duration = Duration::from_secs(60);
const PONG_DEADLINE: Duration = Duration::from_secs(180);

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Builds the standalone WebSocket server app: the configured path upgrades
/// to a connection, anything else gets the `invalid_path` envelope (§4.7).
pub fn build_router(state: GatewayState) -> axum::Router {
    let path = state.ws_path.clone();
    axum::Router::new()
        .route(&path, axum::routing::get(ws_handler))
        .fallback(invalid_path_handler)
        .with_state(state)
}

async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Message>();

    let sender_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let last_pong = Arc::new(Mutex::new(Instant::now()));
    let keepalive_task = {
        let tx = tx.clone();
        let last_pong = last_pong.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PING_INTERVAL);
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                if tx.send(Message::Ping(Vec::new().into())).is_err() {
                    break;
                }
                let elapsed = last_pong.lock().unwrap_or_else(|e| e.into_inner()).elapsed();
                if elapsed > PONG_DEADLINE {
                    debug!("websocket pong deadline exceeded, closing connection");
                    break;
                }
            }
        })
    };

    while let Some(frame) = receiver.next().await {
        let message = match frame {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "websocket receive error");
                break;
            }
        };
        match message {
            Message::Text(text) => {
                let reply = handle_frame(&text, &state.router).await;
                if tx.send(Message::Text(reply.into())).is_err() {
                    break;
                }
            }
            Message::Pong(_) => {
                *last_pong.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    keepalive_task.abort();
    drop(tx);
    let _ = sender_task.await;
}

/// `GET /<unconfigured path>` upgrade attempts are rejected with the
/// structured `invalid_path` envelope (§4.7).
pub async fn invalid_path_handler() -> impl IntoResponse {
    let response = RouterResponse::failure("", ErrorCode::InvalidPath, "unknown websocket path");
    axum::Json(response)
}

/// Parses one inbound frame, requiring `type="request"` and the five
/// required fields, then delegates to the Router. Any parse failure or
/// unexpected shape becomes a `bridge_error` response frame rather than a
/// dropped connection.
async fn handle_frame(text: &str, router: &Router) -> String {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => return frame(RouterResponse::failure("", ErrorCode::BridgeError, format!("invalid JSON: {e}"))),
    };

    let Some(obj) = value.as_object() else {
        return frame(RouterResponse::failure(
            "",
            ErrorCode::BridgeError,
            "frame must be a JSON object",
        ));
    };

    let request_id = obj.get("request_id").and_then(Value::as_str).unwrap_or("").to_string();

    if obj.get("type").and_then(Value::as_str) != Some("request") {
        return frame(RouterResponse::failure(
            request_id,
            ErrorCode::BridgeError,
            "frame type must be \"request\"",
        ));
    }

    for required in ["request_id", "session_id", "user_id", "text"] {
        if !obj.contains_key(required) {
            return frame(RouterResponse::failure(
                request_id,
                ErrorCode::BridgeError,
                format!("frame missing required field: {required}"),
            ));
        }
    }

    match Router::parse_request(text) {
        Ok(request) => frame(router.handle(request).await),
        Err(response) => frame(response),
    }
}

/// Wraps a `RouterResponse` in the `{type: "response", ...}` transport
/// envelope and serializes it to a single JSON text frame.
fn frame(response: RouterResponse) -> String {
    let mut value = serde_json::to_value(&response).unwrap_or_else(|_| serde_json::json!({}));
    if let Value::Object(ref mut map) = value {
        map.insert("type".to_string(), Value::String("response".to_string()));
    }
    serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_string())
}
