//! HTTP and WebSocket surface of the relay
//!
//! - `GET /ws`: relay socket. Clients send [`RelayFrame::Join`] once per
//!   room, then [`RelayFrame::Event`] frames, which are copied verbatim to
//!   the other members of the room.
//! - `POST /bot/move`: one engine search per request.
//! - `GET /health`: liveness plus room and connection counts.

use crate::config::EngineConfig;
use crate::relay::{ConnectionId, Relay};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Json, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use shared::RelayFrame;
use std::sync::Arc;
use stockfish_bridge::{search_once, BotMoveResponse, BridgeError, SearchRequest};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub engine: Option<Arc<EngineConfig>>,
}

impl AppState {
    pub fn new(engine: Option<EngineConfig>) -> Self {
        Self {
            relay: Arc::new(Relay::new()),
            engine: engine.map(Arc::new),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/bot/move", post(bot_move))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub rooms: usize,
    pub connections: usize,
    pub engine: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        rooms: state.relay.room_count(),
        connections: state.relay.connection_count(),
        engine: state.engine.is_some(),
    })
}

#[derive(Debug, Error)]
pub enum BotMoveError {
    #[error("no engine configured")]
    NoEngine,

    #[error("rejected request: {0}")]
    BadRequest(BridgeError),

    #[error(transparent)]
    Engine(#[from] BridgeError),
}

impl IntoResponse for BotMoveError {
    fn into_response(self) -> Response {
        let status = match self {
            BotMoveError::NoEngine => StatusCode::SERVICE_UNAVAILABLE,
            BotMoveError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BotMoveError::Engine(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(BotMoveResponse::failed(&self))).into_response()
    }
}

async fn bot_move(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<BotMoveResponse>, BotMoveError> {
    request.validate().map_err(|e| {
        warn!("[ENGINE] Refusing bot move request: {}", e);
        BotMoveError::BadRequest(e)
    })?;
    let engine = state.engine.as_ref().ok_or(BotMoveError::NoEngine)?;
    debug!("[ENGINE] Bot move requested at skill {}", request.skill_level);

    let best = search_once(&engine.command, &request, &engine.settings)
        .await
        .inspect_err(|e| error!("[ENGINE] Bot move failed: {}", e))?;
    Ok(Json(BotMoveResponse::found(best)))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.relay))
}

async fn handle_socket(socket: WebSocket, relay: Arc<Relay>) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut queued) = mpsc::unbounded_channel::<String>();
    let connection = relay.register(outbox);
    info!("[NETWORK] Client {} connected", connection);

    let writer = tokio::spawn(async move {
        while let Some(frame) = queued.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handle_frame(&relay, connection, text.as_str()),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("[NETWORK] Client {} read error: {}", connection, e);
                break;
            }
        }
    }

    // Dropping the outbox ends the writer once queued frames are flushed.
    relay.leave(connection);
    let _ = writer.await;
    info!("[NETWORK] Client {} disconnected", connection);
}

/// Act on one text frame from `connection`
pub fn handle_frame(relay: &Relay, connection: ConnectionId, text: &str) {
    match RelayFrame::from_text(text) {
        Ok(RelayFrame::Join { session_id }) => {
            let members = relay.join(connection, &session_id);
            reply(relay, connection, &RelayFrame::Joined {
                session_id,
                members,
            });
        }
        Ok(RelayFrame::Event { session_id, event }) => {
            debug!(
                "[RELAY] {} from {} in room {}",
                event.name(),
                connection,
                session_id
            );
            relay.forward(connection, &session_id, text);
        }
        Ok(other) => {
            warn!("[RELAY] Client {} sent a relay-only frame", connection);
            reply(relay, connection, &RelayFrame::Error {
                message: format!("unexpected frame from client: {other:?}"),
            });
        }
        Err(e) => {
            warn!("[RELAY] Malformed frame from {}: {}", connection, e);
            reply(relay, connection, &RelayFrame::Error {
                message: format!("malformed frame: {e}"),
            });
        }
    }
}

fn reply(relay: &Relay, connection: ConnectionId, frame: &RelayFrame) {
    match frame.to_text() {
        Ok(text) => {
            relay.reply(connection, text);
        }
        Err(e) => error!("[RELAY] Could not encode reply: {}", e),
    }
}
