//! WebSocket transport: per-connection framing, origin policy, and
//! dispatch into [`Session`].
//!
//! Grounded in the sibling `echo-session-ws-gateway` crate's shape: an
//! `axum` router with one upgrade route, an origin allowlist check before
//! upgrade, and the connection split into a reader loop and a writer task
//! joined by an `mpsc` channel so outbound replies never block on inbound
//! reads.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::WorldConfig;
use crate::protocol::{ClientEnvelope, ErrorMessage, ServerMessage};
use crate::session::{Session, SessionDeps};
use crate::storage::{CharacterStore, SessionStore, WorldRecordStore};
use crate::time::Clock;
use crate::world::WorldModel;

#[derive(Default)]
pub struct GatewayMetrics {
    pub connections_accepted: u64,
    pub connections_rejected_origin: u64,
    pub frames_oversize: u64,
}

pub struct AppState {
    pub config: WorldConfig,
    pub clock: Arc<dyn Clock>,
    pub sessions: Arc<dyn SessionStore>,
    pub characters: Arc<dyn CharacterStore>,
    pub worlds: Arc<dyn WorldRecordStore>,
    pub discovery: Arc<dyn crate::discovery::DiscoveryStore>,
    /// One [`WorldModel`] per world id, built lazily from the world record
    /// store's seed/generator tag and cached for the life of the process.
    pub world_models: Mutex<HashMap<String, Arc<WorldModel>>>,
    pub metrics: Mutex<GatewayMetrics>,
}

impl AppState {
    fn world_model_for(&self, world_id: &str) -> Arc<WorldModel> {
        if let Some(existing) = self.world_models.lock().get(world_id).cloned() {
            return existing;
        }
        let record = self
            .worlds
            .get_world(world_id)
            .unwrap_or_else(|_| crate::storage::WorldRecord {
                seed: self.config.world_seed_override.unwrap_or(0),
                generator_version: self.config.generator(),
            });
        let seed = self.config.world_seed_override.unwrap_or(record.seed);
        let model = Arc::new(WorldModel::new(seed, record.generator_version));
        self.world_models
            .lock()
            .entry(world_id.to_string())
            .or_insert(model)
            .clone()
    }

    /// Resolve the world model for the connection's current state: the
    /// character's own world once authenticated, otherwise a placeholder
    /// used only to satisfy `auth`/unauthenticated error replies (which
    /// never touch the world model).
    fn model_for_session(&self, session: &Session) -> Arc<WorldModel> {
        match session.world_id() {
            Some(world_id) => self.world_model_for(world_id),
            None => self.world_model_for("__unauthenticated__"),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let path = state.config.ws_path.clone();
    Router::new().route(&path, get(ws_handler)).with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let origin = headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !state.config.origin_allowed(origin) {
        state.metrics.lock().connections_rejected_origin += 1;
        tracing::warn!(origin, "rejected websocket upgrade: origin not allowed");
        return axum::http::StatusCode::FORBIDDEN.into_response();
    }

    state.metrics.lock().connections_accepted += 1;
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(256);

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let Ok(text) = serde_json::to_string(&msg) else {
                continue;
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new();
    let deps = SessionDeps {
        clock: state.clock.clone(),
        sessions: state.sessions.clone(),
        characters: state.characters.clone(),
        worlds: state.worlds.clone(),
        discovery: state.discovery.clone(),
        world_seed_override: state.config.world_seed_override,
        move_cooldown_ms: state.config.move_cooldown_ms,
        turn_cooldown_ms: state.config.turn_cooldown_ms,
    };

    while let Some(msg) = ws_rx.next().await {
        let Ok(msg) = msg else { break };
        let Message::Text(text) = msg else {
            if matches!(msg, Message::Close(_)) {
                break;
            }
            continue;
        };

        if text.len() > state.config.max_frame_bytes {
            state.metrics.lock().frames_oversize += 1;
            let _ = out_tx
                .send(ServerMessage::Error(ErrorMessage {
                    code: "bad_schema".to_string(),
                    message: "frame exceeds size limit".to_string(),
                    seq: None,
                }))
                .await;
            break;
        }

        let envelope: ClientEnvelope = match serde_json::from_str(&text) {
            Ok(env) => env,
            Err(e) => {
                let _ = out_tx
                    .send(ServerMessage::Error(ErrorMessage {
                        code: "bad_json".to_string(),
                        message: e.to_string(),
                        seq: None,
                    }))
                    .await;
                continue;
            }
        };

        let world = state.model_for_session(&session);
        let replies = match session.handle(&deps, &world, envelope) {
            Ok(replies) => replies,
            Err(e) => {
                tracing::error!(error = %e, "session handler failed");
                vec![ServerMessage::Error(ErrorMessage {
                    code: "state".to_string(),
                    message: e,
                    seq: None,
                })]
            }
        };

        for reply in replies {
            if out_tx.send(reply).await.is_err() {
                break;
            }
        }
    }

    writer.abort();
}
