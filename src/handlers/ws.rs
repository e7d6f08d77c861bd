// src/handlers/ws.rs

use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    config::Config,
    engine::session::{ConnId, SessionCommand},
    error::AppError,
    models::protocol::{ClientEvent, ServerEvent},
    state::AppState,
    utils::jwt::verify_jwt,
};

/// Monotonic connection ids; unique per process, never reused.
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

const GUEST_NAME_MIN: usize = 2;
const GUEST_NAME_MAX: usize = 20;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
    pub guest_name: Option<String>,
}

/// The identity a connection carries into the room: either the subject of a
/// verified token or a freshly minted guest.
#[derive(Debug, Clone)]
struct Identity {
    user_id: String,
    username: String,
}

/// Connection Gateway: resolves the caller's identity and intended room,
/// then attaches the upgraded socket to the room actor.
///
/// An unknown room code refuses the connection before the upgrade.
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let identity = resolve_identity(&query, &state.config)?;

    let handle = state
        .registry
        .lookup(&room_code)
        .await
        .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, handle.tx, identity)))
}

/// Exactly one of `token` / `guest_name` must be present. Guest display names
/// are validated here; duplicates are allowed since players are keyed by
/// identity, not name.
fn resolve_identity(query: &WsQuery, config: &Config) -> Result<Identity, AppError> {
    match (&query.token, &query.guest_name) {
        (Some(token), None) => {
            let claims = verify_jwt(token, &config.jwt_secret)?;
            Ok(Identity { user_id: claims.sub, username: claims.username })
        }
        (None, Some(guest_name)) => {
            let name = guest_name.trim();
            let length = name.chars().count();
            if length < GUEST_NAME_MIN || length > GUEST_NAME_MAX {
                return Err(AppError::BadRequest(format!(
                    "Guest name must be {GUEST_NAME_MIN}-{GUEST_NAME_MAX} characters"
                )));
            }
            if name.chars().any(char::is_control) {
                return Err(AppError::BadRequest(
                    "Guest name contains unprintable characters".to_string(),
                ));
            }
            let suffix = Uuid::new_v4().simple().to_string();
            Ok(Identity {
                user_id: format!("guest_{}", &suffix[..8]),
                username: name.to_string(),
            })
        }
        _ => Err(AppError::BadRequest(
            "Provide exactly one of token or guest_name".to_string(),
        )),
    }
}

/// One task per connection: forwards room broadcasts out and parsed client
/// events in. The room actor is the only thing that ever touches room state;
/// this loop never does more than enqueue commands.
async fn handle_socket(
    mut socket: WebSocket,
    session_tx: mpsc::UnboundedSender<SessionCommand>,
    identity: Identity,
) {
    let conn_id: ConnId = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerEvent>();

    if session_tx
        .send(SessionCommand::Attach {
            conn_id,
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            tx: out_tx.clone(),
        })
        .is_err()
    {
        // Room actor already gone (evicted between lookup and upgrade).
        return;
    }
    tracing::debug!("conn {}: attached as {}", conn_id, identity.user_id);

    loop {
        tokio::select! {
            outbound = out_rx.recv() => {
                let Some(event) = outbound else { break };
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::error!("conn {}: failed to serialize event: {}", conn_id, e),
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => match ClientEvent::parse(text.as_str()) {
                        Ok(event) => {
                            if session_tx.send(SessionCommand::Client { conn_id, event }).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            // Schema violation: targeted error, connection stays open.
                            if let Some(message) = err.client_message() {
                                let _ = out_tx.send(ServerEvent::Error { message });
                            }
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong and binary frames are ignored
                    Some(Err(e)) => {
                        tracing::debug!("conn {}: socket error: {}", conn_id, e);
                        break;
                    }
                }
            }
        }
    }

    let _ = session_tx.send(SessionCommand::Detach { conn_id });
    tracing::debug!("conn {}: detached", conn_id);
}
