// src/handlers/room.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;
use validator::Validate;

use crate::{
    engine::session::SessionCommand,
    error::AppError,
    models::quiz::QuizSnapshot,
    state::AppState,
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomRequest {
    #[validate(nested)]
    pub quiz: QuizSnapshot,
}

/// Creates a live room for the supplied quiz snapshot.
///
/// The caller becomes the room's host identity, fixed for the room's
/// lifetime. The snapshot is validated here and never mutated afterwards.
pub async fn create_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let code = state.registry.create_room(payload.quiz, claims.sub).await;

    Ok((StatusCode::CREATED, Json(json!({ "room_code": code }))))
}

/// Live room info, answered by the room actor itself so the snapshot is
/// consistent with whatever round is in flight.
pub async fn room_info(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state
        .registry
        .lookup(&code)
        .await
        .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

    let (reply_tx, reply_rx) = oneshot::channel();
    handle
        .tx
        .send(SessionCommand::Info { reply: reply_tx })
        .map_err(|_| AppError::NotFound("Room not found".to_string()))?;
    let info = reply_rx
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(json!({
        "code": info.code,
        "quiz_name": info.quiz_name,
        "state": info.state,
        "is_host": info.host_id == claims.sub,
        "players": info.players,
        "current_question": info.current_question,
        "total_questions": info.total_questions,
    })))
}

/// Finished-session records hosted by the caller, most recent first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = state.history.for_host(&claims.sub).await;
    Ok(Json(sessions))
}

/// One finished-session record; only its host may read it.
pub async fn get_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .history
        .get(&session_id)
        .await
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    if session.host_id != claims.sub {
        return Err(AppError::Forbidden("Not authorized".to_string()));
    }

    Ok(Json(session))
}
