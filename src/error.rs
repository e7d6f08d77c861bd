// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Protocol-level violations on the room WebSocket channel.
///
/// These never crash or pause a session: each one either produces a targeted
/// `error` event to the offending connection, or silence when the cause is a
/// stale client rather than a user-facing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A host-only event arrived from a non-host connection.
    NotHost,
    /// Answer for a question that is not the current round, a duplicate
    /// submission, or a submission from an unknown seat. Handled silently.
    InvalidRound,
    /// Event not valid in the room's current state.
    InvalidTransition(String),
    /// Frame failed to parse against the message schema.
    MalformedPayload(String),
}

impl ProtocolError {
    /// The message to send back to the offending connection, or `None` when
    /// the violation indicates a stale client and warrants silence.
    pub fn client_message(&self) -> Option<String> {
        match self {
            ProtocolError::NotHost => Some("Only the host can do that".to_string()),
            ProtocolError::InvalidRound => None,
            ProtocolError::InvalidTransition(msg) => Some(msg.clone()),
            ProtocolError::MalformedPayload(msg) => Some(format!("Malformed payload: {msg}")),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::NotHost => write!(f, "host-only event from non-host connection"),
            ProtocolError::InvalidRound => write!(f, "submission for a round that is not open"),
            ProtocolError::InvalidTransition(msg) => write!(f, "invalid transition: {msg}"),
            ProtocolError::MalformedPayload(msg) => write!(f, "malformed payload: {msg}"),
        }
    }
}

impl std::error::Error for ProtocolError {}
