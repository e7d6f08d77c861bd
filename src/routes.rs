// src/routes.rs

use axum::{
    Json, Router, http::Method, middleware,
    routing::{get, post},
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{room, ws},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * REST surface for room creation and session history (JWT protected).
/// * WebSocket endpoint for the live room channel (identity via query params).
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let room_routes = Router::new()
        .route("/", post(room::create_room))
        .route("/{code}", get(room::room_info))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let session_routes = Router::new()
        .route("/", get(room::list_sessions))
        .route("/{id}", get(room::get_session))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/api/health", get(health))
        .nest("/api/rooms", room_routes)
        .nest("/api/sessions", session_routes)
        // The room channel authenticates via query params, not headers.
        .route("/ws/{room_code}", get(ws::ws_handler))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "quizlive-api" }))
}
