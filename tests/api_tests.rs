// tests/api_tests.rs

use std::sync::Arc;
use std::time::Duration;

use quizlive::config::Config;
use quizlive::engine::emitter::InMemorySink;
use quizlive::engine::registry::SessionRegistry;
use quizlive::routes;
use quizlive::state::AppState;
use quizlive::utils::jwt::sign_jwt;

const TEST_SECRET: &str = "test_secret_for_integration_tests";

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // 1. Create test configuration and state
    let config = Config {
        bind_addr: "127.0.0.1:0".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        results_delay_secs: 1,
        room_idle_secs: 60,
    };

    let history = InMemorySink::new();
    let registry = SessionRegistry::new(
        Arc::new(history.clone()),
        Duration::from_secs(config.results_delay_secs),
        Duration::from_secs(config.room_idle_secs),
    );
    let state = AppState { registry, history, config };

    // 2. Create the router with the app state
    let app = routes::create_router(state);

    // 3. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 4. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn host_token() -> String {
    sign_jwt("host-1", "Grace", TEST_SECRET, 600).expect("Failed to sign test token")
}

fn sample_quiz() -> serde_json::Value {
    serde_json::json!({
        "name": "Capitals",
        "questions": [
            {
                "text": "Capital of France?",
                "type": "single",
                "options": ["Lyon", "Paris", "Nice", "Lille"],
                "correct": [1],
                "time_limit": 10,
                "points": 100
            },
            {
                "text": "Which are primary colors?",
                "type": "multiple",
                "options": ["Red", "Green", "Blue", "Yellow"],
                "correct": [0, 2, 3],
                "time_limit": 20,
                "points": 200
            }
        ]
    })
}

#[tokio::test]
async fn health_check_works() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/api/health", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn unknown_path_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn create_room_requires_auth() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act: no Authorization header
    let response = client
        .post(&format!("{}/api/rooms", address))
        .json(&serde_json::json!({ "quiz": sample_quiz() }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn create_room_works() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = host_token();

    // Act
    let response = client
        .post(&format!("{}/api/rooms", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "quiz": sample_quiz() }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    let code = body["room_code"].as_str().expect("room_code not found");
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
}

#[tokio::test]
async fn create_room_fails_validation() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = host_token();

    // Act: correct index 9 is out of range for four options
    let response = client
        .post(&format!("{}/api/rooms", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "quiz": {
                "name": "Broken",
                "questions": [
                    {
                        "text": "Capital of France?",
                        "type": "single",
                        "options": ["Lyon", "Paris"],
                        "correct": [9],
                        "time_limit": 10,
                        "points": 100
                    }
                ]
            }
        }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn create_room_rejects_empty_quiz() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = host_token();

    // Act
    let response = client
        .post(&format!("{}/api/rooms", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "quiz": { "name": "Empty", "questions": [] }
        }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn room_info_unknown_code_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = host_token();

    // Act
    let response = client
        .get(&format!("{}/api/rooms/ZZZZZZ", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn room_info_reflects_lobby_state() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = host_token();

    let create_resp = client
        .post(&format!("{}/api/rooms", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "quiz": sample_quiz() }))
        .send()
        .await
        .expect("Failed to create room")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse create json");
    let code = create_resp["room_code"].as_str().unwrap();

    // Act
    let response = client
        .get(&format!("{}/api/rooms/{}", address, code))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], *code);
    assert_eq!(body["state"], "lobby");
    assert_eq!(body["is_host"], true);
    assert_eq!(body["current_question"], -1);
    assert_eq!(body["total_questions"], 2);
    assert_eq!(body["players"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn room_info_distinguishes_non_host() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let host = host_token();
    let other = sign_jwt("user-2", "Ada", TEST_SECRET, 600).unwrap();

    let create_resp = client
        .post(&format!("{}/api/rooms", address))
        .header("Authorization", format!("Bearer {}", host))
        .json(&serde_json::json!({ "quiz": sample_quiz() }))
        .send()
        .await
        .expect("Failed to create room")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse create json");
    let code = create_resp["room_code"].as_str().unwrap();

    // Act
    let response = client
        .get(&format!("{}/api/rooms/{}", address, code))
        .header("Authorization", format!("Bearer {}", other))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["is_host"], false);
}

#[tokio::test]
async fn session_history_starts_empty() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = host_token();

    // Act
    let response = client
        .get(&format!("{}/api/sessions", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn unknown_session_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = host_token();

    // Act
    let response = client
        .get(&format!("{}/api/sessions/no-such-id", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}
