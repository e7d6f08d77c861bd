// src/engine/registry.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{RwLock, mpsc};

use crate::models::quiz::QuizSnapshot;

use super::emitter::ResultSink;
use super::session::{Session, SessionHandle, run_session};

const CODE_LENGTH: usize = 6;
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Process-wide table of live rooms. Lookups are concurrent; insert and
/// remove take the write lock. This is the only state shared across rooms.
#[derive(Clone)]
pub struct SessionRegistry {
    rooms: Arc<RwLock<HashMap<String, SessionHandle>>>,
    sink: Arc<dyn ResultSink>,
    results_delay: Duration,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(sink: Arc<dyn ResultSink>, results_delay: Duration, idle_timeout: Duration) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            sink,
            results_delay,
            idle_timeout,
        }
    }

    /// Creates a room for `quiz` with `host_id` as the fixed host identity,
    /// spawns its actor task, and returns the generated room code.
    pub async fn create_room(&self, quiz: QuizSnapshot, host_id: String) -> String {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle { tx: tx.clone() };

        let code = {
            let mut rooms = self.rooms.write().await;
            let code = generate_code(|candidate| rooms.contains_key(candidate));
            rooms.insert(code.clone(), handle);
            code
        };

        tracing::info!("room {}: created for quiz '{}'", code, quiz.name);
        let session = Session::new(code.clone(), quiz, host_id, self.results_delay);
        tokio::spawn(run_session(
            session,
            tx,
            rx,
            Arc::clone(&self.rooms),
            Arc::clone(&self.sink),
            self.idle_timeout,
        ));
        code
    }

    pub async fn lookup(&self, code: &str) -> Option<SessionHandle> {
        self.rooms.read().await.get(code).cloned()
    }

    pub async fn live_rooms(&self) -> usize {
        self.rooms.read().await.len()
    }
}

/// Fixed-length uppercase alphanumeric code, regenerated on collision with a
/// currently-live room.
fn generate_code<F>(taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let mut rng = rand::thread_rng();
    loop {
        let code: String = (0..CODE_LENGTH)
            .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
            .collect();
        if !taken(&code) {
            return code;
        }
    }
}
