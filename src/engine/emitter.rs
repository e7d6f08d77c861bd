// src/engine/emitter.rs

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::results::SessionResult;

/// Persistence seam for finished sessions. The engine invokes `store` exactly
/// once per session, from the `Finished` transition; a failing sink is logged
/// and never blocks the final broadcast to connected clients.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn store(&self, result: SessionResult) -> Result<(), AppError>;
}

/// Hands a finished session to the sink, downgrading failures to a log line.
pub async fn emit(sink: &Arc<dyn ResultSink>, result: SessionResult) {
    let room_code = result.room_code.clone();
    let session_id = result.id.clone();
    if let Err(e) = sink.store(result).await {
        tracing::error!(
            "Failed to persist session {} for room {}: {}",
            session_id,
            room_code,
            e
        );
    } else {
        tracing::info!("Session {} for room {} persisted", session_id, room_code);
    }
}

/// Default in-process sink. Also backs the session-history read endpoints.
#[derive(Clone, Default)]
pub struct InMemorySink {
    records: Arc<RwLock<Vec<SessionResult>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records hosted by `host_id`, most recently ended first.
    pub async fn for_host(&self, host_id: &str) -> Vec<SessionResult> {
        let records = self.records.read().await;
        let mut matches: Vec<SessionResult> = records
            .iter()
            .filter(|r| r.host_id == host_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
        matches
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionResult> {
        let records = self.records.read().await;
        records.iter().find(|r| r.id == session_id).cloned()
    }
}

#[async_trait]
impl ResultSink for InMemorySink {
    async fn store(&self, result: SessionResult) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        records.push(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(id: &str, host_id: &str) -> SessionResult {
        SessionResult {
            id: id.to_string(),
            room_code: "ABC123".to_string(),
            quiz_name: "Sample".to_string(),
            host_id: host_id.to_string(),
            started_at: Some(Utc::now()),
            ended_at: Utc::now(),
            total_questions: 1,
            rounds: vec![],
            participants: vec![],
            leaderboard: vec![],
        }
    }

    #[tokio::test]
    async fn stores_and_filters_by_host() {
        let sink = InMemorySink::new();
        sink.store(result("s1", "host-a")).await.unwrap();
        sink.store(result("s2", "host-b")).await.unwrap();
        sink.store(result("s3", "host-a")).await.unwrap();

        let mine = sink.for_host("host-a").await;
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|r| r.host_id == "host-a"));

        assert!(sink.get("s2").await.is_some());
        assert!(sink.get("nope").await.is_none());
    }
}
