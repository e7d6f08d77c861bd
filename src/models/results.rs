// src/models/results.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One line of the final ranked leaderboard. Rank is 1-based positional.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub username: String,
    pub score: i64,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub tab_switches: u32,
}

/// Outcome of one closed round, kept for the final result record.
#[derive(Debug, Clone, Serialize)]
pub struct RoundResult {
    pub question_index: usize,
    pub correct: Vec<usize>,
    /// player id -> points awarded this round.
    pub deltas: HashMap<String, i64>,
    /// player id -> selected option indices (empty for non-submitters).
    pub answers: HashMap<String, Vec<usize>>,
    /// option index -> how many players picked it.
    pub answer_distribution: HashMap<usize, usize>,
    pub total_attempts: usize,
    pub correct_attempts: usize,
}

/// A player's final line in the persisted record.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerResult {
    pub user_id: String,
    pub username: String,
    pub score: i64,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub tab_switches: u32,
    /// question index -> selected option indices.
    pub answers: HashMap<usize, Vec<usize>>,
}

/// The one artifact handed to the external persistence collaborator when a
/// session finishes.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub id: String,
    pub room_code: String,
    pub quiz_name: String,
    pub host_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    pub total_questions: usize,
    pub rounds: Vec<RoundResult>,
    pub participants: Vec<PlayerResult>,
    pub leaderboard: Vec<LeaderboardEntry>,
}
