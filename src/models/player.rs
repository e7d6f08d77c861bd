// src/models/player.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A player's recorded submission for one question.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub selected: Vec<usize>,
    pub elapsed_ms: u64,
}

/// One seat in a room. Created on first successful join and never removed,
/// even on disconnect: the seat and its accumulated stats must survive so a
/// dropped player cannot corrupt scoring or leaderboard size.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub username: String,
    pub joined_at: DateTime<Utc>,
    /// Monotonic per-room join counter; lobby display order and the final
    /// leaderboard tie-break both key off it.
    pub join_seq: u64,
    pub score: i64,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    /// Rounds with no submission at all. Audit-only subset of `wrong_answers`.
    pub unanswered: u32,
    pub tab_switches: u32,
    /// question index -> submission, for the whole session.
    pub answers: HashMap<usize, Submission>,
    pub connected: bool,
}

impl Player {
    pub fn new(id: String, username: String, join_seq: u64, joined_at: DateTime<Utc>) -> Self {
        Self {
            id,
            username,
            joined_at,
            join_seq,
            score: 0,
            correct_answers: 0,
            wrong_answers: 0,
            unanswered: 0,
            tab_switches: 0,
            answers: HashMap::new(),
            connected: true,
        }
    }

    /// Mean time-to-submit across answered questions, `None` if the player
    /// never answered anything.
    pub fn mean_elapsed_ms(&self) -> Option<f64> {
        if self.answers.is_empty() {
            return None;
        }
        let total: u64 = self.answers.values().map(|s| s.elapsed_ms).sum();
        Some(total as f64 / self.answers.len() as f64)
    }
}

/// Roster line item broadcast on join/leave and in the connect handshake.
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub id: String,
    pub username: String,
    pub score: i64,
    pub connected: bool,
}

impl From<&Player> for RosterEntry {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            username: player.username.clone(),
            score: player.score,
            connected: player.connected,
        }
    }
}
