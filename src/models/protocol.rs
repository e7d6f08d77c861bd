// src/models/protocol.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::models::player::RosterEntry;
use crate::models::quiz::{Question, QuestionKind};
use crate::models::results::LeaderboardEntry;

/// Lifecycle of a room. Transitions move forward only, except the
/// host-triggered early jump to `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Lobby,
    Playing,
    RoundResults,
    Finished,
}

/// Raw WebSocket frame shape: `{"event": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
struct WsMessage {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SubmitAnswerData {
    question_index: usize,
    #[serde(default)]
    answers: Vec<usize>,
}

/// Events a client may send over the room channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    JoinRoom,
    StartQuiz,
    SubmitAnswer {
        question_index: usize,
        answers: Vec<usize>,
    },
    NextQuestion,
    EndQuiz,
    TabSwitch,
}

impl ClientEvent {
    /// Parses one inbound text frame. Schema violations surface as
    /// [`ProtocolError::MalformedPayload`]; the connection stays open.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let message: WsMessage = serde_json::from_str(text)
            .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;

        match message.event.as_str() {
            "join_room" => Ok(Self::JoinRoom),
            "start_quiz" => Ok(Self::StartQuiz),
            "submit_answer" => {
                let data: SubmitAnswerData = serde_json::from_value(message.data)
                    .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;
                Ok(Self::SubmitAnswer {
                    question_index: data.question_index,
                    answers: data.answers,
                })
            }
            "next_question" => Ok(Self::NextQuestion),
            "end_quiz" => Ok(Self::EndQuiz),
            "tab_switch" => Ok(Self::TabSwitch),
            other => Err(ProtocolError::MalformedPayload(format!(
                "unknown event '{other}'"
            ))),
        }
    }
}

/// Events the server pushes to clients, serialized as
/// `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected(ConnectedPayload),
    PlayerJoined { players: Vec<RosterEntry> },
    PlayerLeft { players: Vec<RosterEntry> },
    QuizStarted(RoundPayload),
    NextQuestion(RoundPayload),
    AnswerReceived { count: usize, total: usize },
    AllAnswered,
    QuestionResults(RoundResultsPayload),
    QuizEnded(QuizEndedPayload),
    Error { message: String },
}

/// Handshake payload, sent once when a connection attaches.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedPayload {
    pub room_code: String,
    pub state: RoomState,
    pub is_host: bool,
    pub players: Vec<RosterEntry>,
    /// -1 while the room is still in the lobby.
    pub current_question: i64,
    pub total_questions: usize,
}

/// A question as clients see it. The correct set is present only on the
/// host connection and in the post-game review.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub options: Vec<String>,
    pub time_limit: u64,
    pub points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<Vec<usize>>,
}

impl QuestionView {
    pub fn redacted(question: &Question) -> Self {
        Self::build(question, false)
    }

    pub fn unredacted(question: &Question) -> Self {
        Self::build(question, true)
    }

    fn build(question: &Question, with_correct: bool) -> Self {
        Self {
            text: question.text.clone(),
            kind: question.kind,
            options: question.options.clone(),
            time_limit: question.time_limit,
            points: question.points,
            correct: with_correct.then(|| question.correct.clone()),
        }
    }
}

/// Broadcast when a round opens (`quiz_started` / `next_question`).
///
/// `deadline` is the authoritative end of the round; client countdowns are
/// rendering projections of it.
#[derive(Debug, Clone, Serialize)]
pub struct RoundPayload {
    pub question: QuestionView,
    pub index: usize,
    pub total: usize,
    pub deadline: DateTime<Utc>,
    pub fun_mode: bool,
}

/// Broadcast when a round closes. `correct` and `answers` are withheld from
/// non-host clients when the session runs with `hide_results`.
#[derive(Debug, Clone, Serialize)]
pub struct RoundResultsPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<Vec<usize>>,
    /// player id -> running total after this round.
    pub scores: HashMap<String, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<HashMap<String, Vec<usize>>>,
    pub hide_results: bool,
}

/// Final broadcast. Non-hosts under `hide_results` receive only the flag,
/// which clients render as a participation acknowledgment.
#[derive(Debug, Clone, Serialize)]
pub struct QuizEndedPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaderboard: Option<LeaderboardPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuestionView>>,
    pub hide_results: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardPayload {
    pub players: Vec<LeaderboardEntry>,
    pub total_questions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_without_data() {
        assert_eq!(ClientEvent::parse(r#"{"event":"join_room"}"#), Ok(ClientEvent::JoinRoom));
        assert_eq!(
            ClientEvent::parse(r#"{"event":"tab_switch","data":{}}"#),
            Ok(ClientEvent::TabSwitch)
        );
    }

    #[test]
    fn parses_submit_answer() {
        let event =
            ClientEvent::parse(r#"{"event":"submit_answer","data":{"question_index":2,"answers":[0,3]}}"#)
                .unwrap();
        assert_eq!(
            event,
            ClientEvent::SubmitAnswer { question_index: 2, answers: vec![0, 3] }
        );
    }

    #[test]
    fn rejects_unknown_event() {
        assert!(matches!(
            ClientEvent::parse(r#"{"event":"reboot"}"#),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn rejects_bad_submit_payload() {
        assert!(matches!(
            ClientEvent::parse(r#"{"event":"submit_answer","data":{"answers":[0]}}"#),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn rejects_non_json_frame() {
        assert!(matches!(
            ClientEvent::parse("hello"),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn server_event_envelope_shape() {
        let json = serde_json::to_value(ServerEvent::AnswerReceived { count: 2, total: 5 }).unwrap();
        assert_eq!(json["event"], "answer_received");
        assert_eq!(json["data"]["count"], 2);

        let json = serde_json::to_value(ServerEvent::AllAnswered).unwrap();
        assert_eq!(json["event"], "all_answered");
    }

    #[test]
    fn redacted_results_omit_fields() {
        let payload = RoundResultsPayload {
            correct: None,
            scores: HashMap::new(),
            answers: None,
            hide_results: true,
        };
        let json = serde_json::to_value(payload).unwrap();
        assert!(json.get("correct").is_none());
        assert!(json.get("answers").is_none());
        assert_eq!(json["hide_results"], true);
    }
}
