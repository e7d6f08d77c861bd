// src/engine/session.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::models::player::{Player, RosterEntry, Submission};
use crate::models::protocol::{
    ClientEvent, ConnectedPayload, LeaderboardPayload, QuestionView, QuizEndedPayload,
    RoomState, RoundPayload, RoundResultsPayload, ServerEvent,
};
use crate::models::quiz::QuizSnapshot;
use crate::models::results::{PlayerResult, RoundResult, SessionResult};

use super::emitter::{self, ResultSink};
use super::{leaderboard, scoring};
use super::timer::RoundTimer;

/// Process-unique id for one attached WebSocket connection.
pub type ConnId = u64;

/// Everything the rest of the process may do to a room: enqueue a command.
#[derive(Debug)]
pub enum SessionCommand {
    Attach {
        conn_id: ConnId,
        user_id: String,
        username: String,
        tx: mpsc::UnboundedSender<ServerEvent>,
    },
    Detach {
        conn_id: ConnId,
    },
    Client {
        conn_id: ConnId,
        event: ClientEvent,
    },
    TimerFired {
        generation: u64,
    },
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },
}

/// Cloneable entry stored in the registry; REST and WS handlers talk to the
/// room exclusively through it.
#[derive(Clone)]
pub struct SessionHandle {
    pub tx: mpsc::UnboundedSender<SessionCommand>,
}

/// Snapshot answered to [`SessionCommand::Info`] queries.
#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    pub code: String,
    pub quiz_name: String,
    pub state: RoomState,
    pub host_id: String,
    pub players: Vec<RosterEntry>,
    pub current_question: i64,
    pub total_questions: usize,
}

/// Side effects `Session::handle` cannot perform itself; the actor loop
/// executes them after each command.
#[derive(Debug)]
pub enum Action {
    StartTimer { duration: Duration, generation: u64 },
    CancelTimer,
    Emit(SessionResult),
}

struct Connection {
    user_id: String,
    username: String,
    is_host: bool,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

/// Why a round closed; decides whether the results screen auto-advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundClose {
    AllAnswered,
    Timeout,
    EndedEarly,
}

/// One live quiz run. All mutable state lives here and is touched only from
/// the single command loop in [`run_session`], so no two transitions for the
/// same room can ever race.
pub struct Session {
    code: String,
    quiz: QuizSnapshot,
    host_id: String,
    state: RoomState,
    players: HashMap<String, Player>,
    connections: HashMap<ConnId, Connection>,
    current: Option<usize>,
    round_opened_at: Option<DateTime<Utc>>,
    round_deadline: Option<DateTime<Utc>>,
    /// Current-round answer records, cleared when a new round opens.
    answers: HashMap<String, Submission>,
    rounds: Vec<RoundResult>,
    /// Bumped whenever the timer is (re)armed or must be invalidated; stale
    /// `TimerFired` commands are dropped by comparing against it.
    generation: u64,
    started_at: Option<DateTime<Utc>>,
    next_join_seq: u64,
    results_delay: Duration,
    emitted: bool,
}

impl Session {
    pub fn new(code: String, quiz: QuizSnapshot, host_id: String, results_delay: Duration) -> Self {
        Self {
            code,
            quiz,
            host_id,
            state: RoomState::Lobby,
            players: HashMap::new(),
            connections: HashMap::new(),
            current: None,
            round_opened_at: None,
            round_deadline: None,
            answers: HashMap::new(),
            rounds: Vec::new(),
            generation: 0,
            started_at: None,
            next_join_seq: 0,
            results_delay,
            emitted: false,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn has_connections(&self) -> bool {
        !self.connections.is_empty()
    }

    /// A finished room with nobody attached has nothing left to do.
    pub fn is_closed(&self) -> bool {
        self.state == RoomState::Finished && self.connections.is_empty()
    }

    /// The single mutation path. Every protocol event, timer fire, and
    /// attach/detach funnels through here on the owning task.
    pub fn handle(&mut self, command: SessionCommand) -> Vec<Action> {
        self.handle_at(command, Utc::now())
    }

    /// Like [`Self::handle`] but with an explicit clock, so tests control time.
    pub fn handle_at(&mut self, command: SessionCommand, now: DateTime<Utc>) -> Vec<Action> {
        let mut actions = Vec::new();
        match command {
            SessionCommand::Attach { conn_id, user_id, username, tx } => {
                self.on_attach(conn_id, user_id, username, tx);
            }
            SessionCommand::Detach { conn_id } => {
                self.on_detach(conn_id, now, &mut actions);
            }
            SessionCommand::Client { conn_id, event } => {
                if let Err(err) = self.on_client(conn_id, event, now, &mut actions) {
                    if let Some(message) = err.client_message() {
                        self.send_to(conn_id, ServerEvent::Error { message });
                    } else {
                        tracing::debug!("room {}: dropped stale event: {}", self.code, err);
                    }
                }
            }
            SessionCommand::TimerFired { generation } => {
                self.on_timer(generation, now, &mut actions);
            }
            SessionCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
        }
        actions
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.code.clone(),
            quiz_name: self.quiz.name.clone(),
            state: self.state,
            host_id: self.host_id.clone(),
            players: self.roster(),
            current_question: self.current.map_or(-1, |i| i as i64),
            total_questions: self.quiz.questions.len(),
        }
    }

    fn on_attach(
        &mut self,
        conn_id: ConnId,
        user_id: String,
        username: String,
        tx: mpsc::UnboundedSender<ServerEvent>,
    ) {
        // The host role follows the identity fixed at room creation, but only
        // one attached connection may hold it at a time.
        let host_taken = self.connections.values().any(|c| c.is_host);
        let is_host = user_id == self.host_id && !host_taken;

        let connected = ConnectedPayload {
            room_code: self.code.clone(),
            state: self.state,
            is_host,
            players: self.roster(),
            current_question: self.current.map_or(-1, |i| i as i64),
            total_questions: self.quiz.questions.len(),
        };
        let _ = tx.send(ServerEvent::Connected(connected));

        self.connections.insert(conn_id, Connection { user_id: user_id.clone(), username, is_host, tx });

        // A returning player keeps the seat and its stats.
        if let Some(player) = self.players.get_mut(&user_id) {
            player.connected = true;
            let players = self.roster();
            self.broadcast(|_| ServerEvent::PlayerJoined { players: players.clone() });
        }
    }

    fn on_detach(&mut self, conn_id: ConnId, now: DateTime<Utc>, actions: &mut Vec<Action>) {
        let Some(connection) = self.connections.remove(&conn_id) else {
            return;
        };

        let still_attached = self
            .connections
            .values()
            .any(|c| c.user_id == connection.user_id);
        if !still_attached {
            if let Some(player) = self.players.get_mut(&connection.user_id) {
                player.connected = false;
                let players = self.roster();
                self.broadcast(|_| ServerEvent::PlayerLeft { players: players.clone() });
            }
        }

        // The departed connection may have been the last holdout of the round.
        if self.state == RoomState::Playing && self.all_connected_answered() {
            self.broadcast(|_| ServerEvent::AllAnswered);
            self.close_round(RoundClose::AllAnswered, now, actions);
        }
    }

    fn on_client(
        &mut self,
        conn_id: ConnId,
        event: ClientEvent,
        now: DateTime<Utc>,
        actions: &mut Vec<Action>,
    ) -> Result<(), ProtocolError> {
        match event {
            ClientEvent::JoinRoom => self.on_join(conn_id, now),
            ClientEvent::StartQuiz => self.on_start(conn_id, now, actions),
            ClientEvent::SubmitAnswer { question_index, answers } => {
                self.on_submit(conn_id, question_index, answers, now, actions)
            }
            ClientEvent::NextQuestion => self.on_next(conn_id, now, actions),
            ClientEvent::EndQuiz => self.on_end(conn_id, now, actions),
            ClientEvent::TabSwitch => {
                // Informational only; never rejected.
                if let Some(user_id) = self.user_of(conn_id) {
                    if let Some(player) = self.players.get_mut(&user_id) {
                        player.tab_switches += 1;
                    }
                }
                Ok(())
            }
        }
    }

    fn on_join(&mut self, conn_id: ConnId, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        let Some(connection) = self.connections.get(&conn_id) else {
            return Ok(());
        };
        // The host drives the room but does not occupy a seat.
        if connection.is_host {
            return Ok(());
        }
        if self.players.contains_key(&connection.user_id) {
            return Ok(());
        }
        if self.state != RoomState::Lobby {
            return Err(ProtocolError::InvalidTransition(
                "Quiz already in progress".to_string(),
            ));
        }

        let seq = self.next_join_seq;
        self.next_join_seq += 1;
        let player = Player::new(connection.user_id.clone(), connection.username.clone(), seq, now);
        self.players.insert(player.id.clone(), player);

        tracing::info!("room {}: player joined ({} seated)", self.code, self.players.len());
        let players = self.roster();
        self.broadcast(|_| ServerEvent::PlayerJoined { players: players.clone() });
        Ok(())
    }

    fn on_start(
        &mut self,
        conn_id: ConnId,
        now: DateTime<Utc>,
        actions: &mut Vec<Action>,
    ) -> Result<(), ProtocolError> {
        self.require_host(conn_id)?;
        if self.state != RoomState::Lobby {
            return Err(ProtocolError::InvalidTransition(
                "Quiz has already started".to_string(),
            ));
        }
        if self.players.is_empty() {
            return Err(ProtocolError::InvalidTransition(
                "Cannot start without players".to_string(),
            ));
        }

        self.state = RoomState::Playing;
        self.started_at = Some(now);
        tracing::info!("room {}: quiz started with {} players", self.code, self.players.len());
        self.open_round(0, now, actions);
        Ok(())
    }

    fn on_submit(
        &mut self,
        conn_id: ConnId,
        question_index: usize,
        selected: Vec<usize>,
        now: DateTime<Utc>,
        actions: &mut Vec<Action>,
    ) -> Result<(), ProtocolError> {
        if self.state != RoomState::Playing {
            return Err(ProtocolError::InvalidRound);
        }
        if self.current != Some(question_index) {
            return Err(ProtocolError::InvalidRound);
        }
        let Some(user_id) = self.user_of(conn_id) else {
            return Err(ProtocolError::InvalidRound);
        };
        if !self.players.contains_key(&user_id) {
            return Err(ProtocolError::InvalidRound);
        }
        // First submission is final; later ones are rejected, not overwritten.
        if self.answers.contains_key(&user_id) {
            return Err(ProtocolError::InvalidRound);
        }

        let elapsed_ms = self.elapsed_ms(question_index, now);
        let submission = Submission { selected, elapsed_ms };
        if let Some(player) = self.players.get_mut(&user_id) {
            player.answers.insert(question_index, submission.clone());
        }
        self.answers.insert(user_id, submission);

        let count = self.answers.len();
        let total = self.connected_player_count();
        self.broadcast(|_| ServerEvent::AnswerReceived { count, total });

        if self.all_connected_answered() {
            self.broadcast(|_| ServerEvent::AllAnswered);
            self.close_round(RoundClose::AllAnswered, now, actions);
        }
        Ok(())
    }

    fn on_next(
        &mut self,
        conn_id: ConnId,
        now: DateTime<Utc>,
        actions: &mut Vec<Action>,
    ) -> Result<(), ProtocolError> {
        self.require_host(conn_id)?;
        if self.state != RoomState::RoundResults {
            return Err(ProtocolError::InvalidTransition(
                "Not between rounds".to_string(),
            ));
        }
        self.advance(now, actions);
        Ok(())
    }

    fn on_end(
        &mut self,
        conn_id: ConnId,
        now: DateTime<Utc>,
        actions: &mut Vec<Action>,
    ) -> Result<(), ProtocolError> {
        self.require_host(conn_id)?;
        match self.state {
            RoomState::Playing => {
                // Score the open round from whatever answers exist, then stop.
                self.close_round(RoundClose::EndedEarly, now, actions);
                self.finish(now, actions);
                Ok(())
            }
            RoomState::RoundResults => {
                self.finish(now, actions);
                Ok(())
            }
            RoomState::Lobby | RoomState::Finished => Err(ProtocolError::InvalidTransition(
                "Quiz is not running".to_string(),
            )),
        }
    }

    fn on_timer(&mut self, generation: u64, now: DateTime<Utc>, actions: &mut Vec<Action>) {
        // A fire that lost the race against round completion (or any restart)
        // carries a stale generation and is a benign no-op.
        if generation != self.generation {
            return;
        }
        match self.state {
            RoomState::Playing => {
                tracing::debug!("room {}: round timed out", self.code);
                self.close_round(RoundClose::Timeout, now, actions);
            }
            RoomState::RoundResults => self.advance(now, actions),
            RoomState::Lobby | RoomState::Finished => {}
        }
    }

    /// Opens question `index`: clears round records, arms the timer, and
    /// broadcasts the question with the correct set visible to the host only.
    fn open_round(&mut self, index: usize, now: DateTime<Utc>, actions: &mut Vec<Action>) {
        let question = &self.quiz.questions[index];
        let deadline = now + chrono::Duration::seconds(question.time_limit as i64);
        let time_limit = question.time_limit;

        self.current = Some(index);
        self.answers.clear();
        self.round_opened_at = Some(now);
        self.round_deadline = Some(deadline);
        self.generation += 1;
        actions.push(Action::StartTimer {
            duration: Duration::from_secs(time_limit),
            generation: self.generation,
        });

        let total = self.quiz.questions.len();
        let fun_mode = self.quiz.fun_mode;
        let question = self.quiz.questions[index].clone();
        self.broadcast(|conn| {
            let view = if conn.is_host {
                QuestionView::unredacted(&question)
            } else {
                QuestionView::redacted(&question)
            };
            let payload = RoundPayload { question: view, index, total, deadline, fun_mode };
            if index == 0 {
                ServerEvent::QuizStarted(payload)
            } else {
                ServerEvent::NextQuestion(payload)
            }
        });
    }

    /// `Playing -> RoundResults`: scores the round for every seated player,
    /// applies deltas, and broadcasts results redacted per `hide_results`.
    fn close_round(&mut self, reason: RoundClose, now: DateTime<Utc>, actions: &mut Vec<Action>) {
        let Some(index) = self.current else {
            return;
        };
        actions.push(Action::CancelTimer);
        self.generation += 1;
        self.round_deadline = None;

        let question = self.quiz.questions[index].clone();
        let mut deltas = HashMap::new();
        let mut answer_map = HashMap::new();
        let mut distribution: HashMap<usize, usize> = HashMap::new();
        let mut total_attempts = 0;
        let mut correct_attempts = 0;

        for player in self.players.values_mut() {
            match self.answers.get(&player.id) {
                Some(submission) => {
                    total_attempts += 1;
                    for &option in &submission.selected {
                        *distribution.entry(option).or_insert(0) += 1;
                    }
                    let delta =
                        scoring::score_answer(&question, &submission.selected, submission.elapsed_ms);
                    if scoring::is_correct(&question, &submission.selected) {
                        correct_attempts += 1;
                        player.correct_answers += 1;
                    } else {
                        player.wrong_answers += 1;
                    }
                    player.score += delta;
                    deltas.insert(player.id.clone(), delta);
                    answer_map.insert(player.id.clone(), submission.selected.clone());
                }
                None => {
                    // No submission: zero points, counted as wrong, with the
                    // audit-only unanswered marker.
                    player.wrong_answers += 1;
                    player.unanswered += 1;
                    deltas.insert(player.id.clone(), 0);
                    answer_map.insert(player.id.clone(), Vec::new());
                }
            }
        }

        self.rounds.push(RoundResult {
            question_index: index,
            correct: question.correct.clone(),
            deltas,
            answers: answer_map.clone(),
            answer_distribution: distribution,
            total_attempts,
            correct_attempts,
        });
        self.state = RoomState::RoundResults;

        let scores: HashMap<String, i64> =
            self.players.values().map(|p| (p.id.clone(), p.score)).collect();
        let hide_results = self.quiz.hide_results;
        let correct = question.correct.clone();
        self.broadcast(|conn| {
            let full = conn.is_host || !hide_results;
            ServerEvent::QuestionResults(RoundResultsPayload {
                correct: full.then(|| correct.clone()),
                scores: scores.clone(),
                answers: full.then(|| answer_map.clone()),
                hide_results,
            })
        });

        // When everyone answered, the results screen advances on its own
        // after a short display window; a timeout-ended round waits for the
        // host. The final question always waits for the host.
        if reason == RoundClose::AllAnswered && !self.is_last_question(index) {
            self.generation += 1;
            actions.push(Action::StartTimer {
                duration: self.results_delay,
                generation: self.generation,
            });
        }
    }

    /// `RoundResults -> Playing`, or `-> Finished` after the last question.
    fn advance(&mut self, now: DateTime<Utc>, actions: &mut Vec<Action>) {
        actions.push(Action::CancelTimer);
        self.generation += 1;

        let Some(index) = self.current else {
            return;
        };
        if self.is_last_question(index) {
            self.finish(now, actions);
        } else {
            self.state = RoomState::Playing;
            self.open_round(index + 1, now, actions);
        }
    }

    /// `* -> Finished`: builds the leaderboard, emits the result record
    /// exactly once, and broadcasts the final standings.
    fn finish(&mut self, now: DateTime<Utc>, actions: &mut Vec<Action>) {
        actions.push(Action::CancelTimer);
        self.generation += 1;
        self.state = RoomState::Finished;
        self.round_deadline = None;

        let board = leaderboard::build(&self.players);
        let total_questions = self.quiz.questions.len();
        tracing::info!(
            "room {}: quiz finished after {} of {} rounds",
            self.code,
            self.rounds.len(),
            total_questions
        );

        let hide_results = self.quiz.hide_results;
        let review: Vec<QuestionView> =
            self.quiz.questions.iter().map(QuestionView::unredacted).collect();
        let board_payload = LeaderboardPayload { players: board.clone(), total_questions };
        self.broadcast(|conn| {
            let full = conn.is_host || !hide_results;
            ServerEvent::QuizEnded(QuizEndedPayload {
                leaderboard: full.then(|| board_payload.clone()),
                questions: full.then(|| review.clone()),
                hide_results,
            })
        });

        // The state machine can only reach Finished once, but the flag keeps
        // the emit-exactly-once invariant local and checkable.
        if !self.emitted {
            self.emitted = true;
            actions.push(Action::Emit(self.build_result(now, board)));
        }
    }

    fn build_result(&self, now: DateTime<Utc>, board: Vec<crate::models::results::LeaderboardEntry>) -> SessionResult {
        let mut participants: Vec<PlayerResult> = self
            .players
            .values()
            .map(|p| PlayerResult {
                user_id: p.id.clone(),
                username: p.username.clone(),
                score: p.score,
                correct_answers: p.correct_answers,
                wrong_answers: p.wrong_answers,
                tab_switches: p.tab_switches,
                answers: p
                    .answers
                    .iter()
                    .map(|(&index, submission)| (index, submission.selected.clone()))
                    .collect(),
            })
            .collect();
        participants.sort_by(|a, b| b.score.cmp(&a.score));

        SessionResult {
            id: Uuid::new_v4().to_string(),
            room_code: self.code.clone(),
            quiz_name: self.quiz.name.clone(),
            host_id: self.host_id.clone(),
            started_at: self.started_at,
            ended_at: now,
            total_questions: self.quiz.questions.len(),
            rounds: self.rounds.clone(),
            participants,
            leaderboard: board,
        }
    }

    fn require_host(&self, conn_id: ConnId) -> Result<(), ProtocolError> {
        match self.connections.get(&conn_id) {
            Some(connection) if connection.is_host => Ok(()),
            _ => Err(ProtocolError::NotHost),
        }
    }

    fn user_of(&self, conn_id: ConnId) -> Option<String> {
        self.connections.get(&conn_id).map(|c| c.user_id.clone())
    }

    fn connected_player_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }

    /// Every currently-connected player has a record for the open round.
    /// Vacuously false with zero connected players: an abandoned round is
    /// left to the timer.
    fn all_connected_answered(&self) -> bool {
        let connected: Vec<&Player> = self.players.values().filter(|p| p.connected).collect();
        !connected.is_empty() && connected.iter().all(|p| self.answers.contains_key(&p.id))
    }

    fn is_last_question(&self, index: usize) -> bool {
        index + 1 >= self.quiz.questions.len()
    }

    fn elapsed_ms(&self, question_index: usize, now: DateTime<Utc>) -> u64 {
        let limit_ms = self.quiz.questions[question_index].time_limit * 1000;
        let elapsed = self
            .round_opened_at
            .map_or(0, |opened| (now - opened).num_milliseconds().max(0) as u64);
        elapsed.min(limit_ms)
    }

    fn roster(&self) -> Vec<RosterEntry> {
        let mut seats: Vec<&Player> = self.players.values().collect();
        seats.sort_by_key(|p| p.join_seq);
        seats.into_iter().map(RosterEntry::from).collect()
    }

    fn send_to(&self, conn_id: ConnId, event: ServerEvent) {
        if let Some(connection) = self.connections.get(&conn_id) {
            let _ = connection.tx.send(event);
        }
    }

    /// Builds one event per connection (payloads differ by role) and pushes
    /// them in a single pass, so all recipients observe the same order.
    fn broadcast<F>(&self, build: F)
    where
        F: Fn(&Connection) -> ServerEvent,
    {
        for connection in self.connections.values() {
            let _ = connection.tx.send(build(connection));
        }
    }
}

/// The per-room actor task: drains the command queue, runs the state machine,
/// and executes its side effects. Rooms with no attached connections are
/// evicted after `idle_timeout`; finished rooms leave as soon as the last
/// connection detaches.
pub async fn run_session(
    mut session: Session,
    tx: mpsc::UnboundedSender<SessionCommand>,
    mut rx: mpsc::UnboundedReceiver<SessionCommand>,
    rooms: Arc<tokio::sync::RwLock<HashMap<String, SessionHandle>>>,
    sink: Arc<dyn ResultSink>,
    idle_timeout: Duration,
) {
    let mut timer = RoundTimer::new();
    loop {
        let command = if session.has_connections() {
            match rx.recv().await {
                Some(command) => command,
                None => break,
            }
        } else {
            match tokio::time::timeout(idle_timeout, rx.recv()).await {
                Ok(Some(command)) => command,
                Ok(None) => break,
                Err(_) => {
                    tracing::info!("room {}: idle with no connections, evicting", session.code());
                    break;
                }
            }
        };

        for action in session.handle(command) {
            match action {
                Action::StartTimer { duration, generation } => {
                    timer.start(tx.clone(), generation, duration);
                }
                Action::CancelTimer => timer.cancel(),
                Action::Emit(result) => emitter::emit(&sink, result).await,
            }
        }

        if session.is_closed() {
            break;
        }
    }

    timer.cancel();
    rooms.write().await.remove(session.code());
    tracing::info!("room {}: removed from registry", session.code());
}
