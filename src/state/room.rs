//! Per-match room: connected sockets, the match state machine and the live scoreboard.

use std::{
    collections::HashMap,
    future::Future,
    ops::Deref,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::extract::ws::Message;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::time::timeout;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{MatchEntity, MatchStatus, QuestionEntity},
    error::ServiceError,
    state::match_machine::{
        AbortError, ApplyError, MatchEvent, MatchPhase, MatchStateMachine, Plan, PlanError,
        PlanId, QuestionPhase, Snapshot,
    },
};

/// One of the two competing teams of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The home team.
    Home,
    /// The away team.
    Away,
}

/// Role of a socket inside a match room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Member of the home team.
    Home,
    /// Member of the away team.
    Away,
    /// Anyone else watching.
    Spectator,
}

impl Role {
    /// Team the role plays for, if any.
    pub fn side(self) -> Option<Side> {
        match self {
            Role::Home => Some(Side::Home),
            Role::Away => Some(Side::Away),
            Role::Spectator => None,
        }
    }
}

/// Reasons an answer is refused. The socket stays open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerRejection {
    /// Spectators never answer.
    #[error("spectators cannot answer")]
    Spectator,
    /// Match is waiting or completed.
    #[error("match is not live")]
    NotLive,
    /// Question was already closed.
    #[error("question {0} is closed")]
    QuestionClosed(usize),
    /// Answer targets a question other than the open one.
    #[error("question {got} is not the open question")]
    WrongQuestion {
        /// Index sent by the client.
        got: usize,
    },
    /// A host action is being applied to the match.
    #[error("match is changing state, try again")]
    TransitionPending,
    /// Player already answered this question.
    #[error("question {0} was already answered")]
    AlreadyAnswered(usize),
    /// Choice index does not exist.
    #[error("choice {choice} is out of range ({choices} choices)")]
    ChoiceOutOfRange {
        /// Choice sent by the client.
        choice: usize,
        /// Number of choices of the question.
        choices: usize,
    },
}

/// Outcome of an accepted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedAnswer {
    /// Question the answer counts for.
    pub question_index: usize,
    /// Team credited with the answer.
    pub side: Side,
    /// Whether the choice was right.
    pub correct: bool,
    /// Players who answered this question so far, both teams included.
    pub answered_count: usize,
    /// Home score after the answer.
    pub home_score: u32,
    /// Away score after the answer.
    pub away_score: u32,
}

/// Per-team count of right answers for one question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectCounts {
    /// Right answers from home players.
    pub home: usize,
    /// Right answers from away players.
    pub away: usize,
}

#[derive(Debug, Clone, Copy)]
struct AnswerRecord {
    side: Side,
    correct: bool,
}

#[derive(Debug)]
struct Board {
    home_score: u32,
    away_score: u32,
    answers: Vec<HashMap<Uuid, AnswerRecord>>,
}

/// Handle used to push messages to a connected match socket.
#[derive(Clone)]
pub struct RoomConnection {
    /// Authenticated user behind the socket.
    pub user_id: Uuid,
    /// Role resolved at identification.
    pub role: Role,
    /// Writer channel of the socket.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// In-memory state of one match shared by every socket watching it.
pub struct MatchRoom {
    match_id: Uuid,
    competition_id: Uuid,
    home_team_id: Uuid,
    away_team_id: Uuid,
    questions: Vec<QuestionEntity>,
    machine: RwLock<MatchStateMachine>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
    board: Mutex<Board>,
    connections: DashMap<Uuid, RoomConnection>,
    hosts: AtomicUsize,
}

/// Handle on a room held for the duration of a host action. A room with an
/// outstanding lease is never released.
pub struct RoomLease {
    room: Arc<MatchRoom>,
}

impl RoomLease {
    /// Take a lease on `room`. Callers must hold the room map entry so that the
    /// room cannot be released between lookup and lease.
    pub(crate) fn new(room: Arc<MatchRoom>) -> Self {
        room.hosts.fetch_add(1, Ordering::SeqCst);
        Self { room }
    }

    /// The leased room.
    pub fn room(&self) -> &Arc<MatchRoom> {
        &self.room
    }
}

impl Deref for RoomLease {
    type Target = MatchRoom;

    fn deref(&self) -> &MatchRoom {
        &self.room
    }
}

impl Drop for RoomLease {
    fn drop(&mut self) {
        self.room.hosts.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MatchRoom {
    /// Rebuild a room from the persisted match.
    ///
    /// A match persisted as live resumes with its last question closed; answers
    /// given before the restart are not replayed but the stored scores are kept.
    pub fn restore(
        entity: &MatchEntity,
        questions: Vec<QuestionEntity>,
        transition_timeout: Option<Duration>,
    ) -> Self {
        let phase = match entity.status {
            MatchStatus::Waiting => MatchPhase::Waiting,
            MatchStatus::Live => {
                MatchPhase::Live(QuestionPhase::Closed(entity.current_question.unwrap_or(0)))
            }
            MatchStatus::Completed => MatchPhase::Completed,
        };

        Self {
            match_id: entity.id,
            competition_id: entity.competition_id,
            home_team_id: entity.home_team_id,
            away_team_id: entity.away_team_id,
            machine: RwLock::new(MatchStateMachine::resume(phase, questions.len())),
            board: Mutex::new(Board {
                home_score: entity.home_score,
                away_score: entity.away_score,
                answers: vec![HashMap::new(); questions.len()],
            }),
            questions,
            transition_gate: Mutex::new(()),
            transition_timeout,
            connections: DashMap::new(),
            hosts: AtomicUsize::new(0),
        }
    }

    /// Identifier of the match.
    pub fn match_id(&self) -> Uuid {
        self.match_id
    }

    /// Competition the match belongs to.
    pub fn competition_id(&self) -> Uuid {
        self.competition_id
    }

    /// Home team identifier.
    pub fn home_team_id(&self) -> Uuid {
        self.home_team_id
    }

    /// Away team identifier.
    pub fn away_team_id(&self) -> Uuid {
        self.away_team_id
    }

    /// Question at `index`.
    pub fn question(&self, index: usize) -> Option<&QuestionEntity> {
        self.questions.get(index)
    }

    /// Number of questions of the match.
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Current phase of the match.
    pub async fn phase(&self) -> MatchPhase {
        self.machine.read().await.phase()
    }

    /// Snapshot of the match state machine.
    pub async fn snapshot(&self) -> Snapshot {
        self.machine.read().await.snapshot()
    }

    /// Current `(home, away)` scores.
    pub async fn scores(&self) -> (u32, u32) {
        let board = self.board.lock().await;
        (board.home_score, board.away_score)
    }

    /// Number of players who answered the question at `index`.
    pub async fn answered_count(&self, index: usize) -> usize {
        let board = self.board.lock().await;
        board.answers.get(index).map_or(0, HashMap::len)
    }

    /// Right answers per team for the question at `index`.
    pub async fn correct_counts(&self, index: usize) -> CorrectCounts {
        let board = self.board.lock().await;
        let mut counts = CorrectCounts::default();
        for record in board.answers.get(index).into_iter().flat_map(HashMap::values) {
            match (record.side, record.correct) {
                (Side::Home, true) => counts.home += 1,
                (Side::Away, true) => counts.away += 1,
                _ => {}
            }
        }
        counts
    }

    /// Record a player's answer to the open question.
    ///
    /// The state machine read lock is held while the board is updated so that no
    /// transition can be planned between the phase check and the score update.
    pub async fn record_answer(
        &self,
        user_id: Uuid,
        role: Role,
        question_index: usize,
        choice: usize,
    ) -> Result<AcceptedAnswer, AnswerRejection> {
        let side = role.side().ok_or(AnswerRejection::Spectator)?;

        let machine = self.machine.read().await;
        if machine.snapshot().pending.is_some() {
            return Err(AnswerRejection::TransitionPending);
        }
        match machine.phase() {
            MatchPhase::Live(QuestionPhase::Open(open)) if open == question_index => {}
            MatchPhase::Live(QuestionPhase::Open(_)) => {
                return Err(AnswerRejection::WrongQuestion {
                    got: question_index,
                });
            }
            MatchPhase::Live(QuestionPhase::Closed(closed)) if closed == question_index => {
                return Err(AnswerRejection::QuestionClosed(question_index));
            }
            MatchPhase::Live(QuestionPhase::Closed(_)) => {
                return Err(AnswerRejection::WrongQuestion {
                    got: question_index,
                });
            }
            MatchPhase::Waiting | MatchPhase::Completed => return Err(AnswerRejection::NotLive),
        }

        let question = self
            .questions
            .get(question_index)
            .ok_or(AnswerRejection::WrongQuestion {
                got: question_index,
            })?;
        if choice >= question.choices.len() {
            return Err(AnswerRejection::ChoiceOutOfRange {
                choice,
                choices: question.choices.len(),
            });
        }

        let mut board = self.board.lock().await;
        let answers = board
            .answers
            .get_mut(question_index)
            .ok_or(AnswerRejection::WrongQuestion {
                got: question_index,
            })?;
        if answers.contains_key(&user_id) {
            return Err(AnswerRejection::AlreadyAnswered(question_index));
        }

        let correct = choice == question.correct_index;
        answers.insert(user_id, AnswerRecord { side, correct });
        let answered_count = answers.len();

        if correct {
            match side {
                Side::Home => board.home_score += question.points,
                Side::Away => board.away_score += question.points,
            }
        }
        drop(machine);

        debug!(
            match_id = %self.match_id,
            user_id = %user_id,
            question_index,
            correct,
            "answer recorded"
        );

        Ok(AcceptedAnswer {
            question_index,
            side,
            correct,
            answered_count,
            home_score: board.home_score,
            away_score: board.away_score,
        })
    }

    /// Copy the live progress into `entity` as it will be once `next` is reached.
    pub async fn write_progress(&self, next: MatchPhase, entity: &mut MatchEntity) {
        let (home, away) = self.scores().await;
        entity.status = next.status();
        if let Some(index) = next.question_index() {
            entity.current_question = Some(index);
        }
        entity.home_score = home;
        entity.away_score = away;
    }

    /// Plan `event`, run `work` with the plan, then apply it, aborting the plan when
    /// `work` fails or exceeds the transition timeout.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: MatchEvent,
        work: F,
    ) -> Result<(T, MatchPhase), ServiceError>
    where
        F: FnOnce(Plan) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let plan = self.plan_transition(event).await?;
        let plan_id = plan.id;

        let work_future = work(plan);
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            match_id = %self.match_id,
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        match_id = %self.match_id,
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }

    async fn plan_transition(&self, event: MatchEvent) -> Result<Plan, PlanError> {
        self.machine.write().await.plan(event)
    }

    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<MatchPhase, ApplyError> {
        self.machine.write().await.apply(plan_id)
    }

    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        self.machine.write().await.abort(plan_id)
    }

    /// Register a socket and return its connection id.
    pub fn join(&self, user_id: Uuid, role: Role, tx: mpsc::UnboundedSender<Message>) -> Uuid {
        let connection_id = Uuid::new_v4();
        self.connections
            .insert(connection_id, RoomConnection { user_id, role, tx });
        connection_id
    }

    /// Remove a socket. Returns whether it was still registered.
    pub fn leave(&self, connection_id: Uuid) -> bool {
        self.connections.remove(&connection_id).is_some()
    }

    /// Number of sockets currently in the room.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send `message` to one socket, dropping it from the room when its writer is gone.
    pub fn send_to(&self, connection_id: Uuid, message: Message) -> bool {
        let Some(tx) = self
            .connections
            .get(&connection_id)
            .map(|connection| connection.tx.clone())
        else {
            return false;
        };

        if tx.send(message).is_err() {
            self.connections.remove(&connection_id);
            return false;
        }
        true
    }

    /// Fan `message` out to every socket. Sockets whose writer is gone are removed.
    /// Returns the number of sockets reached.
    pub fn broadcast(&self, message: Message) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in self.connections.iter() {
            if entry.value().tx.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }

        for connection_id in closed {
            warn!(
                match_id = %self.match_id,
                connection_id = %connection_id,
                "dropping match socket with closed writer"
            );
            self.connections.remove(&connection_id);
        }
        delivered
    }

    /// Whether the room can be dropped: nobody connected, no host action leased or
    /// running, no pending plan and the match not live.
    pub fn is_idle(&self) -> bool {
        if !self.connections.is_empty() || self.hosts.load(Ordering::SeqCst) > 0 {
            return false;
        }
        if self.transition_gate.try_lock().is_err() {
            return false;
        }
        self.machine
            .try_read()
            .map(|machine| {
                let snapshot = machine.snapshot();
                snapshot.pending.is_none() && !matches!(snapshot.phase, MatchPhase::Live(_))
            })
            .unwrap_or(false)
    }
}
