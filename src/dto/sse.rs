use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::MatchStatus,
    dto::{competition::StandingSummary, matches::MatchSummary},
    state::room::Side,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from an already encoded payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
/// Broadcast when a match is scheduled.
pub struct MatchScheduledEvent(pub MatchSummary);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever a match changes phase.
pub struct MatchStatusEvent {
    pub match_id: Uuid,
    pub status: MatchStatus,
    pub current_question: Option<usize>,
    pub question_open: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when final scores are known.
pub struct MatchCompletedEvent {
    pub match_id: Uuid,
    pub competition_id: Uuid,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    pub home_score: u32,
    pub away_score: u32,
    /// `None` on a draw.
    pub winner: Option<Side>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after a competition table was recomputed.
pub struct StandingsUpdatedEvent {
    pub competition_id: Uuid,
    pub standings: Vec<StandingSummary>,
}
