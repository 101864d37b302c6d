use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        competition::StandingSummary,
        matches::MatchSummary,
        sse::{
            MatchCompletedEvent, MatchScheduledEvent, MatchStatusEvent, ServerEvent,
            StandingsUpdatedEvent, SystemStatus,
        },
    },
    state::{SharedState, SseHub, match_machine::MatchPhase},
};

const EVENT_MATCH_SCHEDULED: &str = "match.scheduled";
const EVENT_MATCH_STATUS: &str = "match.status";
const EVENT_MATCH_COMPLETED: &str = "match.completed";
const EVENT_STANDINGS_UPDATED: &str = "standings.updated";
const EVENT_SYSTEM_DEGRADED: &str = "system.degraded";

/// Broadcast that the backend entered or left degraded mode.
pub fn broadcast_system_status(hub: &SseHub, degraded: bool) {
    send_event(hub, EVENT_SYSTEM_DEGRADED, &SystemStatus { degraded });
}

/// Broadcast a freshly scheduled match.
pub fn broadcast_match_scheduled(state: &SharedState, summary: MatchSummary) {
    send_public_event(state, EVENT_MATCH_SCHEDULED, &MatchScheduledEvent(summary));
}

/// Broadcast a match phase change.
pub fn broadcast_match_status(state: &SharedState, match_id: Uuid, phase: MatchPhase) {
    let payload = MatchStatusEvent {
        match_id,
        status: phase.status(),
        current_question: phase.question_index(),
        question_open: phase.open_question().is_some(),
    };
    send_public_event(state, EVENT_MATCH_STATUS, &payload);
}

/// Broadcast the final score of a match.
pub fn broadcast_match_completed(state: &SharedState, event: MatchCompletedEvent) {
    send_public_event(state, EVENT_MATCH_COMPLETED, &event);
}

/// Broadcast a recomputed competition table.
pub fn broadcast_standings_updated(
    state: &SharedState,
    competition_id: Uuid,
    standings: Vec<StandingSummary>,
) {
    let payload = StandingsUpdatedEvent {
        competition_id,
        standings,
    };
    send_public_event(state, EVENT_STANDINGS_UPDATED, &payload);
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    send_event(state.public_sse(), event, payload);
}

fn send_event(hub: &SseHub, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState, state::match_machine::QuestionPhase};

    #[tokio::test]
    async fn match_status_event_describes_the_phase() {
        let state = AppState::new(AppConfig::default());
        let mut rx = state.public_sse().subscribe();
        let match_id = Uuid::new_v4();

        broadcast_match_status(
            &state,
            match_id,
            MatchPhase::Live(QuestionPhase::Open(2)),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_MATCH_STATUS));
        let data: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(data["status"], "live");
        assert_eq!(data["current_question"], 2);
        assert_eq!(data["question_open"], true);
    }

    #[tokio::test]
    async fn leaving_degraded_mode_is_announced_once() {
        let state = AppState::new(AppConfig::default());
        let mut rx = state.public_sse().subscribe();

        state
            .install_store(std::sync::Arc::new(crate::dao::arena_store::MemoryStore::new()))
            .await;
        state.update_degraded(false).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_SYSTEM_DEGRADED));
        assert_eq!(event.data, r#"{"degraded":false}"#);
        assert!(rx.try_recv().is_err());
    }
}
