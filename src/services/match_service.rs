//! Scheduling and hosting matches.

use std::{collections::HashSet, time::SystemTime};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{MatchEntity, MatchStatus},
    dto::{
        matches::{MatchListQuery, MatchSummary, ScheduleMatchRequest},
        parse_timestamp,
        sse::MatchCompletedEvent,
    },
    error::ServiceError,
    services::{competition_service::load_competition, live_service, sse_events, standings},
    state::{
        SharedState,
        match_machine::{MatchEvent, MatchPhase, Plan, QuestionPhase},
        room::MatchRoom,
        transitions::run_match_transition,
    },
};

/// Create a waiting match between two teams registered in the competition.
pub async fn schedule_match(
    state: &SharedState,
    payload: ScheduleMatchRequest,
) -> Result<MatchSummary, ServiceError> {
    let store = state.require_store().await?;
    let competition = load_competition(&store, payload.competition_id).await?;

    if payload.home_team_id == payload.away_team_id {
        return Err(ServiceError::InvalidInput(
            "a team cannot play against itself".into(),
        ));
    }
    for team_id in [payload.home_team_id, payload.away_team_id] {
        if !competition.team_ids.contains(&team_id) {
            return Err(ServiceError::InvalidInput(format!(
                "team `{team_id}` is not registered in competition `{}`",
                competition.id
            )));
        }
    }

    let mut seen = HashSet::new();
    for question_id in &payload.question_ids {
        if !seen.insert(*question_id) {
            return Err(ServiceError::InvalidInput(format!(
                "question `{question_id}` is listed twice"
            )));
        }
        if store.find_question(*question_id).await?.is_none() {
            return Err(ServiceError::InvalidInput(format!(
                "question `{question_id}` does not exist"
            )));
        }
    }

    let scheduled_at = payload
        .scheduled_at
        .as_deref()
        .map(|raw| {
            parse_timestamp(raw).ok_or_else(|| {
                ServiceError::InvalidInput(format!("`{raw}` is not an RFC 3339 timestamp"))
            })
        })
        .transpose()?;

    let now = SystemTime::now();
    let entity = MatchEntity {
        id: Uuid::new_v4(),
        competition_id: competition.id,
        home_team_id: payload.home_team_id,
        away_team_id: payload.away_team_id,
        question_ids: payload.question_ids,
        status: MatchStatus::Waiting,
        current_question: None,
        home_score: 0,
        away_score: 0,
        scheduled_at,
        started_at: None,
        completed_at: None,
        updated_at: now,
    };
    store.save_match(entity.clone()).await?;

    info!(
        match_id = %entity.id,
        competition_id = %entity.competition_id,
        questions = entity.question_ids.len(),
        "match scheduled"
    );
    let summary = MatchSummary::from(entity);
    sse_events::broadcast_match_scheduled(state, summary.clone());
    Ok(summary)
}

/// Overlay the in-memory scores of a live match on its persisted view.
async fn with_live_scores(state: &SharedState, entity: MatchEntity) -> MatchSummary {
    let mut summary = MatchSummary::from(entity);
    if summary.status != MatchStatus::Live {
        return summary;
    }
    if let Some(room) = state.loaded_room(summary.id) {
        let (home, away) = room.scores().await;
        summary.home_score = home;
        summary.away_score = away;
    }
    summary
}

/// Matches, optionally restricted to one competition.
pub async fn list_matches(
    state: &SharedState,
    query: MatchListQuery,
) -> Result<Vec<MatchSummary>, ServiceError> {
    let store = state.require_store().await?;
    let entities = store.list_matches(query.competition_id).await?;

    let mut summaries = Vec::with_capacity(entities.len());
    for entity in entities {
        summaries.push(with_live_scores(state, entity).await);
    }
    Ok(summaries)
}

/// One match, live scores included.
pub async fn get_match(state: &SharedState, match_id: Uuid) -> Result<MatchSummary, ServiceError> {
    let store = state.require_store().await?;
    let entity = store
        .find_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))?;
    Ok(with_live_scores(state, entity).await)
}

/// Persist the match as it will be once `plan` is applied.
async fn persist_progress(
    state: &SharedState,
    room: &MatchRoom,
    plan: Plan,
    stamp: impl FnOnce(&mut MatchEntity),
) -> Result<MatchEntity, ServiceError> {
    let store = state.require_store().await?;
    let match_id = room.match_id();
    let mut entity = store
        .find_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))?;

    room.write_progress(plan.to, &mut entity).await;
    entity.updated_at = SystemTime::now();
    stamp(&mut entity);
    store.save_match(entity.clone()).await?;
    Ok(entity)
}

/// Start a waiting match and open its first question.
pub async fn start_match(state: &SharedState, match_id: Uuid) -> Result<MatchSummary, ServiceError> {
    let room = state.hosted_room(match_id).await?;
    let store = state.require_store().await?;

    // Held until the match is persisted as live so concurrent starts see it.
    let live = state.live_gate().lock().await;

    let busy = store.list_matches(None).await?.into_iter().find(|game| {
        game.id != match_id
            && game.status == MatchStatus::Live
            && (game.involves(room.home_team_id()) || game.involves(room.away_team_id()))
    });
    if let Some(game) = busy {
        return Err(ServiceError::Conflict(format!(
            "a team of this match is already playing match `{}`",
            game.id
        )));
    }

    let entity = run_match_transition(state, &room, MatchEvent::Start, |plan| {
        persist_progress(state, &room, plan, |entity| {
            entity.started_at = Some(SystemTime::now());
        })
    })
    .await?;
    drop(live);

    info!(match_id = %match_id, "match started");
    live_service::broadcast_question_opened(&room, 0);
    Ok(entity.into())
}

/// Close the open question and reveal its answer.
pub async fn close_question(
    state: &SharedState,
    match_id: Uuid,
) -> Result<MatchSummary, ServiceError> {
    let room = state.hosted_room(match_id).await?;
    let entity = run_match_transition(state, &room, MatchEvent::CloseQuestion, |plan| {
        persist_progress(state, &room, plan, |_| {})
    })
    .await?;

    if let Some(index) = entity.current_question {
        info!(match_id = %match_id, question_index = index, "question closed");
        live_service::broadcast_question_closed(&room, index).await;
    }
    Ok(entity.into())
}

/// Move on: close the open question if needed, then open the next one or finish
/// the match after the last question.
pub async fn next_question(
    state: &SharedState,
    match_id: Uuid,
) -> Result<MatchSummary, ServiceError> {
    let room = state.hosted_room(match_id).await?;

    let closed = match room.phase().await {
        MatchPhase::Live(QuestionPhase::Open(_)) => {
            close_question(state, match_id).await?;
            match room.phase().await {
                MatchPhase::Live(phase) => phase.index(),
                _ => return Err(ServiceError::InvalidState("match is not live".into())),
            }
        }
        MatchPhase::Live(QuestionPhase::Closed(index)) => index,
        MatchPhase::Waiting | MatchPhase::Completed => {
            return Err(ServiceError::InvalidState(format!(
                "match `{match_id}` is not live"
            )));
        }
    };

    let next = closed + 1;
    if next >= room.question_count() {
        drop(room);
        return complete_match(state, match_id).await;
    }

    let entity = run_match_transition(state, &room, MatchEvent::OpenQuestion(next), |plan| {
        persist_progress(state, &room, plan, |_| {})
    })
    .await?;

    info!(match_id = %match_id, question_index = next, "question opened");
    live_service::broadcast_question_opened(&room, next);
    Ok(entity.into())
}

/// Finish a live match, publish the final score and refresh the competition table.
pub async fn complete_match(
    state: &SharedState,
    match_id: Uuid,
) -> Result<MatchSummary, ServiceError> {
    let room = state.hosted_room(match_id).await?;
    let entity = run_match_transition(state, &room, MatchEvent::Finish, |plan| {
        persist_progress(state, &room, plan, |entity| {
            entity.completed_at = Some(SystemTime::now());
        })
    })
    .await?;

    let (home, away) = (entity.home_score, entity.away_score);
    info!(match_id = %match_id, home, away, "match completed");

    live_service::broadcast_match_completed(&room, home, away);
    sse_events::broadcast_match_completed(
        state,
        MatchCompletedEvent {
            match_id,
            competition_id: entity.competition_id,
            home_team_id: entity.home_team_id,
            away_team_id: entity.away_team_id,
            home_score: home,
            away_score: away,
            winner: live_service::winner(home, away),
        },
    );

    if let Err(err) = standings::recompute_standings(state, entity.competition_id).await {
        warn!(
            competition_id = %entity.competition_id,
            error = %err,
            "failed to refresh standings after match completion"
        );
    }
    drop(room);
    state.release_room(match_id);

    Ok(entity.into())
}
