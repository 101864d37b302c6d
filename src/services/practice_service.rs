//! Solo practice sessions paid with practice tokens.

use rand::seq::SliceRandom;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::practice::{PracticeAnswerRequest, PracticeAnswerResponse, PracticeSessionView},
    error::ServiceError,
    services::auth_service::AuthUser,
    state::{SharedState, practice::PracticeSession},
};

fn session_not_found(session_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("practice session `{session_id}` not found"))
}

/// Spend one practice token and draw a random set of questions.
pub async fn start_practice(
    state: &SharedState,
    user: &AuthUser,
) -> Result<PracticeSessionView, ServiceError> {
    let store = state.require_store().await?;

    let mut questions = store.list_questions().await?;
    if questions.is_empty() {
        return Err(ServiceError::InvalidState(
            "the question bank is empty".into(),
        ));
    }

    let tokens_left = {
        let _gate = state.account_gate().lock().await;
        let mut account = store
            .find_user(user.id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user `{}` not found", user.id)))?;
        if account.practice_tokens == 0 {
            return Err(ServiceError::InvalidState("no practice tokens left".into()));
        }
        account.practice_tokens -= 1;
        let tokens_left = account.practice_tokens;
        store.save_user(account).await?;
        tokens_left
    };

    questions.shuffle(&mut rand::rng());
    questions.truncate(state.config().practice_questions());

    let session = PracticeSession::new(user.id, questions);
    let mut view = PracticeSessionView::from(&session);
    view.tokens_left = Some(tokens_left);

    info!(
        session_id = %session.id,
        user_id = %user.id,
        questions = session.questions.len(),
        tokens_left,
        "practice session started"
    );
    let pruned = state.prune_practice_sessions(user.id, state.config().practice_ttl());
    if pruned > 0 {
        debug!(user_id = %user.id, pruned, "practice sessions pruned");
    }
    state.practice_sessions().insert(session.id, session);
    Ok(view)
}

/// Answer one question of the caller's practice session.
pub fn answer_practice(
    state: &SharedState,
    user: &AuthUser,
    session_id: Uuid,
    payload: PracticeAnswerRequest,
) -> Result<PracticeAnswerResponse, ServiceError> {
    let mut session = state
        .practice_sessions()
        .get_mut(&session_id)
        .filter(|session| session.user_id == user.id)
        .ok_or_else(|| session_not_found(session_id))?;

    let correct_index = session
        .answer(payload.question_index, payload.choice)?
        .correct_index;

    Ok(PracticeAnswerResponse {
        question_index: payload.question_index,
        correct: payload.choice == correct_index,
        correct_index,
        answered: session.answered(),
        total: session.questions.len(),
    })
}

/// Progress of the caller's practice session.
pub fn get_practice(
    state: &SharedState,
    user: &AuthUser,
    session_id: Uuid,
) -> Result<PracticeSessionView, ServiceError> {
    state
        .practice_sessions()
        .get(&session_id)
        .filter(|session| session.user_id == user.id)
        .map(|session| PracticeSessionView::from(session.value()))
        .ok_or_else(|| session_not_found(session_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        auth_service::{self, tests::{memory_state, signed_in}},
        payment_service::tests::buy_starter_pack,
        question_service::tests::question,
    };

    #[tokio::test]
    async fn practice_costs_one_token() {
        let state = memory_state();
        let alice = signed_in(&state, "alice").await;
        question(&state, 0, 1).await;

        assert!(matches!(
            start_practice(&state, &alice).await,
            Err(ServiceError::InvalidState(_))
        ));

        buy_starter_pack(&state, &alice).await;
        let view = start_practice(&state, &alice).await.unwrap();
        assert_eq!(view.tokens_left, Some(4));
        assert_eq!(view.total, 1);
        assert!(!view.finished);
        assert_eq!(auth_service::me(&state, &alice).await.unwrap().practice_tokens, 4);
    }

    #[tokio::test]
    async fn empty_bank_keeps_the_token() {
        let state = memory_state();
        let alice = signed_in(&state, "alice").await;
        buy_starter_pack(&state, &alice).await;

        assert!(matches!(
            start_practice(&state, &alice).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert_eq!(auth_service::me(&state, &alice).await.unwrap().practice_tokens, 5);
    }

    #[tokio::test]
    async fn sessions_are_private_and_answered_once() {
        let state = memory_state();
        let alice = signed_in(&state, "alice").await;
        let bob = signed_in(&state, "bob").await;
        for _ in 0..12 {
            question(&state, 2, 1).await;
        }
        buy_starter_pack(&state, &alice).await;

        let view = start_practice(&state, &alice).await.unwrap();
        assert_eq!(view.total, 10);

        assert!(matches!(
            get_practice(&state, &bob, view.id),
            Err(ServiceError::NotFound(_))
        ));

        let answer = |choice| PracticeAnswerRequest {
            question_index: 0,
            choice,
        };
        let result = answer_practice(&state, &alice, view.id, answer(2)).unwrap();
        assert!(result.correct);
        assert_eq!(result.correct_index, 2);
        assert_eq!((result.answered, result.total), (1, 10));
        assert!(matches!(
            answer_practice(&state, &alice, view.id, answer(1)),
            Err(ServiceError::Conflict(_))
        ));

        let progress = get_practice(&state, &alice, view.id).unwrap();
        assert_eq!((progress.answered, progress.correct), (1, 1));
    }

    #[tokio::test]
    async fn finished_sessions_are_dropped_on_the_next_start() {
        let state = memory_state();
        let alice = signed_in(&state, "alice").await;
        let bob = signed_in(&state, "bob").await;
        question(&state, 0, 1).await;
        buy_starter_pack(&state, &alice).await;
        buy_starter_pack(&state, &bob).await;

        let first = start_practice(&state, &alice).await.unwrap();
        let answer = PracticeAnswerRequest {
            question_index: 0,
            choice: 0,
        };
        answer_practice(&state, &alice, first.id, answer).unwrap();
        assert!(get_practice(&state, &alice, first.id).unwrap().finished);

        // another player's start leaves alice's finished run alone
        start_practice(&state, &bob).await.unwrap();
        assert!(get_practice(&state, &alice, first.id).is_ok());

        let second = start_practice(&state, &alice).await.unwrap();
        assert!(matches!(
            get_practice(&state, &alice, first.id),
            Err(ServiceError::NotFound(_))
        ));
        assert!(get_practice(&state, &alice, second.id).is_ok());
        assert_eq!(state.practice_sessions().len(), 2);
    }

    #[tokio::test]
    async fn expired_sessions_are_swept() {
        let config =
            crate::config::AppConfig::from_json(r#"{ "practice": { "session_ttl_secs": 0 } }"#)
                .unwrap();
        let state = crate::state::AppState::with_store(
            config,
            std::sync::Arc::new(crate::dao::arena_store::MemoryStore::new()),
        );
        let alice = signed_in(&state, "alice").await;
        question(&state, 0, 1).await;
        buy_starter_pack(&state, &alice).await;

        let abandoned = start_practice(&state, &alice).await.unwrap();
        let fresh = start_practice(&state, &alice).await.unwrap();

        assert!(matches!(
            get_practice(&state, &alice, abandoned.id),
            Err(ServiceError::NotFound(_))
        ));
        assert!(get_practice(&state, &alice, fresh.id).is_ok());
        assert_eq!(state.practice_sessions().len(), 1);
    }
}
