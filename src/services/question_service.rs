use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::QuestionEntity,
    dto::question::{CreateQuestionRequest, QuestionDetail},
    error::ServiceError,
    state::SharedState,
};

/// Add a question to the shared bank.
pub async fn create_question(
    state: &SharedState,
    payload: CreateQuestionRequest,
) -> Result<QuestionDetail, ServiceError> {
    if payload.correct_index >= payload.choices.len() {
        return Err(ServiceError::InvalidInput(format!(
            "correct_index {} is out of range ({} choices)",
            payload.correct_index,
            payload.choices.len()
        )));
    }

    let store = state.require_store().await?;
    let question = QuestionEntity {
        id: Uuid::new_v4(),
        prompt: payload.prompt.trim().to_string(),
        choices: payload
            .choices
            .iter()
            .map(|choice| choice.trim().to_string())
            .collect(),
        correct_index: payload.correct_index,
        points: payload.points,
        category: payload
            .category
            .map(|category| category.trim().to_string())
            .filter(|category| !category.is_empty()),
        created_at: SystemTime::now(),
    };
    store.save_question(question.clone()).await?;

    info!(question_id = %question.id, points = question.points, "question created");
    Ok(question.into())
}

/// Every question of the bank, answers included.
pub async fn list_questions(state: &SharedState) -> Result<Vec<QuestionDetail>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store
        .list_questions()
        .await?
        .into_iter()
        .map(QuestionDetail::from)
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::auth_service::tests::memory_state;

    pub(crate) async fn question(state: &SharedState, correct_index: usize, points: u32) -> Uuid {
        create_question(
            state,
            CreateQuestionRequest {
                prompt: "Which planet is largest?".into(),
                choices: vec!["Jupiter".into(), "Mars".into(), "Venus".into()],
                correct_index,
                points,
                category: Some("Space".into()),
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn correct_index_must_point_at_a_choice() {
        let state = memory_state();
        let err = create_question(
            &state,
            CreateQuestionRequest {
                prompt: "?".into(),
                choices: vec!["a".into(), "b".into()],
                correct_index: 2,
                points: 1,
                category: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn blank_category_is_dropped() {
        let state = memory_state();
        let created = create_question(
            &state,
            CreateQuestionRequest {
                prompt: "  Who painted the Mona Lisa? ".into(),
                choices: vec!["Leonardo".into(), "Raphael".into()],
                correct_index: 0,
                points: 5,
                category: Some("  ".into()),
            },
        )
        .await
        .unwrap();

        assert_eq!(created.prompt, "Who painted the Mona Lisa?");
        assert_eq!(created.category, None);
        assert_eq!(list_questions(&state).await.unwrap().len(), 1);
    }
}
