use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::{format_system_time, question::PublicQuestion},
    state::practice::PracticeSession,
};

/// Progress of a practice session, with its questions (answers hidden).
#[derive(Debug, Serialize, ToSchema)]
pub struct PracticeSessionView {
    pub id: Uuid,
    pub questions: Vec<PublicQuestion>,
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub finished: bool,
    /// Practice tokens left on the account after the session was opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_left: Option<u32>,
    pub started_at: String,
}

impl From<&PracticeSession> for PracticeSessionView {
    fn from(value: &PracticeSession) -> Self {
        Self {
            id: value.id,
            questions: value
                .questions
                .iter()
                .enumerate()
                .map(|(index, question)| PublicQuestion::new(index, question))
                .collect(),
            total: value.questions.len(),
            answered: value.answered(),
            correct: value.correct(),
            finished: value.is_finished(),
            tokens_left: None,
            started_at: format_system_time(value.started_at),
        }
    }
}

/// Answer to one practice question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PracticeAnswerRequest {
    pub question_index: usize,
    pub choice: usize,
}

/// Correction of a practice answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct PracticeAnswerResponse {
    pub question_index: usize,
    pub correct: bool,
    pub correct_index: usize,
    pub answered: usize,
    pub total: usize,
}
