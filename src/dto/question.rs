use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::QuestionEntity,
    dto::{
        format_system_time,
        validation::{validate_choices, validate_not_blank},
    },
};

/// Payload used by administrators to add a question to the bank.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 500), custom(function = "validate_not_blank"))]
    pub prompt: String,
    /// Between 2 and 6 non-blank choices.
    #[validate(length(min = 2, max = 6), custom(function = "validate_choices"))]
    pub choices: Vec<String>,
    /// Index of the right answer inside `choices`.
    pub correct_index: usize,
    /// Points credited per correct answer, 1 to 100.
    #[validate(range(min = 1, max = 100))]
    pub points: u32,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub category: Option<String>,
}

/// Administrator view of a question, answer included.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionDetail {
    pub id: Uuid,
    pub prompt: String,
    pub choices: Vec<String>,
    pub correct_index: usize,
    pub points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub created_at: String,
}

impl From<QuestionEntity> for QuestionDetail {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            prompt: value.prompt,
            choices: value.choices,
            correct_index: value.correct_index,
            points: value.points,
            category: value.category,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Player view of a question: never carries the answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicQuestion {
    /// Position of the question in the match or practice run.
    pub index: usize,
    pub prompt: String,
    pub choices: Vec<String>,
    pub points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl PublicQuestion {
    /// Project `question` shown at position `index`.
    pub fn new(index: usize, question: &QuestionEntity) -> Self {
        Self {
            index,
            prompt: question.prompt.clone(),
            choices: question.choices.clone(),
            points: question.points,
            category: question.category.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(choices: &[&str], points: u32) -> CreateQuestionRequest {
        CreateQuestionRequest {
            prompt: "Largest planet?".into(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
            correct_index: 0,
            points,
            category: None,
        }
    }

    #[test]
    fn choice_count_and_points_are_bounded() {
        assert!(request(&["Jupiter", "Mars"], 10).validate().is_ok());
        assert!(request(&["Jupiter"], 10).validate().is_err());
        assert!(
            request(&["a", "b", "c", "d", "e", "f", "g"], 10)
                .validate()
                .is_err()
        );
        assert!(request(&["Jupiter", "Mars"], 0).validate().is_err());
        assert!(request(&["Jupiter", "Mars"], 101).validate().is_err());
        assert!(request(&["Jupiter", "  "], 10).validate().is_err());
    }

    #[test]
    fn public_projection_hides_the_answer() {
        let entity = QuestionEntity {
            id: Uuid::new_v4(),
            prompt: "Largest planet?".into(),
            choices: vec!["Jupiter".into(), "Mars".into()],
            correct_index: 0,
            points: 5,
            category: Some("Space".into()),
            created_at: std::time::SystemTime::now(),
        };
        let json = serde_json::to_value(PublicQuestion::new(3, &entity)).unwrap();
        assert_eq!(json["index"], 3);
        assert!(json.get("correct_index").is_none());
    }
}
