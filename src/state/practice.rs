use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::{dao::models::QuestionEntity, error::ServiceError};

/// A solo practice run bought with one practice token.
#[derive(Debug, Clone)]
pub struct PracticeSession {
    /// Session identifier handed to the client.
    pub id: Uuid,
    /// Owner of the session.
    pub user_id: Uuid,
    /// Drawn questions, in play order.
    pub questions: Vec<QuestionEntity>,
    /// Chosen index per question once answered.
    pub answers: Vec<Option<usize>>,
    /// When the token was spent.
    pub started_at: SystemTime,
}

impl PracticeSession {
    /// Open a session over `questions`.
    pub fn new(user_id: Uuid, questions: Vec<QuestionEntity>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            answers: vec![None; questions.len()],
            questions,
            started_at: SystemTime::now(),
        }
    }

    /// Answer question `index` with `choice`, returning the question so the caller can reveal it.
    pub fn answer(&mut self, index: usize, choice: usize) -> Result<&QuestionEntity, ServiceError> {
        let question = self.questions.get(index).ok_or_else(|| {
            ServiceError::InvalidInput(format!("practice question {index} does not exist"))
        })?;
        if choice >= question.choices.len() {
            return Err(ServiceError::InvalidInput(format!(
                "choice {choice} is out of range ({} choices)",
                question.choices.len()
            )));
        }

        let slot = &mut self.answers[index];
        if slot.is_some() {
            return Err(ServiceError::Conflict(format!(
                "practice question {index} was already answered"
            )));
        }
        *slot = Some(choice);
        Ok(question)
    }

    /// Number of answered questions.
    pub fn answered(&self) -> usize {
        self.answers.iter().flatten().count()
    }

    /// Number of right answers.
    pub fn correct(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.answers)
            .filter(|(question, answer)| **answer == Some(question.correct_index))
            .count()
    }

    /// Whether every question has been answered.
    pub fn is_finished(&self) -> bool {
        self.answered() == self.questions.len()
    }

    /// Whether the session is at least `ttl` old at `now`.
    pub fn is_expired(&self, now: SystemTime, ttl: Duration) -> bool {
        now.duration_since(self.started_at)
            .is_ok_and(|age| age >= ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::room::tests::question;

    #[test]
    fn each_question_is_answered_once() {
        let mut session = PracticeSession::new(Uuid::new_v4(), vec![question(1, 5), question(0, 5)]);

        assert_eq!(session.answer(0, 1).unwrap().correct_index, 1);
        assert!(matches!(
            session.answer(0, 2),
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            session.answer(1, 9),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            session.answer(2, 0),
            Err(ServiceError::InvalidInput(_))
        ));

        session.answer(1, 2).unwrap();
        assert_eq!(session.answered(), 2);
        assert_eq!(session.correct(), 1);
        assert!(session.is_finished());
    }

    #[test]
    fn sessions_expire_after_their_ttl() {
        let session = PracticeSession::new(Uuid::new_v4(), vec![question(0, 1)]);
        let ttl = Duration::from_secs(60);

        assert!(!session.is_expired(session.started_at, ttl));
        assert!(session.is_expired(session.started_at + ttl, ttl));
        assert!(!session.is_expired(session.started_at - ttl, ttl));
    }
}
