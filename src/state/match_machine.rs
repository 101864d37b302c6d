use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::MatchStatus;

/// Lifecycle phases of a single match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Scheduled; players may connect but no question is shown.
    Waiting,
    /// Questions are being played.
    Live(QuestionPhase),
    /// Final scores are frozen.
    Completed,
}

/// Progress of the question currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionPhase {
    /// Answers are accepted for the question at this index.
    Open(usize),
    /// The question at this index has been closed and its answer revealed.
    Closed(usize),
}

impl QuestionPhase {
    /// Index of the question this phase refers to.
    pub fn index(&self) -> usize {
        match self {
            QuestionPhase::Open(index) | QuestionPhase::Closed(index) => *index,
        }
    }
}

impl MatchPhase {
    /// Persisted status corresponding to this phase.
    pub fn status(&self) -> MatchStatus {
        match self {
            MatchPhase::Waiting => MatchStatus::Waiting,
            MatchPhase::Live(_) => MatchStatus::Live,
            MatchPhase::Completed => MatchStatus::Completed,
        }
    }

    /// Index of the question currently on screen, if any.
    pub fn question_index(&self) -> Option<usize> {
        match self {
            MatchPhase::Live(question) => Some(question.index()),
            _ => None,
        }
    }

    /// Index of the question currently accepting answers, if any.
    pub fn open_question(&self) -> Option<usize> {
        match self {
            MatchPhase::Live(QuestionPhase::Open(index)) => Some(*index),
            _ => None,
        }
    }
}

/// Events that can be applied to the match state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// Host starts the match; the first question opens.
    Start,
    /// Stop accepting answers for the open question.
    CloseQuestion,
    /// Open the question at the given index after the previous one closed.
    OpenQuestion(usize),
    /// Freeze the scores.
    Finish,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: MatchPhase,
    /// The event that cannot be applied from this phase.
    pub event: MatchEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: MatchPhase,
        /// Current phase.
        actual: MatchPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: MatchPhase,
    /// Phase the state machine will transition to.
    pub to: MatchPhase,
    /// Event that triggered this transition.
    pub event: MatchEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: MatchPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<MatchPhase>,
}

/// Per-match state machine driving question progression.
#[derive(Debug, Clone)]
pub struct MatchStateMachine {
    phase: MatchPhase,
    question_count: usize,
    version: usize,
    pending: Option<Plan>,
}

impl MatchStateMachine {
    /// Create a waiting state machine for a match with `question_count` questions.
    pub fn new(question_count: usize) -> Self {
        Self::resume(MatchPhase::Waiting, question_count)
    }

    /// Recreate a state machine at an arbitrary phase (used when a room is rebuilt from storage).
    pub fn resume(phase: MatchPhase, question_count: usize) -> Self {
        Self {
            phase,
            question_count,
            version: 0,
            pending: None,
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Number of questions in the match.
    pub fn question_count(&self) -> usize {
        self.question_count
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: MatchEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<MatchPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, returning the state machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: MatchEvent) -> Result<MatchPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (MatchPhase::Waiting, MatchEvent::Start) if self.question_count > 0 => {
                MatchPhase::Live(QuestionPhase::Open(0))
            }
            (MatchPhase::Live(QuestionPhase::Open(index)), MatchEvent::CloseQuestion) => {
                MatchPhase::Live(QuestionPhase::Closed(index))
            }
            (MatchPhase::Live(QuestionPhase::Closed(index)), MatchEvent::OpenQuestion(next))
                if next == index + 1 && next < self.question_count =>
            {
                MatchPhase::Live(QuestionPhase::Open(next))
            }
            (MatchPhase::Live(_), MatchEvent::Finish) => MatchPhase::Completed,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut MatchStateMachine, event: MatchEvent) -> MatchPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_waiting() {
        let sm = MatchStateMachine::new(3);
        assert_eq!(sm.phase(), MatchPhase::Waiting);
        assert_eq!(sm.phase().status(), MatchStatus::Waiting);
    }

    #[test]
    fn full_match_walks_every_question() {
        let mut sm = MatchStateMachine::new(2);

        assert_eq!(
            apply(&mut sm, MatchEvent::Start),
            MatchPhase::Live(QuestionPhase::Open(0))
        );
        assert_eq!(
            apply(&mut sm, MatchEvent::CloseQuestion),
            MatchPhase::Live(QuestionPhase::Closed(0))
        );
        assert_eq!(
            apply(&mut sm, MatchEvent::OpenQuestion(1)),
            MatchPhase::Live(QuestionPhase::Open(1))
        );
        assert_eq!(
            apply(&mut sm, MatchEvent::CloseQuestion),
            MatchPhase::Live(QuestionPhase::Closed(1))
        );
        assert_eq!(apply(&mut sm, MatchEvent::Finish), MatchPhase::Completed);
        assert_eq!(sm.snapshot().version, 5);
    }

    #[test]
    fn questions_cannot_be_skipped_or_overrun() {
        let mut sm = MatchStateMachine::new(2);
        apply(&mut sm, MatchEvent::Start);
        apply(&mut sm, MatchEvent::CloseQuestion);

        let err = sm.plan(MatchEvent::OpenQuestion(2)).unwrap_err();
        assert!(matches!(err, PlanError::InvalidTransition(_)));

        apply(&mut sm, MatchEvent::OpenQuestion(1));
        apply(&mut sm, MatchEvent::CloseQuestion);
        let err = sm.plan(MatchEvent::OpenQuestion(2)).unwrap_err();
        match err {
            PlanError::InvalidTransition(InvalidTransition { from, event }) => {
                assert_eq!(from, MatchPhase::Live(QuestionPhase::Closed(1)));
                assert_eq!(event, MatchEvent::OpenQuestion(2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn open_question_requires_previous_close() {
        let mut sm = MatchStateMachine::new(3);
        apply(&mut sm, MatchEvent::Start);
        assert!(sm.plan(MatchEvent::OpenQuestion(1)).is_err());
    }

    #[test]
    fn match_without_questions_cannot_start() {
        let mut sm = MatchStateMachine::new(0);
        assert!(matches!(
            sm.plan(MatchEvent::Start),
            Err(PlanError::InvalidTransition(_))
        ));
    }

    #[test]
    fn finish_is_allowed_from_open_question() {
        let mut sm = MatchStateMachine::new(3);
        apply(&mut sm, MatchEvent::Start);
        assert_eq!(apply(&mut sm, MatchEvent::Finish), MatchPhase::Completed);
        assert!(sm.plan(MatchEvent::Start).is_err());
    }

    #[test]
    fn second_plan_while_pending_is_rejected() {
        let mut sm = MatchStateMachine::new(1);
        let plan = sm.plan(MatchEvent::Start).unwrap();
        assert_eq!(
            sm.plan(MatchEvent::Finish).unwrap_err(),
            PlanError::AlreadyPending
        );
        assert_eq!(
            sm.snapshot().pending,
            Some(MatchPhase::Live(QuestionPhase::Open(0)))
        );
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase(), MatchPhase::Waiting);
    }

    #[test]
    fn apply_with_foreign_plan_id_keeps_pending_plan() {
        let mut sm = MatchStateMachine::new(1);
        let plan = sm.plan(MatchEvent::Start).unwrap();
        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));
        assert_eq!(
            sm.apply(plan.id).unwrap(),
            MatchPhase::Live(QuestionPhase::Open(0))
        );
    }
}
