use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::MatchStatus,
    dto::{question::PublicQuestion, team::TeamRef},
    state::room::{Role, Side},
};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from match WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchInboundMessage {
    /// First message of every socket.
    Identification { token: String },
    /// Answer to the open question.
    Answer { question_index: usize, choice: usize },
    /// Application-level keep-alive.
    Ping,
    #[serde(other)]
    Unknown,
}

impl MatchInboundMessage {
    /// Parse a text frame.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Full state sent to a socket right after identification.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchSnapshot {
    pub match_id: Uuid,
    pub status: MatchStatus,
    pub home_team: TeamRef,
    pub away_team: TeamRef,
    pub home_score: u32,
    pub away_score: u32,
    pub question_count: usize,
    /// Question on screen, answer hidden.
    pub current_question: Option<PublicQuestion>,
    pub question_open: bool,
    /// Role of the receiving socket.
    pub role: Role,
}

/// Per-team number of right answers to a question.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct CorrectCountsDto {
    pub home: usize,
    pub away: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Messages pushed to match WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchOutboundMessage {
    Snapshot(MatchSnapshot),
    Presence {
        connections: usize,
    },
    AnswerAck {
        question_index: usize,
        correct: bool,
    },
    AnswerReceived {
        question_index: usize,
        team: Side,
        answered_count: usize,
    },
    Score {
        home: u32,
        away: u32,
    },
    QuestionOpened {
        question: PublicQuestion,
    },
    QuestionClosed {
        question_index: usize,
        correct_index: usize,
        correct_counts: CorrectCountsDto,
        home: u32,
        away: u32,
    },
    MatchStatus {
        status: MatchStatus,
        current_question: Option<usize>,
        question_open: bool,
    },
    MatchCompleted {
        home: u32,
        away: u32,
        winner: Option<Side>,
    },
    Error {
        message: String,
    },
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_messages_are_tagged_by_type() {
        let ident = MatchInboundMessage::from_json_str(
            r#"{"type":"identification","token":"abc"}"#,
        )
        .unwrap();
        assert!(matches!(ident, MatchInboundMessage::Identification { token } if token == "abc"));

        let answer = MatchInboundMessage::from_json_str(
            r#"{"type":"answer","question_index":2,"choice":1}"#,
        )
        .unwrap();
        assert!(matches!(
            answer,
            MatchInboundMessage::Answer {
                question_index: 2,
                choice: 1
            }
        ));

        let unknown = MatchInboundMessage::from_json_str(r#"{"type":"dance"}"#).unwrap();
        assert!(matches!(unknown, MatchInboundMessage::Unknown));
    }

    #[test]
    fn outbound_messages_use_snake_case_tags() {
        let json = serde_json::to_value(MatchOutboundMessage::AnswerReceived {
            question_index: 0,
            team: Side::Away,
            answered_count: 3,
        })
        .unwrap();
        assert_eq!(json["type"], "answer_received");
        assert_eq!(json["team"], "away");

        let pong = serde_json::to_value(MatchOutboundMessage::Pong).unwrap();
        assert_eq!(pong, serde_json::json!({ "type": "pong" }));
    }
}
