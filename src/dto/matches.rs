use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{MatchEntity, MatchStatus},
    dto::format_system_time,
};

/// Payload used by administrators to schedule a match.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ScheduleMatchRequest {
    pub competition_id: Uuid,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    /// Ordered questions played during the match.
    #[validate(length(min = 1, max = 100))]
    pub question_ids: Vec<Uuid>,
    /// Announced start time (RFC 3339).
    #[serde(default)]
    pub scheduled_at: Option<String>,
}

/// Optional filter for listing matches.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MatchListQuery {
    /// Only return matches of this competition.
    pub competition_id: Option<Uuid>,
}

/// Public projection of a match.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchSummary {
    pub id: Uuid,
    pub competition_id: Uuid,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    pub status: MatchStatus,
    /// Index of the question currently (or last) played.
    pub current_question: Option<usize>,
    pub question_count: usize,
    pub home_score: u32,
    pub away_score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl From<MatchEntity> for MatchSummary {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id,
            competition_id: value.competition_id,
            home_team_id: value.home_team_id,
            away_team_id: value.away_team_id,
            status: value.status,
            current_question: value.current_question,
            question_count: value.question_ids.len(),
            home_score: value.home_score,
            away_score: value.away_score,
            scheduled_at: value.scheduled_at.map(format_system_time),
            started_at: value.started_at.map(format_system_time),
            completed_at: value.completed_at.map(format_system_time),
        }
    }
}
