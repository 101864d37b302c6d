use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{CompetitionEntity, CompetitionStatus, StandingEntity},
    dto::{format_system_time, validation::validate_not_blank},
};

/// Payload used by administrators to open a competition.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateCompetitionRequest {
    #[validate(length(min = 1, max = 96), custom(function = "validate_not_blank"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub description: String,
}

/// Team registration submitted by a captain.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterTeamRequest {
    pub team_id: Uuid,
}

/// Public projection of a competition.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompetitionSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub status: CompetitionStatus,
    /// Registered teams in registration order.
    pub team_ids: Vec<Uuid>,
    pub created_at: String,
}

impl From<CompetitionEntity> for CompetitionSummary {
    fn from(value: CompetitionEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            status: value.status,
            team_ids: value.team_ids,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// One row of a competition table.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StandingSummary {
    pub team_id: Uuid,
    pub team_name: String,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub points: u32,
    pub score_for: u32,
    pub score_against: u32,
    pub score_difference: i64,
}

impl StandingSummary {
    /// Attach the display name of the team to a standing row.
    pub fn new(standing: &StandingEntity, team_name: String) -> Self {
        Self {
            team_id: standing.team_id,
            team_name,
            played: standing.played,
            wins: standing.wins,
            draws: standing.draws,
            losses: standing.losses,
            points: standing.points,
            score_for: standing.score_for,
            score_against: standing.score_against,
            score_difference: i64::from(standing.score_for) - i64::from(standing.score_against),
        }
    }
}
