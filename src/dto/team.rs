use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::TeamEntity,
    dto::{format_system_time, validation::validate_not_blank},
};

/// Payload used to found a team; the caller becomes its captain.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub name: String,
}

/// Public projection of a team.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
    pub captain_id: Uuid,
    /// Members in join order, the captain first.
    pub member_ids: Vec<Uuid>,
    pub created_at: String,
}

impl From<TeamEntity> for TeamSummary {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            captain_id: value.captain_id,
            member_ids: value.member_ids,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Minimal team reference embedded in match payloads.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamRef {
    pub id: Uuid,
    pub name: String,
}

impl From<&TeamEntity> for TeamRef {
    fn from(value: &TeamEntity) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
        }
    }
}
