use std::{sync::Arc, time::SystemTime};

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        arena_store::ArenaStore,
        models::{CompetitionEntity, CompetitionStatus},
    },
    dto::competition::{CompetitionSummary, CreateCompetitionRequest},
    error::ServiceError,
    services::{auth_service::AuthUser, standings, team_service::load_team},
    state::SharedState,
};

/// Load a competition or fail with [`ServiceError::NotFound`].
pub async fn load_competition(
    store: &Arc<dyn ArenaStore>,
    id: Uuid,
) -> Result<CompetitionEntity, ServiceError> {
    store
        .find_competition(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("competition `{id}` not found")))
}

/// Open a new competition for registrations.
pub async fn create_competition(
    state: &SharedState,
    payload: CreateCompetitionRequest,
) -> Result<CompetitionSummary, ServiceError> {
    let store = state.require_store().await?;
    let competition = CompetitionEntity {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        description: payload.description.trim().to_string(),
        status: CompetitionStatus::Open,
        team_ids: Vec::new(),
        created_at: SystemTime::now(),
    };
    store.save_competition(competition.clone()).await?;

    info!(competition_id = %competition.id, "competition created");
    Ok(competition.into())
}

/// Every competition, oldest first.
pub async fn list_competitions(
    state: &SharedState,
) -> Result<Vec<CompetitionSummary>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store
        .list_competitions()
        .await?
        .into_iter()
        .map(CompetitionSummary::from)
        .collect())
}

/// One competition by id.
pub async fn get_competition(
    state: &SharedState,
    id: Uuid,
) -> Result<CompetitionSummary, ServiceError> {
    let store = state.require_store().await?;
    Ok(load_competition(&store, id).await?.into())
}

/// Register a team in an open competition. Only the team captain may do so.
pub async fn register_team(
    state: &SharedState,
    user: &AuthUser,
    competition_id: Uuid,
    team_id: Uuid,
) -> Result<CompetitionSummary, ServiceError> {
    let store = state.require_store().await?;

    let competition = {
        let _gate = state.account_gate().lock().await;
        let mut competition = load_competition(&store, competition_id).await?;
        let team = load_team(&store, team_id).await?;
        if team.captain_id != user.id {
            return Err(ServiceError::Forbidden(
                "only the team captain can register the team".into(),
            ));
        }
        if competition.status != CompetitionStatus::Open {
            return Err(ServiceError::InvalidState(format!(
                "competition `{competition_id}` is closed for registration"
            )));
        }
        if competition.team_ids.contains(&team_id) {
            return Err(ServiceError::Conflict(format!(
                "team `{team_id}` is already registered"
            )));
        }

        competition.team_ids.push(team_id);
        store.save_competition(competition.clone()).await?;
        competition
    };

    info!(competition_id = %competition_id, team_id = %team_id, "team registered");
    standings::recompute_standings(state, competition_id).await?;
    Ok(competition.into())
}

/// Freeze the list of registered teams.
pub async fn close_registration(
    state: &SharedState,
    competition_id: Uuid,
) -> Result<CompetitionSummary, ServiceError> {
    let store = state.require_store().await?;

    let _gate = state.account_gate().lock().await;
    let mut competition = load_competition(&store, competition_id).await?;
    if competition.status != CompetitionStatus::Open {
        return Err(ServiceError::InvalidState(format!(
            "competition `{competition_id}` is already closed"
        )));
    }
    competition.status = CompetitionStatus::Closed;
    store.save_competition(competition.clone()).await?;

    info!(competition_id = %competition_id, "competition registration closed");
    Ok(competition.into())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::{
        auth_service::tests::{memory_state, signed_in},
        team_service::{self, tests::team},
    };

    pub(crate) async fn competition(state: &SharedState, name: &str) -> Uuid {
        create_competition(
            state,
            CreateCompetitionRequest {
                name: name.into(),
                description: String::new(),
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn only_captains_register_once_while_open() {
        let state = memory_state();
        let alice = signed_in(&state, "alice").await;
        let bob = signed_in(&state, "bob").await;
        let owls = team(&state, &alice, "Owls").await;
        team_service::join_team(&state, &bob, owls.id).await.unwrap();
        let cup = competition(&state, "Spring Cup").await;

        assert!(matches!(
            register_team(&state, &bob, cup, owls.id).await,
            Err(ServiceError::Forbidden(_))
        ));

        let registered = register_team(&state, &alice, cup, owls.id).await.unwrap();
        assert_eq!(registered.team_ids, vec![owls.id]);
        assert!(matches!(
            register_team(&state, &alice, cup, owls.id).await,
            Err(ServiceError::Conflict(_))
        ));

        let table = standings::standings(&state, cup).await.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].team_name, "Owls");
        assert_eq!(table[0].played, 0);
    }

    #[tokio::test]
    async fn closed_competitions_reject_registrations() {
        let state = memory_state();
        let alice = signed_in(&state, "alice").await;
        let owls = team(&state, &alice, "Owls").await;
        let cup = competition(&state, "Spring Cup").await;

        let closed = close_registration(&state, cup).await.unwrap();
        assert_eq!(closed.status, CompetitionStatus::Closed);
        assert!(matches!(
            close_registration(&state, cup).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            register_team(&state, &alice, cup, owls.id).await,
            Err(ServiceError::InvalidState(_))
        ));
    }
}
