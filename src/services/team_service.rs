use std::{sync::Arc, time::SystemTime};

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        arena_store::ArenaStore,
        models::{MatchStatus, TeamEntity},
    },
    dto::team::{CreateTeamRequest, TeamSummary},
    error::ServiceError,
    services::auth_service::AuthUser,
    state::SharedState,
};

/// Load a team or fail with [`ServiceError::NotFound`].
pub async fn load_team(store: &Arc<dyn ArenaStore>, id: Uuid) -> Result<TeamEntity, ServiceError> {
    store
        .find_team(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("team `{id}` not found")))
}

async fn ensure_not_playing(store: &Arc<dyn ArenaStore>, team_id: Uuid) -> Result<(), ServiceError> {
    let playing = store
        .list_matches(None)
        .await?
        .iter()
        .any(|game| game.status == MatchStatus::Live && game.involves(team_id));
    if playing {
        return Err(ServiceError::InvalidState(format!(
            "team `{team_id}` is playing a live match"
        )));
    }
    Ok(())
}

/// Found a team; the caller becomes its captain and first member.
pub async fn create_team(
    state: &SharedState,
    user: &AuthUser,
    payload: CreateTeamRequest,
) -> Result<TeamSummary, ServiceError> {
    let store = state.require_store().await?;
    let name = payload.name.trim().to_string();

    let _gate = state.account_gate().lock().await;
    let taken = store
        .list_teams()
        .await?
        .iter()
        .any(|team| team.name.to_lowercase() == name.to_lowercase());
    if taken {
        return Err(ServiceError::Conflict(format!(
            "team name `{name}` is already taken"
        )));
    }

    let team = TeamEntity {
        id: Uuid::new_v4(),
        name,
        captain_id: user.id,
        member_ids: vec![user.id],
        created_at: SystemTime::now(),
    };
    store.save_team(team.clone()).await?;

    info!(team_id = %team.id, captain_id = %user.id, "team created");
    Ok(team.into())
}

/// Every team, oldest first.
pub async fn list_teams(state: &SharedState) -> Result<Vec<TeamSummary>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store
        .list_teams()
        .await?
        .into_iter()
        .map(TeamSummary::from)
        .collect())
}

/// One team by id.
pub async fn get_team(state: &SharedState, id: Uuid) -> Result<TeamSummary, ServiceError> {
    let store = state.require_store().await?;
    Ok(load_team(&store, id).await?.into())
}

/// Add the caller to a team.
pub async fn join_team(
    state: &SharedState,
    user: &AuthUser,
    team_id: Uuid,
) -> Result<TeamSummary, ServiceError> {
    let store = state.require_store().await?;
    let max_members = state.config().max_team_members();

    let _gate = state.account_gate().lock().await;
    let mut team = load_team(&store, team_id).await?;
    if team.member_ids.contains(&user.id) {
        return Err(ServiceError::Conflict(format!(
            "already a member of team `{team_id}`"
        )));
    }
    if team.member_ids.len() >= max_members {
        return Err(ServiceError::InvalidState(format!(
            "team `{team_id}` is full ({max_members} members)"
        )));
    }
    ensure_not_playing(&store, team_id).await?;

    team.member_ids.push(user.id);
    store.save_team(team.clone()).await?;

    info!(team_id = %team_id, user_id = %user.id, "member joined team");
    Ok(team.into())
}

/// Remove the caller from a team. Returns `None` when the team was deleted
/// because its last member left.
pub async fn leave_team(
    state: &SharedState,
    user: &AuthUser,
    team_id: Uuid,
) -> Result<Option<TeamSummary>, ServiceError> {
    let store = state.require_store().await?;

    let _gate = state.account_gate().lock().await;
    let mut team = load_team(&store, team_id).await?;
    if !team.member_ids.contains(&user.id) {
        return Err(ServiceError::InvalidState(format!(
            "not a member of team `{team_id}`"
        )));
    }
    ensure_not_playing(&store, team_id).await?;

    if team.member_ids.len() == 1 {
        store.delete_team(team_id).await?;
        info!(team_id = %team_id, user_id = %user.id, "last member left; team deleted");
        return Ok(None);
    }
    if team.captain_id == user.id {
        return Err(ServiceError::InvalidState(
            "the captain cannot leave while other members remain".into(),
        ));
    }

    team.member_ids.retain(|member| *member != user.id);
    store.save_team(team.clone()).await?;

    info!(team_id = %team_id, user_id = %user.id, "member left team");
    Ok(Some(team.into()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::auth_service::tests::{memory_state, signed_in};

    fn state_with_max_members(max_team_members: usize) -> SharedState {
        let config = crate::config::AppConfig::from_json(&format!(
            r#"{{ "max_team_members": {max_team_members} }}"#
        ))
        .unwrap();
        crate::state::AppState::with_store(
            config,
            std::sync::Arc::new(crate::dao::arena_store::MemoryStore::new()),
        )
    }

    pub(crate) async fn team(state: &SharedState, captain: &AuthUser, name: &str) -> TeamSummary {
        create_team(state, captain, CreateTeamRequest { name: name.into() })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn names_are_unique_ignoring_case() {
        let state = memory_state();
        let alice = signed_in(&state, "alice").await;
        team(&state, &alice, "Night Owls").await;

        let err = create_team(
            &state,
            &alice,
            CreateTeamRequest {
                name: "  night owls ".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn membership_is_capped() {
        let state = state_with_max_members(2);
        let alice = signed_in(&state, "alice").await;
        let bob = signed_in(&state, "bob").await;
        let carol = signed_in(&state, "carol").await;
        let owls = team(&state, &alice, "Owls").await;

        let joined = join_team(&state, &bob, owls.id).await.unwrap();
        assert_eq!(joined.member_ids, vec![alice.id, bob.id]);
        assert!(matches!(
            join_team(&state, &bob, owls.id).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            join_team(&state, &carol, owls.id).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn captain_leaves_last_and_deletes_the_team() {
        let state = memory_state();
        let alice = signed_in(&state, "alice").await;
        let bob = signed_in(&state, "bob").await;
        let owls = team(&state, &alice, "Owls").await;
        join_team(&state, &bob, owls.id).await.unwrap();

        assert!(matches!(
            leave_team(&state, &alice, owls.id).await,
            Err(ServiceError::InvalidState(_))
        ));

        let remaining = leave_team(&state, &bob, owls.id).await.unwrap().unwrap();
        assert_eq!(remaining.member_ids, vec![alice.id]);

        assert!(leave_team(&state, &alice, owls.id).await.unwrap().is_none());
        assert!(matches!(
            get_team(&state, owls.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn join_and_leave_are_locked_during_a_live_match() {
        use crate::services::match_service::{complete_match, tests::arena};

        let arena = arena().await;
        let newcomer = signed_in(&arena.state, "nadia").await;
        arena.start().await;

        assert!(matches!(
            join_team(&arena.state, &newcomer, arena.home_team_id).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            leave_team(&arena.state, &arena.away_player, arena.away_team_id).await,
            Err(ServiceError::InvalidState(_))
        ));

        complete_match(&arena.state, arena.match_id).await.unwrap();
        let joined = join_team(&arena.state, &newcomer, arena.home_team_id)
            .await
            .unwrap();
        assert!(joined.member_ids.contains(&newcomer.id));
    }
}
