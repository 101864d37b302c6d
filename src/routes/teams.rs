use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::team::{CreateTeamRequest, TeamSummary},
    error::AppError,
    routes::auth::require_session,
    services::{auth_service::AuthUser, team_service},
    state::SharedState,
};

/// Team browsing (open) and membership management (session).
pub fn router(state: SharedState) -> Router<SharedState> {
    let open = Router::new()
        .route("/teams", get(list_teams))
        .route("/teams/{id}", get(get_team));

    let session = Router::new()
        .route("/teams", post(create_team))
        .route("/teams/{id}/join", post(join_team))
        .route("/teams/{id}/leave", post(leave_team))
        .route_layer(middleware::from_fn_with_state(state, require_session));

    open.merge(session)
}

/// List every team.
#[utoipa::path(
    get,
    path = "/teams",
    tag = "teams",
    responses((status = 200, description = "Every team", body = [TeamSummary]))
)]
pub async fn list_teams(
    State(state): State<SharedState>,
) -> Result<Json<Vec<TeamSummary>>, AppError> {
    Ok(Json(team_service::list_teams(&state).await?))
}

/// Fetch one team.
#[utoipa::path(
    get,
    path = "/teams/{id}",
    tag = "teams",
    params(("id" = Uuid, Path, description = "Team identifier")),
    responses(
        (status = 200, description = "Team", body = TeamSummary),
        (status = 404, description = "Unknown team")
    )
)]
pub async fn get_team(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TeamSummary>, AppError> {
    Ok(Json(team_service::get_team(&state, id).await?))
}

/// Found a team captained by the caller.
#[utoipa::path(
    post,
    path = "/teams",
    tag = "teams",
    params(("X-Session-Token" = String, Header, description = "Session token returned by /auth/login")),
    request_body = CreateTeamRequest,
    responses(
        (status = 201, description = "Team created", body = TeamSummary),
        (status = 409, description = "Team name already taken")
    )
)]
pub async fn create_team(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Valid(Json(payload)): Valid<Json<CreateTeamRequest>>,
) -> Result<(StatusCode, Json<TeamSummary>), AppError> {
    let team = team_service::create_team(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

/// Join a team as a regular member.
#[utoipa::path(
    post,
    path = "/teams/{id}/join",
    tag = "teams",
    params(
        ("X-Session-Token" = String, Header, description = "Session token returned by /auth/login"),
        ("id" = Uuid, Path, description = "Team identifier")
    ),
    responses(
        (status = 200, description = "Joined", body = TeamSummary),
        (status = 409, description = "Already a member, team full or playing")
    )
)]
pub async fn join_team(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<TeamSummary>, AppError> {
    Ok(Json(team_service::join_team(&state, &user, id).await?))
}

/// Leave a team. Answers 204 when the team was deleted because nobody is left.
#[utoipa::path(
    post,
    path = "/teams/{id}/leave",
    tag = "teams",
    params(
        ("X-Session-Token" = String, Header, description = "Session token returned by /auth/login"),
        ("id" = Uuid, Path, description = "Team identifier")
    ),
    responses(
        (status = 200, description = "Left the team", body = TeamSummary),
        (status = 204, description = "Left the team, which was deleted"),
        (status = 409, description = "Not a member, captain with members left, or playing")
    )
)]
pub async fn leave_team(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let response = match team_service::leave_team(&state, &user, id).await? {
        Some(team) => Json(team).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    Ok(response)
}
