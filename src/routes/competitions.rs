use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::competition::{
        CompetitionSummary, CreateCompetitionRequest, RegisterTeamRequest, StandingSummary,
    },
    error::AppError,
    routes::auth::{require_admin, require_session},
    services::{auth_service::AuthUser, competition_service, standings},
    state::SharedState,
};

/// Competitions: public reads, captain registrations and admin management.
pub fn router(state: SharedState) -> Router<SharedState> {
    let open = Router::new()
        .route("/competitions", get(list_competitions))
        .route("/competitions/{id}", get(get_competition))
        .route("/competitions/{id}/standings", get(get_standings));

    let session = Router::new()
        .route("/competitions/{id}/register", post(register_team))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let admin = Router::new()
        .route("/competitions", post(create_competition))
        .route("/competitions/{id}/close", post(close_registration))
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    open.merge(session).merge(admin)
}

/// List every competition.
#[utoipa::path(
    get,
    path = "/competitions",
    tag = "competitions",
    responses((status = 200, description = "Every competition", body = [CompetitionSummary]))
)]
pub async fn list_competitions(
    State(state): State<SharedState>,
) -> Result<Json<Vec<CompetitionSummary>>, AppError> {
    Ok(Json(competition_service::list_competitions(&state).await?))
}

/// Fetch one competition.
#[utoipa::path(
    get,
    path = "/competitions/{id}",
    tag = "competitions",
    params(("id" = Uuid, Path, description = "Competition identifier")),
    responses(
        (status = 200, description = "Competition", body = CompetitionSummary),
        (status = 404, description = "Unknown competition")
    )
)]
pub async fn get_competition(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompetitionSummary>, AppError> {
    Ok(Json(competition_service::get_competition(&state, id).await?))
}

/// Competition table, best team first.
#[utoipa::path(
    get,
    path = "/competitions/{id}/standings",
    tag = "competitions",
    params(("id" = Uuid, Path, description = "Competition identifier")),
    responses((status = 200, description = "Ordered table", body = [StandingSummary]))
)]
pub async fn get_standings(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StandingSummary>>, AppError> {
    Ok(Json(standings::standings(&state, id).await?))
}

/// Open a new competition (administrators).
#[utoipa::path(
    post,
    path = "/competitions",
    tag = "competitions",
    params(("X-Session-Token" = String, Header, description = "Administrator session token")),
    request_body = CreateCompetitionRequest,
    responses((status = 201, description = "Competition created", body = CompetitionSummary))
)]
pub async fn create_competition(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateCompetitionRequest>>,
) -> Result<(StatusCode, Json<CompetitionSummary>), AppError> {
    let competition = competition_service::create_competition(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(competition)))
}

/// Register one of the caller's teams. Only its captain may do so.
#[utoipa::path(
    post,
    path = "/competitions/{id}/register",
    tag = "competitions",
    params(
        ("X-Session-Token" = String, Header, description = "Session token of the team captain"),
        ("id" = Uuid, Path, description = "Competition identifier")
    ),
    request_body = RegisterTeamRequest,
    responses(
        (status = 200, description = "Team registered", body = CompetitionSummary),
        (status = 403, description = "Caller is not the team captain"),
        (status = 409, description = "Registration closed or team already registered")
    )
)]
pub async fn register_team(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RegisterTeamRequest>,
) -> Result<Json<CompetitionSummary>, AppError> {
    Ok(Json(
        competition_service::register_team(&state, &user, id, payload.team_id).await?,
    ))
}

/// Stop accepting team registrations (administrators).
#[utoipa::path(
    post,
    path = "/competitions/{id}/close",
    tag = "competitions",
    params(
        ("X-Session-Token" = String, Header, description = "Administrator session token"),
        ("id" = Uuid, Path, description = "Competition identifier")
    ),
    responses(
        (status = 200, description = "Registration closed", body = CompetitionSummary),
        (status = 409, description = "Already closed")
    )
)]
pub async fn close_registration(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompetitionSummary>, AppError> {
    Ok(Json(
        competition_service::close_registration(&state, id).await?,
    ))
}
