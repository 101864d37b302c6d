use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::matches::{MatchListQuery, MatchSummary, ScheduleMatchRequest},
    error::AppError,
    routes::auth::require_admin,
    services::match_service,
    state::SharedState,
};

/// Match listing (open) and hosting controls (admin).
pub fn router(state: SharedState) -> Router<SharedState> {
    let open = Router::new()
        .route("/matches", get(list_matches))
        .route("/matches/{id}", get(get_match));

    let admin = Router::new()
        .route("/matches", post(schedule_match))
        .route("/matches/{id}/start", post(start_match))
        .route("/matches/{id}/close-question", post(close_question))
        .route("/matches/{id}/next", post(next_question))
        .route("/matches/{id}/complete", post(complete_match))
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    open.merge(admin)
}

/// List matches, optionally for one competition.
#[utoipa::path(
    get,
    path = "/matches",
    tag = "matches",
    params(MatchListQuery),
    responses((status = 200, description = "Matches, live scores included", body = [MatchSummary]))
)]
pub async fn list_matches(
    State(state): State<SharedState>,
    Query(query): Query<MatchListQuery>,
) -> Result<Json<Vec<MatchSummary>>, AppError> {
    Ok(Json(match_service::list_matches(&state, query).await?))
}

/// Fetch one match with its live scores.
#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match", body = MatchSummary),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(match_service::get_match(&state, id).await?))
}

/// Schedule a match between two registered teams (administrators).
#[utoipa::path(
    post,
    path = "/matches",
    tag = "matches",
    params(("X-Session-Token" = String, Header, description = "Administrator session token")),
    request_body = ScheduleMatchRequest,
    responses(
        (status = 201, description = "Match scheduled", body = MatchSummary),
        (status = 400, description = "Unknown or unregistered teams, or invalid questions")
    )
)]
pub async fn schedule_match(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ScheduleMatchRequest>>,
) -> Result<(StatusCode, Json<MatchSummary>), AppError> {
    let scheduled = match_service::schedule_match(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(scheduled)))
}

/// Start a waiting match; its first question opens immediately.
#[utoipa::path(
    post,
    path = "/matches/{id}/start",
    tag = "matches",
    params(
        ("X-Session-Token" = String, Header, description = "Administrator session token"),
        ("id" = Uuid, Path, description = "Match identifier")
    ),
    responses(
        (status = 200, description = "Match live", body = MatchSummary),
        (status = 409, description = "Match not waiting or a team is already playing")
    )
)]
pub async fn start_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(match_service::start_match(&state, id).await?))
}

/// Close the open question and reveal its answer (administrators).
#[utoipa::path(
    post,
    path = "/matches/{id}/close-question",
    tag = "matches",
    params(
        ("X-Session-Token" = String, Header, description = "Administrator session token"),
        ("id" = Uuid, Path, description = "Match identifier")
    ),
    responses(
        (status = 200, description = "Question closed", body = MatchSummary),
        (status = 409, description = "No open question")
    )
)]
pub async fn close_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(match_service::close_question(&state, id).await?))
}

/// Close the open question if any, then open the next one or complete the match.
#[utoipa::path(
    post,
    path = "/matches/{id}/next",
    tag = "matches",
    params(
        ("X-Session-Token" = String, Header, description = "Administrator session token"),
        ("id" = Uuid, Path, description = "Match identifier")
    ),
    responses(
        (status = 200, description = "Next question opened or match completed", body = MatchSummary),
        (status = 409, description = "Match not live")
    )
)]
pub async fn next_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(match_service::next_question(&state, id).await?))
}

/// Finish a live match (administrators).
#[utoipa::path(
    post,
    path = "/matches/{id}/complete",
    tag = "matches",
    params(
        ("X-Session-Token" = String, Header, description = "Administrator session token"),
        ("id" = Uuid, Path, description = "Match identifier")
    ),
    responses(
        (status = 200, description = "Match completed", body = MatchSummary),
        (status = 409, description = "Match not live")
    )
)]
pub async fn complete_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(match_service::complete_match(&state, id).await?))
}
