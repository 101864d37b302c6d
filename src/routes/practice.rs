use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::practice::{PracticeAnswerRequest, PracticeAnswerResponse, PracticeSessionView},
    error::AppError,
    routes::auth::require_session,
    services::{auth_service::AuthUser, practice_service},
    state::SharedState,
};

/// Practice sessions of the logged-in user.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/practice", post(start_practice))
        .route("/practice/{id}", get(get_practice))
        .route("/practice/{id}/answer", post(answer_practice))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

/// Spend one practice token on a new session.
#[utoipa::path(
    post,
    path = "/practice",
    tag = "practice",
    params(("X-Session-Token" = String, Header, description = "Session token returned by /auth/login")),
    responses(
        (status = 201, description = "Session started", body = PracticeSessionView),
        (status = 409, description = "No token left or empty question bank")
    )
)]
pub async fn start_practice(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
) -> Result<(StatusCode, Json<PracticeSessionView>), AppError> {
    let session = practice_service::start_practice(&state, &user).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Progress of a practice session.
#[utoipa::path(
    get,
    path = "/practice/{id}",
    tag = "practice",
    params(
        ("X-Session-Token" = String, Header, description = "Session token returned by /auth/login"),
        ("id" = Uuid, Path, description = "Practice session identifier")
    ),
    responses(
        (status = 200, description = "Progress", body = PracticeSessionView),
        (status = 404, description = "Unknown session or owned by someone else")
    )
)]
pub async fn get_practice(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<PracticeSessionView>, AppError> {
    Ok(Json(practice_service::get_practice(&state, &user, id)?))
}

/// Answer one practice question and reveal the right choice.
#[utoipa::path(
    post,
    path = "/practice/{id}/answer",
    tag = "practice",
    params(
        ("X-Session-Token" = String, Header, description = "Session token returned by /auth/login"),
        ("id" = Uuid, Path, description = "Practice session identifier")
    ),
    request_body = PracticeAnswerRequest,
    responses(
        (status = 200, description = "Answer corrected", body = PracticeAnswerResponse),
        (status = 400, description = "Unknown question or choice"),
        (status = 409, description = "Question already answered")
    )
)]
pub async fn answer_practice(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PracticeAnswerRequest>,
) -> Result<Json<PracticeAnswerResponse>, AppError> {
    Ok(Json(practice_service::answer_practice(
        &state, &user, id, payload,
    )?))
}
