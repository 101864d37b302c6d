use axum::{
    Json, Router, extract::State, http::StatusCode, middleware, routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::question::{CreateQuestionRequest, QuestionDetail},
    error::AppError,
    routes::auth::require_admin,
    services::question_service,
    state::SharedState,
};

/// Question bank, administrators only.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/questions", get(list_questions).post(create_question))
        .route_layer(middleware::from_fn_with_state(state, require_admin))
}

/// Every question with its answer (administrators).
#[utoipa::path(
    get,
    path = "/questions",
    tag = "questions",
    params(("X-Session-Token" = String, Header, description = "Administrator session token")),
    responses((status = 200, description = "Question bank, answers included", body = [QuestionDetail]))
)]
pub async fn list_questions(
    State(state): State<SharedState>,
) -> Result<Json<Vec<QuestionDetail>>, AppError> {
    Ok(Json(question_service::list_questions(&state).await?))
}

/// Add a question to the bank (administrators).
#[utoipa::path(
    post,
    path = "/questions",
    tag = "questions",
    params(("X-Session-Token" = String, Header, description = "Administrator session token")),
    request_body = CreateQuestionRequest,
    responses(
        (status = 201, description = "Question added", body = QuestionDetail),
        (status = 400, description = "Invalid question")
    )
)]
pub async fn create_question(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateQuestionRequest>>,
) -> Result<(StatusCode, Json<QuestionDetail>), AppError> {
    let question = question_service::create_question(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}
