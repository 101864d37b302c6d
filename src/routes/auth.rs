use axum::{
    Extension, Json, Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::auth::{LoginRequest, LoginResponse, RegisterRequest, UserSummary},
    error::AppError,
    services::auth_service::{self, AuthUser},
    state::SharedState,
};

const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Account endpoints; `/auth/register` and `/auth/login` are open, the rest needs a session.
pub fn router(state: SharedState) -> Router<SharedState> {
    let open = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login));

    let session = Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route_layer(middleware::from_fn_with_state(state, require_session));

    open.merge(session)
}

/// Create an account.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserSummary),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn register(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<UserSummary>), AppError> {
    let user = auth_service::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange credentials for a session token.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, AppError> {
    Ok(Json(auth_service::login(&state, payload).await?))
}

/// Revoke the current session.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    params(("X-Session-Token" = String, Header, description = "Session token returned by /auth/login")),
    responses((status = 204, description = "Session revoked"))
)]
pub async fn logout(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
) -> StatusCode {
    auth_service::logout(&state, &user);
    StatusCode::NO_CONTENT
}

/// Describe the logged-in account.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    params(("X-Session-Token" = String, Header, description = "Session token returned by /auth/login")),
    responses((status = 200, description = "Current account", body = UserSummary))
)]
pub async fn me(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserSummary>, AppError> {
    Ok(Json(auth_service::me(&state, &user).await?))
}

fn session_token(req: &Request<Body>) -> Result<String, AppError> {
    req.headers()
        .get(SESSION_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized("missing session token header `X-Session-Token`".into())
        })
}

/// Resolve the session header and expose the caller as an [`AuthUser`] extension.
pub async fn require_session(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(&req)?;
    let user = auth_service::authenticate(&state, &token).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Like [`require_session`], but only lets administrators through.
pub async fn require_admin(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(&req)?;
    let user = auth_service::authenticate(&state, &token).await?;
    user.ensure_admin()?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
