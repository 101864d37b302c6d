use axum::{
    Extension, Json, Router, extract::State, http::StatusCode, middleware, routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::payment::{PaymentSummary, PurchaseRequest, TokenPackSummary},
    error::AppError,
    routes::auth::require_session,
    services::{auth_service::AuthUser, payment_service},
    state::SharedState,
};

/// Token shop: the catalogue is open, purchases need a session.
pub fn router(state: SharedState) -> Router<SharedState> {
    let open = Router::new().route("/payments/packs", get(list_packs));

    let session = Router::new()
        .route("/payments", get(list_payments).post(purchase))
        .route_layer(middleware::from_fn_with_state(state, require_session));

    open.merge(session)
}

/// Token pack catalogue.
#[utoipa::path(
    get,
    path = "/payments/packs",
    tag = "payments",
    responses((status = 200, description = "Token packs on sale", body = [TokenPackSummary]))
)]
pub async fn list_packs(State(state): State<SharedState>) -> Json<Vec<TokenPackSummary>> {
    Json(payment_service::list_packs(&state))
}

/// Buy a token pack with a simulated card.
#[utoipa::path(
    post,
    path = "/payments",
    tag = "payments",
    params(("X-Session-Token" = String, Header, description = "Session token returned by /auth/login")),
    request_body = PurchaseRequest,
    responses(
        (status = 201, description = "Tokens credited", body = PaymentSummary),
        (status = 400, description = "Unknown pack or invalid card number"),
        (status = 402, description = "Card declined")
    )
)]
pub async fn purchase(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Valid(Json(payload)): Valid<Json<PurchaseRequest>>,
) -> Result<(StatusCode, Json<PaymentSummary>), AppError> {
    let payment = payment_service::purchase(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Caller's purchase history.
#[utoipa::path(
    get,
    path = "/payments",
    tag = "payments",
    params(("X-Session-Token" = String, Header, description = "Session token returned by /auth/login")),
    responses((status = 200, description = "Purchase history, newest first", body = [PaymentSummary]))
)]
pub async fn list_payments(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<PaymentSummary>>, AppError> {
    Ok(Json(payment_service::list_payments(&state, &user).await?))
}
