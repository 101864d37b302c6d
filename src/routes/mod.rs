use axum::Router;

use crate::state::SharedState;

/// Registration, login and session middleware.
pub mod auth;
/// Competitions, registrations and standings.
pub mod competitions;
/// Swagger UI and the OpenAPI document.
pub mod docs;
/// Liveness endpoint.
pub mod health;
/// Match scheduling and host actions.
pub mod matches;
/// Token shop.
pub mod payments;
/// Practice sessions.
pub mod practice;
/// Question bank.
pub mod questions;
/// Public event stream.
pub mod sse;
/// Teams and membership.
pub mod teams;
/// Match WebSocket upgrade.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(websocket::router())
        .merge(auth::router(state.clone()))
        .merge(teams::router(state.clone()))
        .merge(questions::router(state.clone()))
        .merge(competitions::router(state.clone()))
        .merge(matches::router(state.clone()))
        .merge(payments::router(state.clone()))
        .merge(practice::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
