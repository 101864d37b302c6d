use std::future::Future;

use crate::{
    error::ServiceError,
    services::{live_service, sse_events},
    state::{
        SharedState,
        match_machine::{MatchEvent, Plan},
        room::MatchRoom,
    },
};

/// Execute a planned match transition, then announce the resulting phase to the room
/// and on the public stream.
pub async fn run_match_transition<F, Fut, T>(
    state: &SharedState,
    room: &MatchRoom,
    event: MatchEvent,
    work: F,
) -> Result<T, ServiceError>
where
    F: FnOnce(Plan) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let (res, next) = room.run_transition(event, work).await?;
    live_service::broadcast_match_status(room, next);
    sse_events::broadcast_match_status(state, room.match_id(), next);
    Ok(res)
}
