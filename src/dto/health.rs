use serde::Serialize;
use utoipa::ToSchema;

/// Payload of `/healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` with a storage backend, `degraded` without.
    pub status: String,
    /// Match rooms currently held in memory.
    pub loaded_rooms: usize,
}

impl HealthResponse {
    /// Build the payload from the degraded flag and the room count.
    pub fn new(degraded: bool, loaded_rooms: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            loaded_rooms,
        }
    }
}
