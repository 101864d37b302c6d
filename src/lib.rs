//! Library crate for trivia-arena-back, exposing modules for binaries and integration tests.

pub mod config;
/// Entities and storage backends.
pub mod dao;
mod dto;
mod error;
/// HTTP, SSE and WebSocket routers.
pub mod routes;
/// Business operations behind the routes.
pub mod services;
/// Shared in-memory state: rooms, sessions and the store slot.
pub mod state;
