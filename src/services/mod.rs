/// Accounts, password hashing and login sessions.
pub mod auth_service;
/// Competitions and team registrations.
pub mod competition_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Match WebSocket relay and room fan-out.
pub mod live_service;
/// Match scheduling and host actions.
pub mod match_service;
/// Simulated token shop.
pub mod payment_service;
/// Solo practice sessions.
pub mod practice_service;
/// Question bank management.
pub mod question_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Competition tables.
pub mod standings;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Teams and membership.
pub mod team_service;
