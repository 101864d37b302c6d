use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Trivia Arena Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::me,
        crate::routes::teams::list_teams,
        crate::routes::teams::get_team,
        crate::routes::teams::create_team,
        crate::routes::teams::join_team,
        crate::routes::teams::leave_team,
        crate::routes::questions::list_questions,
        crate::routes::questions::create_question,
        crate::routes::competitions::list_competitions,
        crate::routes::competitions::get_competition,
        crate::routes::competitions::get_standings,
        crate::routes::competitions::create_competition,
        crate::routes::competitions::register_team,
        crate::routes::competitions::close_registration,
        crate::routes::matches::list_matches,
        crate::routes::matches::get_match,
        crate::routes::matches::schedule_match,
        crate::routes::matches::start_match,
        crate::routes::matches::close_question,
        crate::routes::matches::next_question,
        crate::routes::matches::complete_match,
        crate::routes::payments::list_packs,
        crate::routes::payments::purchase,
        crate::routes::payments::list_payments,
        crate::routes::practice::start_practice,
        crate::routes::practice::get_practice,
        crate::routes::practice::answer_practice,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::auth::RegisterRequest,
            crate::dto::auth::LoginRequest,
            crate::dto::auth::LoginResponse,
            crate::dto::auth::UserSummary,
            crate::dto::team::CreateTeamRequest,
            crate::dto::team::TeamSummary,
            crate::dto::team::TeamRef,
            crate::dto::question::CreateQuestionRequest,
            crate::dto::question::QuestionDetail,
            crate::dto::question::PublicQuestion,
            crate::dto::competition::CreateCompetitionRequest,
            crate::dto::competition::RegisterTeamRequest,
            crate::dto::competition::CompetitionSummary,
            crate::dto::competition::StandingSummary,
            crate::dto::matches::ScheduleMatchRequest,
            crate::dto::matches::MatchSummary,
            crate::dto::payment::TokenPackSummary,
            crate::dto::payment::PurchaseRequest,
            crate::dto::payment::PaymentSummary,
            crate::dto::practice::PracticeSessionView,
            crate::dto::practice::PracticeAnswerRequest,
            crate::dto::practice::PracticeAnswerResponse,
            crate::dto::ws::MatchInboundMessage,
            crate::dto::ws::MatchOutboundMessage,
            crate::dto::ws::MatchSnapshot,
            crate::dto::ws::CorrectCountsDto,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::MatchStatusEvent,
            crate::dto::sse::MatchCompletedEvent,
            crate::dto::sse::StandingsUpdatedEvent,
            crate::dao::models::CompetitionStatus,
            crate::dao::models::MatchStatus,
            crate::dao::models::PaymentStatus,
            crate::state::room::Role,
            crate::state::room::Side,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Accounts and login sessions"),
        (name = "teams", description = "Teams and membership"),
        (name = "questions", description = "Question bank (administrators)"),
        (name = "competitions", description = "Competitions, registrations and standings"),
        (name = "matches", description = "Match scheduling and hosting"),
        (name = "payments", description = "Simulated practice token shop"),
        (name = "practice", description = "Solo practice sessions"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "live", description = "WebSocket operations for match participants"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/login",
            "/teams/{id}/join",
            "/competitions/{id}/standings",
            "/matches/{id}/close-question",
            "/payments/packs",
            "/practice/{id}/answer",
            "/ws/matches/{id}",
            "/sse/public",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
