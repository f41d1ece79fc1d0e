use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Livequiz Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::organizer_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::activities::activate_activity,
        crate::routes::activities::deactivate_activity,
        crate::routes::activities::end_activity,
        crate::routes::activities::delete_activity,
        crate::routes::activities::leaderboard,
        crate::routes::activities::question_statistics,
        crate::routes::events::list_participants,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::RoomEvent,
            crate::dto::ws::ConnectionEvent,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::ParticipantJoinedNotice,
            crate::dto::sse::ActivityActivatedNotice,
            crate::dto::sse::QuizEndedNotice,
            crate::dto::activity::ActivitySummary,
            crate::dto::activity::ActivationResponse,
            crate::dto::activity::DeactivationResponse,
            crate::dto::activity::ParticipantSummary,
            crate::dto::activity::QuizSummary,
            crate::services::scoring::LeaderboardEntry,
            crate::services::scoring::QuestionStatistics,
            crate::services::scoring::OptionStatistics,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Organizer dashboard streams"),
        (name = "live", description = "WebSocket session for participants and organizers"),
        (name = "activities", description = "Organizer controls for an event's activities"),
        (name = "events", description = "Read-only event information"),
    )
)]
pub struct ApiDoc;
