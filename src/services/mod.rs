/// Activity lifecycle: activation, deactivation, deletion and completion.
pub mod activity_service;
/// Per-question countdown tasks.
pub mod countdown;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Organizer commands wired to timers and room broadcasts.
pub mod organizer_service;
/// Participant registration and room membership.
pub mod participant_service;
/// Question progression and answer intake.
pub mod quiz_service;
/// Room and dashboard fan-out helpers.
pub mod room_events;
/// Points, streaks, rankings and answer statistics.
pub mod scoring;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor with exponential backoff.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
