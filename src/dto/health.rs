use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Storage backend in use, absent while none is installed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    /// Question countdowns currently running.
    pub active_timers: usize,
    /// Events with at least one live connection.
    pub open_rooms: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(store: &str) -> Self {
        Self {
            status: "ok".to_string(),
            store: Some(store.to_string()),
            active_timers: 0,
            open_rooms: 0,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(store: Option<&str>) -> Self {
        Self {
            status: "degraded".to_string(),
            store: store.map(str::to_string),
            active_timers: 0,
            open_rooms: 0,
        }
    }

    /// Attach live session counters.
    pub fn with_activity(mut self, active_timers: usize, open_rooms: usize) -> Self {
        self.active_timers = active_timers;
        self.open_rooms = open_rooms;
        self
    }
}
