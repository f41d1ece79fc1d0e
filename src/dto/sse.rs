use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::activity::{ActivitySummary, ParticipantSummary},
    services::scoring::LeaderboardEntry,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Event with an already encoded data field.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to a dashboard when it connects.
pub struct Handshake {
    /// Organizer whose events the stream carries.
    pub organizer_id: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Dashboard notice: someone joined one of the organizer's events.
pub struct ParticipantJoinedNotice {
    pub event_id: Uuid,
    pub participant: ParticipantSummary,
    pub participant_count: u32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Dashboard notice: an activity went live.
pub struct ActivityActivatedNotice {
    pub event_id: Uuid,
    pub activity: ActivitySummary,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Dashboard notice: a quiz finished.
pub struct QuizEndedNotice {
    pub event_id: Uuid,
    pub activity_id: Uuid,
    pub top_three: Vec<LeaderboardEntry>,
    pub participant_count: usize,
}
