use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::activity::ParticipantSummary, error::AppError, services::participant_service,
    state::SharedState,
};

/// Read-only event endpoints.
pub fn router() -> Router<SharedState> {
    Router::new().route("/events/{event_id}/participants", get(list_participants))
}

#[utoipa::path(
    get,
    path = "/events/{event_id}/participants",
    tag = "events",
    params(("event_id" = String, Path, description = "Identifier of the event")),
    responses(
        (status = 200, description = "Participants in join order", body = [ParticipantSummary]),
        (status = 404, description = "Unknown event")
    )
)]
/// Return the participants of an event.
pub async fn list_participants(
    State(state): State<SharedState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<ParticipantSummary>>, AppError> {
    let participants = participant_service::list_participants(&state, event_id).await?;
    Ok(Json(participants.iter().map(Into::into).collect()))
}
