use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/organizers/{organizer_id}",
    tag = "sse",
    params(("organizer_id" = String, Path, description = "Organizer whose events are streamed")),
    responses((status = 200, description = "Organizer dashboard stream", content_type = "text/event-stream", body = String))
)]
/// Stream cross-event notices to an organizer's dashboard.
pub async fn organizer_stream(
    State(state): State<SharedState>,
    Path(organizer_id): Path<String>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe_organizer(&state, &organizer_id);
    info!(organizer_id = %organizer_id, "new organizer SSE connection");
    sse_service::to_sse_stream(state, organizer_id, receiver)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/organizers/{organizer_id}", get(organizer_stream))
}
