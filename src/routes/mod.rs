use axum::Router;

use crate::state::SharedState;

pub mod activities;
pub mod docs;
pub mod events;
pub mod health;
pub mod sse;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(websocket::router())
        .merge(activities::router())
        .merge(events::router());

    api_router.merge(docs::router()).with_state(state)
}
