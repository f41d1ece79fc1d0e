use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the store and report the live session counters.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let backend = match state.require_event_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
            Some(store.backend_name())
        }
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            None
        }
    };

    let response = match backend {
        Some(name) if !state.is_degraded() => HealthResponse::ok(name),
        other => HealthResponse::degraded(other),
    };
    response.with_activity(state.timers().active_count(), state.rooms().room_count())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::event_store::memory::MemoryEventStore, state::AppState};

    #[tokio::test]
    async fn reports_backend_and_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let degraded = health_status(&state).await;
        assert_eq!(degraded.status, "degraded");
        assert_eq!(degraded.store, None);

        state.set_event_store(Arc::new(MemoryEventStore::new())).await;
        let healthy = health_status(&state).await;
        assert_eq!(healthy.status, "ok");
        assert_eq!(healthy.store.as_deref(), Some("memory"));
        assert_eq!(healthy.open_rooms, 0);
    }
}
