use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent, SystemStatus},
    state::SharedState,
};

const EVENT_HANDSHAKE: &str = "handshake";
const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Subscribe to the dashboard stream of `organizer_id`.
///
/// The handshake is queued on the new receiver before any other event.
pub fn subscribe_organizer(
    state: &SharedState,
    organizer_id: &str,
) -> broadcast::Receiver<ServerEvent> {
    let receiver = state.organizers().subscribe(organizer_id);
    broadcast_handshake(state, organizer_id);
    receiver
}

fn broadcast_handshake(state: &SharedState, organizer_id: &str) {
    let handshake = Handshake {
        organizer_id: organizer_id.to_owned(),
        message: format!("subscribed to events of organizer `{organizer_id}`"),
        degraded: state.is_degraded(),
    };
    match ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), &handshake) {
        Ok(event) => state.organizers().broadcast(organizer_id, event),
        Err(err) => warn!(error = %err, "failed to serialize SSE handshake"),
    }
}

/// Tell every dashboard whether the backend runs without storage.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    if let Ok(event) = ServerEvent::json(
        Some(EVENT_SYSTEM_STATUS.to_string()),
        &SystemStatus { degraded },
    ) {
        state.organizers().broadcast_all(event);
    }
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// releasing the organizer's hub once the client disconnects.
pub fn to_sse_stream(
    state: SharedState,
    organizer_id: String,
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                organizer_id = %organizer_id,
                                skipped,
                                "dashboard stream lagging"
                            );
                            continue;
                        }
                    }
                }
            }
        }

        drop(receiver);
        state.organizers().release(&organizer_id);
        info!(organizer_id = %organizer_id, "organizer SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn handshake_comes_first() {
        let state = AppState::new(AppConfig::default());
        let mut receiver = subscribe_organizer(&state, "org-1");

        let handshake = receiver.recv().await.unwrap();
        assert_eq!(handshake.event.as_deref(), Some(EVENT_HANDSHAKE));
        let payload: serde_json::Value = serde_json::from_str(&handshake.data).unwrap();
        assert_eq!(payload["organizer_id"], "org-1");
        assert_eq!(payload["degraded"], true);

        broadcast_system_status(&state, false);
        let status = receiver.recv().await.unwrap();
        assert_eq!(status.event.as_deref(), Some(EVENT_SYSTEM_STATUS));
        assert_eq!(status.data, r#"{"degraded":false}"#);
    }

    #[tokio::test]
    async fn handshakes_reach_every_listener_of_the_organizer() {
        let state = AppState::new(AppConfig::default());
        let mut first = subscribe_organizer(&state, "org-1");
        first.recv().await.unwrap();

        let _second = subscribe_organizer(&state, "org-1");
        let extra = first.recv().await.unwrap();
        assert_eq!(extra.event.as_deref(), Some(EVENT_HANDSHAKE));
        assert!(first.try_recv().is_err());
    }
}
