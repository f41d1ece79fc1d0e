use axum::extract::ws::Message;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{EventEntity, ParticipantEntity},
    dto::{
        activity::{ActivitySummary, ParticipantSummary},
        validation::validate_participant_name,
        ws::{ConnectionEvent, RoomEvent, WAITING_MESSAGE},
    },
    error::ServiceError,
    services::{activity_service, room_events, websocket_service::send_message_to_websocket},
    state::{ConnectionId, SharedState},
};

/// Register a participant and add the connection to the event's room.
///
/// The joiner receives `joined-event`, then the room sees `participant-joined`
/// and `participants-updated`, then the joiner receives the live activity or a
/// waiting notice.
pub async fn join_event(
    state: &SharedState,
    connection_id: ConnectionId,
    tx: &UnboundedSender<Message>,
    event_id: Uuid,
    participant_name: &str,
) -> Result<ParticipantEntity, ServiceError> {
    validate_participant_name(participant_name).map_err(|err| {
        ServiceError::Validation(
            err.message
                .map(|message| message.into_owned())
                .unwrap_or_else(|| "invalid participant name".into()),
        )
    })?;

    let store = state.require_event_store().await?;
    activity_service::load_event(&store, event_id).await?;

    let participant = ParticipantEntity::new(event_id, participant_name.trim().to_owned());
    store.save_participant(participant.clone()).await?;
    store.increment_participant_count(event_id).await?;
    let event = activity_service::load_event(&store, event_id).await?;

    let participants = store.list_participants(event_id).await?;
    let current = current_activity_notice(state, &event).await?;

    state.rooms().join(event_id, connection_id, tx.clone());
    info!(
        event_id = %event_id,
        participant_id = %participant.id,
        name = %participant.name,
        "participant joined"
    );

    send_message_to_websocket(
        tx,
        &ConnectionEvent::JoinedEvent {
            participant: ParticipantSummary::from(&participant),
        },
    );
    room_events::broadcast_participant_joined(state, &event, &participant, &participants);
    send_message_to_websocket(tx, &current);
    Ok(participant)
}

/// What a newly joined connection is told: the live activity, or that nothing is live.
pub(crate) async fn current_activity_notice(
    state: &SharedState,
    event: &EventEntity,
) -> Result<RoomEvent, ServiceError> {
    let active = match event.active_activity_id {
        Some(activity_id) => {
            let store = state.require_event_store().await?;
            store.find_activity(activity_id).await?
        }
        None => None,
    };

    Ok(match active {
        Some(activity) => RoomEvent::ActivityActivated {
            activity: ActivitySummary::from(&activity),
        },
        None => RoomEvent::WaitingForActivity {
            message: WAITING_MESSAGE.into(),
        },
    })
}

/// Remove a connection from its room.
pub fn leave(state: &SharedState, event_id: Uuid, connection_id: ConnectionId) {
    state.rooms().leave(event_id, connection_id);
}

/// Participants of an event in join order.
pub async fn list_participants(
    state: &SharedState,
    event_id: Uuid,
) -> Result<Vec<ParticipantEntity>, ServiceError> {
    let store = state.require_event_store().await?;
    activity_service::load_event(&store, event_id).await?;
    Ok(store.list_participants(event_id).await?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            event_store::{EventStore, memory::MemoryEventStore},
            models::ActivityStatus,
        },
        services::activity_service::tests::{event, quiz},
        state::AppState,
    };

    fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            frames.push(serde_json::from_str(text.as_str()).unwrap());
        }
        frames
    }

    fn types(frames: &[Value]) -> Vec<&str> {
        frames
            .iter()
            .map(|frame| frame["type"].as_str().unwrap_or_default())
            .collect()
    }

    #[tokio::test]
    async fn joiner_gets_a_waiting_notice_when_nothing_is_live() {
        let store = MemoryEventStore::new();
        let event_id = Uuid::new_v4();
        store.insert_event(event(event_id));
        let state = AppState::with_store(AppConfig::default(), Arc::new(store.clone()));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let participant = join_event(&state, Uuid::new_v4(), &tx, event_id, "  Alice ")
            .await
            .unwrap();
        assert_eq!(participant.name, "Alice");

        let frames = drain(&mut rx);
        assert_eq!(
            types(&frames),
            [
                "joined-event",
                "participant-joined",
                "participants-updated",
                "waiting-for-activity"
            ]
        );
        assert_eq!(frames[0]["participant"]["name"], "Alice");

        let stored = store.find_event(event_id).await.unwrap().unwrap();
        assert_eq!(stored.participant_count, 1);
        assert_eq!(state.rooms().member_count(event_id), 1);
    }

    #[tokio::test]
    async fn joiner_gets_the_live_activity() {
        let store = MemoryEventStore::new();
        let event_id = Uuid::new_v4();
        let activity_id = Uuid::new_v4();
        store.insert_event(EventEntity {
            active_activity_id: Some(activity_id),
            ..event(event_id)
        });
        store.insert_activity(quiz(activity_id, event_id, ActivityStatus::Active));
        let state = AppState::with_store(AppConfig::default(), Arc::new(store));

        let (early_tx, mut early_rx) = mpsc::unbounded_channel();
        join_event(&state, Uuid::new_v4(), &early_tx, event_id, "Alice")
            .await
            .unwrap();
        drain(&mut early_rx);

        let (tx, mut rx) = mpsc::unbounded_channel();
        join_event(&state, Uuid::new_v4(), &tx, event_id, "Bob")
            .await
            .unwrap();

        let frames = drain(&mut rx);
        let last = frames.last().unwrap();
        assert_eq!(last["type"], "activity-activated");
        assert_eq!(last["activity"]["id"], activity_id.to_string());
        assert_eq!(frames[2]["participants"].as_array().unwrap().len(), 2);

        let seen_by_alice = drain(&mut early_rx);
        assert_eq!(
            types(&seen_by_alice),
            ["participant-joined", "participants-updated"]
        );
    }

    #[tokio::test]
    async fn unknown_events_and_blank_names_are_rejected() {
        let store = MemoryEventStore::new();
        let event_id = Uuid::new_v4();
        store.insert_event(event(event_id));
        let state = AppState::with_store(AppConfig::default(), Arc::new(store));
        let (tx, _rx) = mpsc::unbounded_channel();

        assert!(matches!(
            join_event(&state, Uuid::new_v4(), &tx, Uuid::new_v4(), "Alice").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            join_event(&state, Uuid::new_v4(), &tx, event_id, "   ").await,
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(state.rooms().room_count(), 0);
    }
}
