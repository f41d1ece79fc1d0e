//! Organizer commands: every call that changes what the room sees goes through here
//! so timers and broadcasts stay in step with the stored state.

use axum::extract::ws::Message;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::EventEntity,
    error::ServiceError,
    services::{
        activity_service::{self, Activation},
        countdown, participant_service,
        quiz_service::{self, EndedQuiz, ShownQuestion, StartedQuiz},
        room_events,
        websocket_service::send_message_to_websocket,
    },
    state::{ConnectionId, SharedState},
};

/// Activate an activity and announce it to the event's room.
pub async fn activate_activity(
    state: &SharedState,
    event_id: Uuid,
    activity_id: Uuid,
) -> Result<Activation, ServiceError> {
    let activation = activity_service::activate(state, event_id, activity_id).await?;

    if let Some(completed) = activation
        .completed_activity_id
        .filter(|id| state.timers().cancel(*id))
    {
        debug!(activity_id = %completed, "countdown of completed activity cancelled");
    }
    room_events::broadcast_activity_activated(state, &activation.event, &activation.activity);
    Ok(activation)
}

/// Clear the live activity and tell the room to wait.
pub async fn deactivate_activity(
    state: &SharedState,
    event_id: Uuid,
    activity_id: Uuid,
) -> Result<EventEntity, ServiceError> {
    let event = activity_service::deactivate(state, event_id, activity_id).await?;
    state.timers().cancel(activity_id);
    room_events::broadcast_waiting(state, event_id);
    Ok(event)
}

/// Start the quiz and tell the room.
pub async fn start_quiz(
    state: &SharedState,
    activity_id: Uuid,
) -> Result<StartedQuiz, ServiceError> {
    let started = quiz_service::start(state, activity_id).await?;
    room_events::broadcast_quiz_started(
        state,
        started.activity.event_id,
        activity_id,
        started.total_questions,
    );
    Ok(started)
}

/// Show a question to the room and start its countdown.
pub async fn next_question(
    state: &SharedState,
    activity_id: Uuid,
    question_id: Uuid,
) -> Result<ShownQuestion, ServiceError> {
    let shown = quiz_service::show_question(state, activity_id, question_id).await?;
    room_events::broadcast_question_displayed(state, shown.event_id, &shown.display);
    countdown::start(
        state,
        shown.event_id,
        activity_id,
        question_id,
        shown.timer_seconds,
    );
    Ok(shown)
}

/// Complete the quiz and publish its final standings.
pub async fn end_quiz(state: &SharedState, activity_id: Uuid) -> Result<EndedQuiz, ServiceError> {
    let ended = quiz_service::end(state, activity_id).await?;
    state.timers().cancel(activity_id);

    let store = state.require_event_store().await?;
    let event = activity_service::load_event(&store, ended.activity.event_id).await?;
    room_events::broadcast_quiz_ended(state, &event, activity_id, &ended.summary);
    Ok(ended)
}

/// Add an organizer's monitoring connection to the event's room.
pub async fn join_as_organizer(
    state: &SharedState,
    connection_id: ConnectionId,
    tx: &UnboundedSender<Message>,
    event_id: Uuid,
) -> Result<EventEntity, ServiceError> {
    let store = state.require_event_store().await?;
    let event = activity_service::load_event(&store, event_id).await?;
    let current = participant_service::current_activity_notice(state, &event).await?;

    state.rooms().join(event_id, connection_id, tx.clone());
    info!(event_id = %event_id, connection_id = %connection_id, "organizer joined");

    send_message_to_websocket(tx, &current);
    Ok(event)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use super::*;
    use crate::{
        dao::{event_store::EventStore, models::ActivityStatus},
        services::quiz_service::tests::{Fixture, add_participant, fixture},
    };

    fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            frames.push(serde_json::from_str(text.as_str()).unwrap());
        }
        frames
    }

    fn organizer(fixture: &Fixture) -> UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        fixture.state.rooms().join(fixture.event_id, Uuid::new_v4(), tx);
        rx
    }

    #[tokio::test]
    async fn activation_is_announced_to_the_room() {
        let fixture = fixture(ActivityStatus::Ready);
        let mut rx = organizer(&fixture);

        let activation = activate_activity(&fixture.state, fixture.event_id, fixture.activity_id)
            .await
            .unwrap();
        assert_eq!(activation.activity.status, ActivityStatus::Active);

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "activity-activated");
        assert_eq!(frames[0]["activity"]["totalQuestions"], 2);

        deactivate_activity(&fixture.state, fixture.event_id, fixture.activity_id)
            .await
            .unwrap();
        assert_eq!(drain(&mut rx)[0]["type"], "waiting-for-activity");
    }

    #[tokio::test]
    async fn organizer_join_receives_the_current_state() {
        let fixture = fixture(ActivityStatus::Ready);
        let (tx, mut rx) = mpsc::unbounded_channel();

        join_as_organizer(&fixture.state, Uuid::new_v4(), &tx, fixture.event_id)
            .await
            .unwrap();
        assert_eq!(drain(&mut rx)[0]["type"], "waiting-for-activity");

        activate_activity(&fixture.state, fixture.event_id, fixture.activity_id)
            .await
            .unwrap();
        drain(&mut rx);

        let (late_tx, mut late_rx) = mpsc::unbounded_channel();
        join_as_organizer(&fixture.state, Uuid::new_v4(), &late_tx, fixture.event_id)
            .await
            .unwrap();
        assert_eq!(drain(&mut late_rx)[0]["type"], "activity-activated");
    }

    #[tokio::test(start_paused = true)]
    async fn ending_the_quiz_cancels_the_countdown() {
        let fixture = fixture(ActivityStatus::Ready);
        let mut rx = organizer(&fixture);
        let alice = add_participant(&fixture, "Alice").await;

        activate_activity(&fixture.state, fixture.event_id, fixture.activity_id)
            .await
            .unwrap();
        start_quiz(&fixture.state, fixture.activity_id).await.unwrap();
        next_question(&fixture.state, fixture.activity_id, fixture.questions[0])
            .await
            .unwrap();
        assert_eq!(fixture.state.timers().active_count(), 1);

        let ended = end_quiz(&fixture.state, fixture.activity_id).await.unwrap();
        assert_eq!(ended.summary.final_leaderboard[0].participant_id, alice);
        assert_eq!(fixture.state.timers().active_count(), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        let frames = drain(&mut rx);
        let kinds: Vec<&str> = frames
            .iter()
            .map(|frame| frame["type"].as_str().unwrap_or_default())
            .collect();
        assert_eq!(
            kinds,
            [
                "activity-activated",
                "quiz-started",
                "question-displayed",
                "quiz-ended"
            ]
        );

        let stored = fixture
            .store
            .find_activity(fixture.activity_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ActivityStatus::Completed);
    }

    #[tokio::test]
    async fn switching_activities_stops_the_previous_countdown() {
        let fixture = fixture(ActivityStatus::Ready);
        let other = Uuid::new_v4();
        fixture.store.insert_activity(
            crate::services::activity_service::tests::quiz(
                other,
                fixture.event_id,
                ActivityStatus::Ready,
            ),
        );

        activate_activity(&fixture.state, fixture.event_id, fixture.activity_id)
            .await
            .unwrap();
        start_quiz(&fixture.state, fixture.activity_id).await.unwrap();
        next_question(&fixture.state, fixture.activity_id, fixture.questions[0])
            .await
            .unwrap();

        let activation = activate_activity(&fixture.state, fixture.event_id, other)
            .await
            .unwrap();
        assert_eq!(activation.completed_activity_id, Some(fixture.activity_id));
        assert_eq!(fixture.state.timers().active_count(), 0);
    }
}
