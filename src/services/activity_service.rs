use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        event_store::EventStore,
        models::{ActivityEntity, ActivityKind, ActivityStatus, EventEntity},
    },
    error::ServiceError,
    state::{SharedState, lifecycle::ActivityEvent},
};

/// Result of a successful activation.
#[derive(Debug, Clone)]
pub struct Activation {
    /// Event after the pointer update.
    pub event: EventEntity,
    /// Activity that is now live.
    pub activity: ActivityEntity,
    /// Previously live activity, completed as part of the switch.
    pub completed_activity_id: Option<Uuid>,
}

pub(crate) async fn load_event(
    store: &Arc<dyn EventStore>,
    event_id: Uuid,
) -> Result<EventEntity, ServiceError> {
    store
        .find_event(event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event `{event_id}` not found")))
}

pub(crate) async fn load_activity(
    store: &Arc<dyn EventStore>,
    activity_id: Uuid,
) -> Result<ActivityEntity, ServiceError> {
    store
        .find_activity(activity_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("activity `{activity_id}` not found")))
}

async fn load_activity_in_event(
    store: &Arc<dyn EventStore>,
    event_id: Uuid,
    activity_id: Uuid,
) -> Result<ActivityEntity, ServiceError> {
    let activity = load_activity(store, activity_id).await?;
    if activity.event_id != event_id {
        return Err(ServiceError::NotFound(format!(
            "activity `{activity_id}` not found in event `{event_id}`"
        )));
    }
    Ok(activity)
}

/// Fetch an activity, making sure it belongs to `event_id`.
pub async fn require_activity(
    state: &SharedState,
    event_id: Uuid,
    activity_id: Uuid,
) -> Result<ActivityEntity, ServiceError> {
    let store = state.require_event_store().await?;
    load_activity_in_event(&store, event_id, activity_id).await
}

/// Make `activity_id` the live activity of `event_id`.
///
/// A different activity that was live is completed first. The three writes are
/// not rolled back on failure; the caller retries the whole activation.
pub async fn activate(
    state: &SharedState,
    event_id: Uuid,
    activity_id: Uuid,
) -> Result<Activation, ServiceError> {
    let store = state.require_event_store().await?;

    state
        .run_transition(|| async {
            let mut event = load_event(&store, event_id).await?;
            let mut activity = load_activity_in_event(&store, event_id, activity_id).await?;
            let next = activity.status.transition(ActivityEvent::Activate)?;

            let mut completed_activity_id = None;
            if let Some(previous_id) = event.active_activity_id.filter(|id| *id != activity_id) {
                match store.find_activity(previous_id).await? {
                    Some(previous) if previous.status != ActivityStatus::Completed => {
                        store
                            .set_activity_status(previous_id, ActivityStatus::Completed)
                            .await?;
                        completed_activity_id = Some(previous_id);
                    }
                    Some(_) => {
                        debug!(activity_id = %previous_id, "previous activity already completed");
                        completed_activity_id = Some(previous_id);
                    }
                    None => {
                        warn!(
                            event_id = %event_id,
                            activity_id = %previous_id,
                            "event pointed at a missing activity"
                        );
                    }
                }
            }

            store.set_activity_status(activity_id, next).await?;
            store
                .set_event_active_activity(event_id, Some(activity_id))
                .await?;

            activity.status = next;
            event.active_activity_id = Some(activity_id);
            info!(
                event_id = %event_id,
                activity_id = %activity_id,
                completed = ?completed_activity_id,
                "activity activated"
            );

            Ok(Activation {
                event,
                activity,
                completed_activity_id,
            })
        })
        .await
}

/// Clear the event's live pointer. The activity keeps its status so it can be
/// activated again later.
pub async fn deactivate(
    state: &SharedState,
    event_id: Uuid,
    activity_id: Uuid,
) -> Result<EventEntity, ServiceError> {
    let store = state.require_event_store().await?;

    state
        .run_transition(|| async {
            let mut event = load_event(&store, event_id).await?;
            if event.active_activity_id != Some(activity_id) {
                return Err(ServiceError::InvalidState(format!(
                    "activity `{activity_id}` is not the active activity of event `{event_id}`"
                )));
            }

            store.set_event_active_activity(event_id, None).await?;
            event.active_activity_id = None;
            info!(event_id = %event_id, activity_id = %activity_id, "activity deactivated");
            Ok(event)
        })
        .await
}

/// Remove an activity that is not live.
pub async fn delete(
    state: &SharedState,
    event_id: Uuid,
    activity_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_event_store().await?;

    state
        .run_transition(|| async {
            load_activity_in_event(&store, event_id, activity_id).await?;
            let event = load_event(&store, event_id).await?;
            if event.active_activity_id == Some(activity_id) {
                return Err(ServiceError::Conflict(
                    "cannot delete the currently active activity".into(),
                ));
            }

            if !store.delete_activity(activity_id).await? {
                return Err(ServiceError::NotFound(format!(
                    "activity `{activity_id}` not found"
                )));
            }
            Ok(())
        })
        .await?;

    state.timers().reset(activity_id);
    info!(event_id = %event_id, activity_id = %activity_id, "activity deleted");
    Ok(())
}

/// Complete a running quiz.
pub async fn end(state: &SharedState, activity_id: Uuid) -> Result<ActivityEntity, ServiceError> {
    let store = state.require_event_store().await?;

    state
        .run_transition(|| async {
            let mut activity = load_activity(&store, activity_id).await?;
            if !matches!(activity.kind, ActivityKind::Quiz { .. }) {
                return Err(ServiceError::WrongType(format!(
                    "activity `{activity_id}` is not a quiz"
                )));
            }

            let next = activity.status.transition(ActivityEvent::Complete)?;
            store.set_activity_status(activity_id, next).await?;
            activity.status = next;
            Ok(activity)
        })
        .await
}

/// The event's live activity, if any.
pub async fn active_activity(
    state: &SharedState,
    event_id: Uuid,
) -> Result<Option<ActivityEntity>, ServiceError> {
    let store = state.require_event_store().await?;
    let event = load_event(&store, event_id).await?;
    match event.active_activity_id {
        Some(activity_id) => Ok(store.find_activity(activity_id).await?),
        None => Ok(None),
    }
}
