use thiserror::Error;

use crate::dao::models::ActivityStatus;

/// Events that drive an activity through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    /// Organizer makes the activity the event's live one.
    Activate,
    /// Organizer starts running a quiz.
    Start,
    /// The activity is over, either ended explicitly or replaced by another.
    Complete,
}

/// Error returned when an event cannot be applied to an activity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while activity is {from}")]
pub struct InvalidTransition {
    /// Status the activity was in.
    pub from: ActivityStatus,
    /// Rejected event.
    pub event: ActivityEvent,
}

impl ActivityStatus {
    /// Compute the status reached by applying `event`.
    ///
    /// `draft` and `ready` are authored elsewhere; the live session only moves
    /// activities into `active` and on to `completed`. Completed activities may
    /// be activated again but a quiz cannot be restarted from `completed`
    /// without going through activation first.
    pub fn transition(self, event: ActivityEvent) -> Result<ActivityStatus, InvalidTransition> {
        let next = match (self, event) {
            (
                ActivityStatus::Ready | ActivityStatus::Active | ActivityStatus::Completed,
                ActivityEvent::Activate,
            ) => ActivityStatus::Active,
            (ActivityStatus::Ready | ActivityStatus::Active, ActivityEvent::Start) => {
                ActivityStatus::Active
            }
            (ActivityStatus::Active, ActivityEvent::Complete) => ActivityStatus::Completed,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
