//! Fan-out helpers: room-scoped WebSocket broadcasts and organizer dashboard notices.

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::models::{ActivityEntity, EventEntity, ParticipantEntity},
    dto::{
        activity::{ActivitySummary, DisplayedQuestion, ParticipantSummary, QuizSummary},
        sse::{ActivityActivatedNotice, ParticipantJoinedNotice, QuizEndedNotice, ServerEvent},
        ws::{RoomEvent, WAITING_MESSAGE},
    },
    services::scoring::{LeaderboardEntry, QuestionStatistics},
    state::SharedState,
};

const NOTICE_PARTICIPANT_JOINED: &str = "participant-joined";
const NOTICE_ACTIVITY_ACTIVATED: &str = "activity-activated";
const NOTICE_QUIZ_ENDED: &str = "quiz-ended";

/// Publish one message to every connection of the event.
pub fn publish(state: &SharedState, event_id: Uuid, message: &RoomEvent) {
    let delivered = state.rooms().publish(event_id, message);
    debug!(event_id = %event_id, delivered, "room message published");
}

/// Announce a newcomer to the room and to the organizer's dashboard.
pub fn broadcast_participant_joined(
    state: &SharedState,
    event: &EventEntity,
    participant: &ParticipantEntity,
    participants: &[ParticipantEntity],
) {
    let summary = ParticipantSummary::from(participant);
    publish(
        state,
        event.id,
        &RoomEvent::ParticipantJoined {
            participant: summary.clone(),
        },
    );
    publish(
        state,
        event.id,
        &RoomEvent::ParticipantsUpdated {
            participants: participants.iter().map(Into::into).collect(),
        },
    );

    let notice = ParticipantJoinedNotice {
        event_id: event.id,
        participant: summary,
        participant_count: event.participant_count,
    };
    send_organizer_event(state, event, NOTICE_PARTICIPANT_JOINED, &notice);
}

/// Tell the room which activity is live.
pub fn broadcast_activity_activated(
    state: &SharedState,
    event: &EventEntity,
    activity: &ActivityEntity,
) {
    let summary = ActivitySummary::from(activity);
    publish(
        state,
        event.id,
        &RoomEvent::ActivityActivated {
            activity: summary.clone(),
        },
    );

    let notice = ActivityActivatedNotice {
        event_id: event.id,
        activity: summary,
    };
    send_organizer_event(state, event, NOTICE_ACTIVITY_ACTIVATED, &notice);
}

/// Tell the room nothing is live anymore.
pub fn broadcast_waiting(state: &SharedState, event_id: Uuid) {
    publish(
        state,
        event_id,
        &RoomEvent::WaitingForActivity {
            message: WAITING_MESSAGE.into(),
        },
    );
}

/// Announce that the quiz is running and how many questions it has.
pub fn broadcast_quiz_started(
    state: &SharedState,
    event_id: Uuid,
    activity_id: Uuid,
    total_questions: usize,
) {
    publish(
        state,
        event_id,
        &RoomEvent::QuizStarted {
            activity_id,
            total_questions,
        },
    );
}

/// Put a question, without its answer, on every screen of the room.
pub fn broadcast_question_displayed(
    state: &SharedState,
    event_id: Uuid,
    displayed: &DisplayedQuestion,
) {
    publish(
        state,
        event_id,
        &RoomEvent::QuestionDisplayed(displayed.clone()),
    );
}

/// Seconds left on the current question.
pub fn broadcast_timer_tick(state: &SharedState, event_id: Uuid, remaining_seconds: u32) {
    publish(state, event_id, &RoomEvent::TimerTick { remaining_seconds });
}

/// The current question ran out of time.
pub fn broadcast_question_ended(state: &SharedState, event_id: Uuid, question_id: Uuid) {
    publish(state, event_id, &RoomEvent::QuestionEnded { question_id });
}

/// Answer distribution of the question that just closed.
pub fn broadcast_statistics(
    state: &SharedState,
    event_id: Uuid,
    statistics: QuestionStatistics,
) {
    publish(state, event_id, &RoomEvent::AnswerStatistics { statistics });
}

/// Standings after the question that just closed.
pub fn broadcast_leaderboard(
    state: &SharedState,
    event_id: Uuid,
    leaderboard: Vec<LeaderboardEntry>,
) {
    publish(state, event_id, &RoomEvent::LeaderboardUpdated { leaderboard });
}

/// Publish the final standings to the room and the organizer's dashboard.
pub fn broadcast_quiz_ended(
    state: &SharedState,
    event: &EventEntity,
    activity_id: Uuid,
    summary: &QuizSummary,
) {
    publish(
        state,
        event.id,
        &RoomEvent::QuizEnded {
            final_leaderboard: summary.final_leaderboard.clone(),
            top_three: summary.top_three.clone(),
        },
    );

    let notice = QuizEndedNotice {
        event_id: event.id,
        activity_id,
        top_three: summary.top_three.clone(),
        participant_count: summary.participant_count,
    };
    send_organizer_event(state, event, NOTICE_QUIZ_ENDED, &notice);
}

fn send_organizer_event<T: Serialize>(
    state: &SharedState,
    event: &EventEntity,
    name: &str,
    payload: &T,
) {
    let Some(organizer_id) = event.organizer_id.as_deref() else {
        return;
    };

    match ServerEvent::json(Some(name.to_string()), payload) {
        Ok(server_event) => state.organizers().broadcast(organizer_id, server_event),
        Err(err) => warn!(error = %err, event = name, "failed to serialize organizer notice"),
    }
}
