//! Per-question countdown: ticks the room every interval, then publishes results.

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    services::{quiz_service, room_events},
    state::{SharedState, TimerToken},
};

/// Start (or restart) the countdown of the quiz `activity_id`.
///
/// A previous countdown of the same quiz is aborted. When the countdown runs
/// out the question is closed, then `question-ended`, `answer-statistics` and
/// `leaderboard-updated` are published in that order.
pub fn start(
    state: &SharedState,
    event_id: Uuid,
    activity_id: Uuid,
    question_id: Uuid,
    timer_seconds: u32,
) -> TimerToken {
    let task_state = state.clone();
    state
        .timers()
        .start(activity_id, question_id, move |token| async move {
            run(task_state, event_id, token, timer_seconds).await;
        })
}

async fn run(state: SharedState, event_id: Uuid, token: TimerToken, timer_seconds: u32) {
    let tick = state.config().quiz().tick_interval;
    let mut ticker = interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut remaining = timer_seconds;

    while remaining > 0 {
        ticker.tick().await;
        remaining -= 1;
        room_events::broadcast_timer_tick(&state, event_id, remaining);
    }

    state.timers().close(token).await;
    debug!(
        activity_id = %token.activity_id,
        question_id = %token.question_id,
        "question time is up"
    );
    room_events::broadcast_question_ended(&state, event_id, token.question_id);

    match quiz_service::question_statistics(&state, token.activity_id, token.question_id).await {
        Ok(statistics) => room_events::broadcast_statistics(&state, event_id, statistics),
        Err(err) => warn!(
            question_id = %token.question_id,
            error = %err,
            "failed to compute answer statistics"
        ),
    }
    match quiz_service::leaderboard(&state, token.activity_id).await {
        Ok(leaderboard) => room_events::broadcast_leaderboard(&state, event_id, leaderboard),
        Err(err) => warn!(event_id = %event_id, error = %err, "failed to compute leaderboard"),
    }

    state.timers().clear(token);
}
