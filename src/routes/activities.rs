use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::activity::{ActivationResponse, ActivitySummary, DeactivationResponse, QuizSummary},
    error::AppError,
    services::{
        activity_service, organizer_service, quiz_service,
        scoring::{LeaderboardEntry, QuestionStatistics},
    },
    state::SharedState,
};

/// Organizer controls over the activities of an event.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/events/{event_id}/activities/{activity_id}",
            delete(delete_activity),
        )
        .route(
            "/events/{event_id}/activities/{activity_id}/activate",
            post(activate_activity),
        )
        .route(
            "/events/{event_id}/activities/{activity_id}/deactivate",
            post(deactivate_activity),
        )
        .route(
            "/events/{event_id}/activities/{activity_id}/end",
            post(end_activity),
        )
        .route(
            "/events/{event_id}/activities/{activity_id}/leaderboard",
            get(leaderboard),
        )
        .route(
            "/events/{event_id}/activities/{activity_id}/questions/{question_id}/statistics",
            get(question_statistics),
        )
}

/// Make an activity the live one, completing the previous live activity.
#[utoipa::path(
    post,
    path = "/events/{event_id}/activities/{activity_id}/activate",
    tag = "activities",
    params(
        ("event_id" = String, Path, description = "Identifier of the event"),
        ("activity_id" = String, Path, description = "Identifier of the activity to activate")
    ),
    responses(
        (status = 200, description = "Activity activated", body = ActivationResponse),
        (status = 404, description = "Unknown event or activity"),
        (status = 409, description = "Activity cannot be activated in its current status")
    )
)]
pub async fn activate_activity(
    State(state): State<SharedState>,
    Path((event_id, activity_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ActivationResponse>, AppError> {
    let activation = organizer_service::activate_activity(&state, event_id, activity_id).await?;
    Ok(Json(ActivationResponse {
        activity: ActivitySummary::from(&activation.activity),
        completed_activity_id: activation.completed_activity_id,
    }))
}

/// Clear the event's live activity without changing its status.
#[utoipa::path(
    post,
    path = "/events/{event_id}/activities/{activity_id}/deactivate",
    tag = "activities",
    params(
        ("event_id" = String, Path, description = "Identifier of the event"),
        ("activity_id" = String, Path, description = "Identifier of the live activity")
    ),
    responses(
        (status = 200, description = "Activity deactivated", body = DeactivationResponse),
        (status = 409, description = "Activity is not the live one")
    )
)]
pub async fn deactivate_activity(
    State(state): State<SharedState>,
    Path((event_id, activity_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeactivationResponse>, AppError> {
    organizer_service::deactivate_activity(&state, event_id, activity_id).await?;
    Ok(Json(DeactivationResponse {
        event_id,
        activity_id,
    }))
}

/// End a running quiz and return its final standings.
#[utoipa::path(
    post,
    path = "/events/{event_id}/activities/{activity_id}/end",
    tag = "activities",
    params(
        ("event_id" = String, Path, description = "Identifier of the event"),
        ("activity_id" = String, Path, description = "Identifier of the quiz")
    ),
    responses(
        (status = 200, description = "Quiz ended", body = QuizSummary),
        (status = 409, description = "Quiz is not running"),
        (status = 422, description = "Activity is not a quiz")
    )
)]
pub async fn end_activity(
    State(state): State<SharedState>,
    Path((event_id, activity_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<QuizSummary>, AppError> {
    activity_service::require_activity(&state, event_id, activity_id).await?;
    let ended = organizer_service::end_quiz(&state, activity_id).await?;
    Ok(Json(ended.summary))
}

/// Delete an activity that is not live.
#[utoipa::path(
    delete,
    path = "/events/{event_id}/activities/{activity_id}",
    tag = "activities",
    params(
        ("event_id" = String, Path, description = "Identifier of the event"),
        ("activity_id" = String, Path, description = "Identifier of the activity to delete")
    ),
    responses(
        (status = 204, description = "Activity deleted"),
        (status = 404, description = "Unknown activity"),
        (status = 409, description = "Activity is currently live")
    )
)]
pub async fn delete_activity(
    State(state): State<SharedState>,
    Path((event_id, activity_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    activity_service::delete(&state, event_id, activity_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Current ranking of the quiz's event.
#[utoipa::path(
    get,
    path = "/events/{event_id}/activities/{activity_id}/leaderboard",
    tag = "activities",
    params(
        ("event_id" = String, Path, description = "Identifier of the event"),
        ("activity_id" = String, Path, description = "Identifier of the quiz")
    ),
    responses((status = 200, description = "Ranked participants", body = [LeaderboardEntry]))
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
    Path((event_id, activity_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    activity_service::require_activity(&state, event_id, activity_id).await?;
    Ok(Json(quiz_service::leaderboard(&state, activity_id).await?))
}

/// Answer distribution of one question.
#[utoipa::path(
    get,
    path = "/events/{event_id}/activities/{activity_id}/questions/{question_id}/statistics",
    tag = "activities",
    params(
        ("event_id" = String, Path, description = "Identifier of the event"),
        ("activity_id" = String, Path, description = "Identifier of the quiz"),
        ("question_id" = String, Path, description = "Identifier of the question")
    ),
    responses((status = 200, description = "Answer statistics", body = QuestionStatistics))
)]
pub async fn question_statistics(
    State(state): State<SharedState>,
    Path((event_id, activity_id, question_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<QuestionStatistics>, AppError> {
    activity_service::require_activity(&state, event_id, activity_id).await?;
    let statistics = quiz_service::question_statistics(&state, activity_id, question_id).await?;
    Ok(Json(statistics))
}
