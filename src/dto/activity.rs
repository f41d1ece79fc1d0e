use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{
        ActivityEntity, ActivityKind, ActivityStatus, ActivityType, AnswerOption,
        ParticipantEntity, QuestionEntity,
    },
    dto::format_system_time,
    services::scoring::LeaderboardEntry,
};

/// Activity as shown to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    #[schema(value_type = String)]
    pub activity_type: ActivityType,
    #[schema(value_type = String)]
    pub status: ActivityStatus,
    pub order: u32,
    /// Only set for quizzes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<usize>,
}

impl From<&ActivityEntity> for ActivitySummary {
    fn from(activity: &ActivityEntity) -> Self {
        let total_questions = match &activity.kind {
            ActivityKind::Quiz { question_ids, .. } => Some(question_ids.len()),
            ActivityKind::Poll { .. } | ActivityKind::Raffle { .. } => None,
        };

        Self {
            id: activity.id,
            event_id: activity.event_id,
            name: activity.name.clone(),
            activity_type: activity.kind.activity_type(),
            status: activity.status,
            order: activity.order,
            total_questions,
        }
    }
}

/// Public view of an answer option.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OptionView {
    pub id: String,
    pub text: String,
    pub color: String,
    pub shape: String,
}

impl From<&AnswerOption> for OptionView {
    fn from(option: &AnswerOption) -> Self {
        Self {
            id: option.id.clone(),
            text: option.text.clone(),
            color: option.color.clone(),
            shape: option.shape.clone(),
        }
    }
}

/// Question as broadcast while it is open. The correct option is withheld.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: Uuid,
    pub text: String,
    pub options: Vec<OptionView>,
    pub timer_seconds: u32,
}

impl From<&QuestionEntity> for QuestionView {
    fn from(question: &QuestionEntity) -> Self {
        Self {
            id: question.id,
            text: question.text.clone(),
            options: question.options.iter().map(Into::into).collect(),
            timer_seconds: question.timer_seconds,
        }
    }
}

/// Display payload returned when a question is put on screen.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisplayedQuestion {
    pub question: QuestionView,
    /// 1-based position in the quiz.
    pub question_number: usize,
    pub total_questions: usize,
    /// Unix timestamp in milliseconds.
    pub start_time: u64,
}

/// Participant as listed in the lobby and the dashboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub id: Uuid,
    pub name: String,
    pub score: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    /// RFC 3339 timestamp.
    pub joined_at: String,
}

impl From<&ParticipantEntity> for ParticipantSummary {
    fn from(participant: &ParticipantEntity) -> Self {
        Self {
            id: participant.id,
            name: participant.name.clone(),
            score: participant.score,
            current_streak: participant.current_streak,
            longest_streak: participant.longest_streak,
            joined_at: format_system_time(participant.joined_at),
        }
    }
}

/// Outcome of an answer submission, sent to the submitter only.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub is_correct: bool,
    pub points_earned: u32,
    pub correct_option_id: String,
    pub current_streak: u32,
}

/// Final standings of a quiz.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub final_leaderboard: Vec<LeaderboardEntry>,
    pub top_three: Vec<LeaderboardEntry>,
    pub participant_count: usize,
}

/// Response of the activation endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivationResponse {
    pub activity: ActivitySummary,
    /// Activity that was live before and got completed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_activity_id: Option<Uuid>,
}

/// Response of the deactivation endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeactivationResponse {
    pub event_id: Uuid,
    pub activity_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_summary_carries_question_count() {
        let activity = ActivityEntity {
            id: Uuid::nil(),
            event_id: Uuid::nil(),
            name: "Round 1".into(),
            status: ActivityStatus::Ready,
            order: 1,
            kind: ActivityKind::Quiz {
                question_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
                current_question_index: None,
            },
        };

        let json = serde_json::to_value(ActivitySummary::from(&activity)).unwrap();
        assert_eq!(json["type"], "quiz");
        assert_eq!(json["status"], "ready");
        assert_eq!(json["totalQuestions"], 2);
        assert_eq!(json["eventId"], Uuid::nil().to_string());
    }

    #[test]
    fn question_view_hides_the_answer() {
        let question = QuestionEntity {
            id: Uuid::nil(),
            event_id: Uuid::nil(),
            activity_id: Uuid::nil(),
            text: "2 + 2?".into(),
            options: vec![AnswerOption {
                id: "opt1".into(),
                text: "4".into(),
                color: "#26890c".into(),
                shape: "square".into(),
            }],
            correct_option_id: "opt1".into(),
            timer_seconds: 20,
            order: 0,
        };

        let json = serde_json::to_value(QuestionView::from(&question)).unwrap();
        assert!(json.get("correctOptionId").is_none());
        assert_eq!(json["timerSeconds"], 20);
        assert_eq!(json["options"][0]["shape"], "square");
    }
}
