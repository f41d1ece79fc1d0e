use serde::{Deserialize, Serialize};
use std::{fmt, time::SystemTime};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Lifecycle status of an event as a whole.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Being authored; not visible to participants yet.
    #[default]
    Draft,
    /// Lobby is open, participants may join.
    #[serde(alias = "waiting")]
    Setup,
    /// Activities are being run.
    #[serde(alias = "active")]
    Live,
    /// Event is over.
    Completed,
}

/// Lifecycle status of a single activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Still being configured.
    #[default]
    Draft,
    /// Configured and can be activated.
    Ready,
    /// Currently (or last) running.
    Active,
    /// Finished; may be activated again.
    Completed,
}

impl ActivityStatus {
    /// Wire name, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityStatus::Draft => "draft",
            ActivityStatus::Ready => "ready",
            ActivityStatus::Active => "active",
            ActivityStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top level session created by an organizer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEntity {
    /// Stable identifier for the event.
    pub id: Uuid,
    /// Display name of the event.
    pub name: String,
    /// Owner used for the cross-event dashboard stream.
    #[serde(default)]
    pub organizer_id: Option<String>,
    /// Current lifecycle status.
    #[serde(default)]
    pub status: EventStatus,
    /// The activity currently live for this event, if any.
    #[serde(default)]
    pub active_activity_id: Option<Uuid>,
    /// Number of participants who joined so far.
    #[serde(default)]
    pub participant_count: u32,
}

/// Option of a poll activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollOption {
    /// Option identifier.
    pub id: String,
    /// Label shown to participants.
    pub text: String,
}

/// Type specific payload of an activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityKind {
    /// Timed questions with scoring.
    Quiz {
        /// Ordered question references.
        question_ids: Vec<Uuid>,
        /// Index into `question_ids` of the question on screen.
        #[serde(default)]
        current_question_index: Option<usize>,
    },
    /// Untimed, unscored vote.
    Poll {
        /// Question put to the audience.
        question: String,
        /// Choices offered.
        options: Vec<PollOption>,
        /// Whether a participant may pick more than one option.
        #[serde(default)]
        allow_multiple: bool,
    },
    /// Prize draw among participants.
    Raffle {
        /// Description of the prize.
        prize: String,
        /// Number of winners to draw.
        winner_count: u32,
    },
}

/// Discriminant of [`ActivityKind`] used in error messages and summaries.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// See [`ActivityKind::Quiz`].
    Quiz,
    /// See [`ActivityKind::Poll`].
    Poll,
    /// See [`ActivityKind::Raffle`].
    Raffle,
}

impl ActivityKind {
    /// Tag of the variant.
    pub fn activity_type(&self) -> ActivityType {
        match self {
            ActivityKind::Quiz { .. } => ActivityType::Quiz,
            ActivityKind::Poll { .. } => ActivityType::Poll,
            ActivityKind::Raffle { .. } => ActivityType::Raffle,
        }
    }
}

/// One quiz, poll, or raffle unit belonging to an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEntity {
    /// Stable identifier for the activity.
    pub id: Uuid,
    /// Parent event.
    pub event_id: Uuid,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    #[serde(default)]
    pub status: ActivityStatus,
    /// Position among the event's activities.
    #[serde(default)]
    pub order: u32,
    /// Type specific payload.
    #[serde(flatten)]
    pub kind: ActivityKind,
}

/// Selectable answer of a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerOption {
    /// Option identifier, unique within the question.
    pub id: String,
    /// Label shown to participants.
    pub text: String,
    /// Display color (CSS color string).
    pub color: String,
    /// Display shape name.
    pub shape: String,
}

/// Timed multiple-choice question of a quiz activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[validate(schema(function = "validate_correct_option"))]
pub struct QuestionEntity {
    /// Stable identifier for the question.
    pub id: Uuid,
    /// Parent event.
    pub event_id: Uuid,
    /// Parent quiz activity.
    pub activity_id: Uuid,
    /// Question text.
    #[validate(length(min = 1))]
    pub text: String,
    /// Between two and five options.
    #[validate(length(min = 2, max = 5))]
    pub options: Vec<AnswerOption>,
    /// Identifier of the right option.
    pub correct_option_id: String,
    /// Time allowed to answer.
    #[validate(range(min = 1))]
    pub timer_seconds: u32,
    /// Position within the quiz.
    #[serde(default)]
    pub order: u32,
}

impl QuestionEntity {
    /// Whether `option_id` names one of this question's options.
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|option| option.id == option_id)
    }
}

fn validate_correct_option(question: &QuestionEntity) -> Result<(), ValidationError> {
    if question.has_option(&question.correct_option_id) {
        return Ok(());
    }

    let mut err = ValidationError::new("correct_option_id");
    err.message = Some(
        format!(
            "correct option `{}` is not one of the question options",
            question.correct_option_id
        )
        .into(),
    );
    Err(err)
}

/// Person taking part in an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Stable identifier for the participant.
    pub id: Uuid,
    /// Parent event.
    pub event_id: Uuid,
    /// Display name chosen on join.
    pub name: String,
    /// Sum of points earned over every answer.
    #[serde(default)]
    pub score: u64,
    /// Sum of response times over every answer, in milliseconds.
    #[serde(default)]
    pub total_answer_time_ms: u64,
    /// Consecutive correct answers up to the latest one.
    #[serde(default)]
    pub current_streak: u32,
    /// Best streak reached so far.
    #[serde(default)]
    pub longest_streak: u32,
    /// Questions this participant answered, in submission order.
    #[serde(default)]
    pub answered_question_ids: Vec<Uuid>,
    /// Join timestamp, used as the stable ordering key.
    #[serde(default = "SystemTime::now")]
    pub joined_at: SystemTime,
}

impl ParticipantEntity {
    /// Fresh participant with zeroed counters.
    pub fn new(event_id: Uuid, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            name,
            score: 0,
            total_answer_time_ms: 0,
            current_streak: 0,
            longest_streak: 0,
            answered_question_ids: Vec::new(),
            joined_at: SystemTime::now(),
        }
    }
}

/// Immutable record of one participant's answer to one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    /// Author of the answer (first half of the composite key).
    pub participant_id: Uuid,
    /// Answered question (second half of the composite key).
    pub question_id: Uuid,
    /// Event the question belongs to.
    pub event_id: Uuid,
    /// Quiz activity the question belongs to.
    pub activity_id: Uuid,
    /// Option picked by the participant.
    pub selected_option_id: String,
    /// Time between display and submission, in milliseconds.
    pub response_time_ms: u64,
    /// Whether the picked option was the right one.
    pub is_correct: bool,
    /// Points awarded for this answer.
    pub points_earned: u32,
    /// Server side submission timestamp.
    pub submitted_at: SystemTime,
}
