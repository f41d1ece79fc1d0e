use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use uuid::Uuid;

use crate::dao::models::{
    ActivityEntity, ActivityKind, ActivityStatus, AnswerEntity, AnswerOption, EventEntity,
    EventStatus, ParticipantEntity, PollOption, QuestionEntity,
};

// Identifiers are stored as their hyphenated string form so documents stay
// readable from the shell and filters can be written with plain strings.

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEventDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    name: String,
    #[serde(default)]
    organizer_id: Option<String>,
    #[serde(default)]
    status: EventStatus,
    #[serde_as(as = "Option<DisplayFromStr>")]
    active_activity_id: Option<Uuid>,
    #[serde(default)]
    participant_count: u32,
}

impl From<MongoEventDocument> for EventEntity {
    fn from(value: MongoEventDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            organizer_id: value.organizer_id,
            status: value.status,
            active_activity_id: value.active_activity_id,
            participant_count: value.participant_count,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MongoActivityKind {
    Quiz {
        #[serde_as(as = "Vec<DisplayFromStr>")]
        question_ids: Vec<Uuid>,
        #[serde(default)]
        current_question_index: Option<u32>,
    },
    Poll {
        question: String,
        options: Vec<PollOption>,
        #[serde(default)]
        allow_multiple: bool,
    },
    Raffle {
        prize: String,
        winner_count: u32,
    },
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoActivityDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    event_id: Uuid,
    name: String,
    #[serde(default)]
    status: ActivityStatus,
    #[serde(default)]
    order: u32,
    #[serde(flatten)]
    kind: MongoActivityKind,
}

impl From<MongoActivityDocument> for ActivityEntity {
    fn from(value: MongoActivityDocument) -> Self {
        let kind = match value.kind {
            MongoActivityKind::Quiz {
                question_ids,
                current_question_index,
            } => ActivityKind::Quiz {
                question_ids,
                current_question_index: current_question_index.map(|index| index as usize),
            },
            MongoActivityKind::Poll {
                question,
                options,
                allow_multiple,
            } => ActivityKind::Poll {
                question,
                options,
                allow_multiple,
            },
            MongoActivityKind::Raffle {
                prize,
                winner_count,
            } => ActivityKind::Raffle {
                prize,
                winner_count,
            },
        };

        Self {
            id: value.id,
            event_id: value.event_id,
            name: value.name,
            status: value.status,
            order: value.order,
            kind,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    event_id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    activity_id: Uuid,
    text: String,
    options: Vec<AnswerOption>,
    correct_option_id: String,
    timer_seconds: u32,
    #[serde(default)]
    order: u32,
}

impl From<MongoQuestionDocument> for QuestionEntity {
    fn from(value: MongoQuestionDocument) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            activity_id: value.activity_id,
            text: value.text,
            options: value.options,
            correct_option_id: value.correct_option_id,
            timer_seconds: value.timer_seconds,
            order: value.order,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoParticipantDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    event_id: Uuid,
    name: String,
    score: i64,
    total_answer_time_ms: i64,
    current_streak: u32,
    longest_streak: u32,
    #[serde_as(as = "Vec<DisplayFromStr>")]
    #[serde(default)]
    answered_question_ids: Vec<Uuid>,
    joined_at: DateTime,
}

impl From<ParticipantEntity> for MongoParticipantDocument {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            name: value.name,
            score: clamp_i64(value.score),
            total_answer_time_ms: clamp_i64(value.total_answer_time_ms),
            current_streak: value.current_streak,
            longest_streak: value.longest_streak,
            answered_question_ids: value.answered_question_ids,
            joined_at: DateTime::from_system_time(value.joined_at),
        }
    }
}

impl From<MongoParticipantDocument> for ParticipantEntity {
    fn from(value: MongoParticipantDocument) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            name: value.name,
            score: value.score.max(0) as u64,
            total_answer_time_ms: value.total_answer_time_ms.max(0) as u64,
            current_streak: value.current_streak,
            longest_streak: value.longest_streak,
            answered_question_ids: value.answered_question_ids,
            joined_at: value.joined_at.to_system_time(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnswerDocument {
    /// `participant_id:question_id`, so the primary key alone enforces uniqueness.
    #[serde(rename = "_id")]
    key: String,
    #[serde_as(as = "DisplayFromStr")]
    participant_id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    question_id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    event_id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    activity_id: Uuid,
    selected_option_id: String,
    response_time_ms: i64,
    is_correct: bool,
    points_earned: u32,
    submitted_at: DateTime,
}

impl From<AnswerEntity> for MongoAnswerDocument {
    fn from(value: AnswerEntity) -> Self {
        Self {
            key: answer_key(value.participant_id, value.question_id),
            participant_id: value.participant_id,
            question_id: value.question_id,
            event_id: value.event_id,
            activity_id: value.activity_id,
            selected_option_id: value.selected_option_id,
            response_time_ms: clamp_i64(value.response_time_ms),
            is_correct: value.is_correct,
            points_earned: value.points_earned,
            submitted_at: DateTime::from_system_time(value.submitted_at),
        }
    }
}

impl From<MongoAnswerDocument> for AnswerEntity {
    fn from(value: MongoAnswerDocument) -> Self {
        Self {
            participant_id: value.participant_id,
            question_id: value.question_id,
            event_id: value.event_id,
            activity_id: value.activity_id,
            selected_option_id: value.selected_option_id,
            response_time_ms: value.response_time_ms.max(0) as u64,
            is_correct: value.is_correct,
            points_earned: value.points_earned,
            submitted_at: value.submitted_at.to_system_time(),
        }
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `_id` of an answer document; one per participant and question.
pub fn answer_key(participant_id: Uuid, question_id: Uuid) -> String {
    format!("{participant_id}:{question_id}")
}

/// Filter selecting a document by id.
pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}
