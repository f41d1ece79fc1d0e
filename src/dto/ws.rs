use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        activity::{ActivitySummary, AnswerResult, DisplayedQuestion, ParticipantSummary},
        validation::validate_participant_name,
    },
    services::scoring::{LeaderboardEntry, QuestionStatistics},
};

/// Messages accepted from WebSocket clients.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Participant enters an event's lobby.
    #[serde(rename_all = "camelCase")]
    JoinEvent {
        event_id: Uuid,
        participant_name: String,
    },
    /// Organizer monitors an event.
    #[serde(rename_all = "camelCase")]
    JoinEventAsOrganizer { event_id: Uuid },
    #[serde(rename_all = "camelCase")]
    StartQuiz { activity_id: Uuid },
    #[serde(rename_all = "camelCase")]
    NextQuestion {
        activity_id: Uuid,
        question_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    SubmitAnswer {
        activity_id: Uuid,
        question_id: Uuid,
        /// Selected option id.
        answer_id: String,
        /// Milliseconds between display and submission, as measured by the client.
        /// Fractional values from `performance.now()` are accepted.
        response_time: f64,
    },
    #[serde(rename_all = "camelCase")]
    EndQuiz { activity_id: Uuid },
}

/// Why an inbound frame was refused.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error("malformed message: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid message: {0}")]
    Invalid(#[from] ValidationErrors),
}

impl Validate for ClientMessage {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let ClientMessage::JoinEvent {
            participant_name, ..
        } = self
        {
            if let Err(e) = validate_participant_name(participant_name) {
                errors.add("participantName", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl ClientMessage {
    /// Parse and validate a text frame.
    pub fn from_json_str(raw: &str) -> Result<Self, InboundError> {
        let message: ClientMessage = serde_json::from_str(raw)?;
        message.validate()?;
        Ok(message)
    }

    /// Wire name of the message, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::JoinEvent { .. } => "join-event",
            ClientMessage::JoinEventAsOrganizer { .. } => "join-event-as-organizer",
            ClientMessage::StartQuiz { .. } => "start-quiz",
            ClientMessage::NextQuestion { .. } => "next-question",
            ClientMessage::SubmitAnswer { .. } => "submit-answer",
            ClientMessage::EndQuiz { .. } => "end-quiz",
        }
    }
}

/// Messages fanned out to every connection of an event.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RoomEvent {
    #[serde(rename_all = "camelCase")]
    ParticipantJoined { participant: ParticipantSummary },
    #[serde(rename_all = "camelCase")]
    ParticipantsUpdated {
        participants: Vec<ParticipantSummary>,
    },
    #[serde(rename_all = "camelCase")]
    ActivityActivated { activity: ActivitySummary },
    #[serde(rename_all = "camelCase")]
    WaitingForActivity { message: String },
    QuestionDisplayed(DisplayedQuestion),
    #[serde(rename_all = "camelCase")]
    TimerTick { remaining_seconds: u32 },
    #[serde(rename_all = "camelCase")]
    QuestionEnded { question_id: Uuid },
    #[serde(rename_all = "camelCase")]
    AnswerStatistics { statistics: QuestionStatistics },
    #[serde(rename_all = "camelCase")]
    LeaderboardUpdated { leaderboard: Vec<LeaderboardEntry> },
    #[serde(rename_all = "camelCase")]
    QuizStarted {
        activity_id: Uuid,
        total_questions: usize,
    },
    #[serde(rename_all = "camelCase")]
    QuizEnded {
        final_leaderboard: Vec<LeaderboardEntry>,
        top_three: Vec<LeaderboardEntry>,
    },
}

/// Messages addressed to a single connection.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConnectionEvent {
    #[serde(rename_all = "camelCase")]
    JoinedEvent { participant: ParticipantSummary },
    AnswerResult(AnswerResult),
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

/// Notice sent when an event has nothing live.
pub const WAITING_MESSAGE: &str = "Waiting for the organizer to start an activity";
