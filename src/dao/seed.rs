//! Fixture loading for the in-memory store.
//!
//! Authoring lives outside this service, so a JSON seed file is how a memory
//! backed deployment (or a demo) gets its events, activities and questions.

use std::{fs, io, path::Path};

use serde::Deserialize;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::dao::models::{
    ActivityEntity, ActivityKind, EventEntity, ParticipantEntity, QuestionEntity,
};

/// Errors raised while reading a seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    /// File could not be read.
    #[error("failed to read seed file: {0}")]
    Io(#[from] io::Error),
    /// File is not valid JSON for [`SeedData`].
    #[error("failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),
    /// A question violates its shape constraints.
    #[error("invalid question `{id}`: {source}")]
    InvalidQuestion {
        /// Offending question.
        id: uuid::Uuid,
        /// Validation failures.
        #[source]
        source: ValidationErrors,
    },
    /// A record references a parent that is not part of the seed.
    #[error("dangling reference: {0}")]
    DanglingReference(String),
}

/// Records used to prime a store.
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    /// Events to insert.
    #[serde(default)]
    pub events: Vec<EventEntity>,
    /// Activities to insert.
    #[serde(default)]
    pub activities: Vec<ActivityEntity>,
    /// Questions to insert.
    #[serde(default)]
    pub questions: Vec<QuestionEntity>,
    /// Pre-registered participants.
    #[serde(default)]
    pub participants: Vec<ParticipantEntity>,
}

impl SeedData {
    /// Read and check a seed file.
    pub fn from_path(path: &Path) -> Result<Self, SeedError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Parse and check seed data from a JSON string.
    pub fn from_json_str(contents: &str) -> Result<Self, SeedError> {
        let seed: SeedData = serde_json::from_str(contents)?;
        seed.check()?;
        Ok(seed)
    }

    fn check(&self) -> Result<(), SeedError> {
        for question in &self.questions {
            question
                .validate()
                .map_err(|source| SeedError::InvalidQuestion {
                    id: question.id,
                    source,
                })?;
        }

        for activity in &self.activities {
            if !self.events.iter().any(|event| event.id == activity.event_id) {
                return Err(SeedError::DanglingReference(format!(
                    "activity `{}` references unknown event `{}`",
                    activity.id, activity.event_id
                )));
            }

            if let ActivityKind::Quiz { question_ids, .. } = &activity.kind {
                for question_id in question_ids {
                    let known = self.questions.iter().any(|question| {
                        question.id == *question_id && question.activity_id == activity.id
                    });
                    if !known {
                        return Err(SeedError::DanglingReference(format!(
                            "quiz `{}` references unknown question `{question_id}`",
                            activity.id
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = "6f1c3f34-0000-4000-8000-000000000001";
    const QUIZ: &str = "6f1c3f34-0000-4000-8000-000000000002";
    const QUESTION: &str = "6f1c3f34-0000-4000-8000-000000000003";

    fn seed_json(correct: &str) -> String {
        serde_json::json!({
            "events": [{ "id": EVENT, "name": "Friday trivia", "status": "waiting" }],
            "activities": [{
                "id": QUIZ, "event_id": EVENT, "name": "Round 1", "status": "ready",
                "type": "quiz", "question_ids": [QUESTION]
            }],
            "questions": [{
                "id": QUESTION, "event_id": EVENT, "activity_id": QUIZ,
                "text": "2 + 2?", "correct_option_id": correct, "timer_seconds": 20,
                "options": [
                    { "id": "opt1", "text": "4", "color": "#26890c", "shape": "square" },
                    { "id": "opt2", "text": "5", "color": "#1368ce", "shape": "circle" }
                ]
            }]
        })
        .to_string()
    }

    #[test]
    fn accepts_consistent_seed() {
        let seed = SeedData::from_json_str(&seed_json("opt1")).unwrap();
        assert_eq!(seed.events.len(), 1);
        assert_eq!(seed.questions[0].timer_seconds, 20);
    }

    #[test]
    fn rejects_unknown_correct_option() {
        let err = SeedData::from_json_str(&seed_json("opt9")).unwrap_err();
        assert!(matches!(err, SeedError::InvalidQuestion { .. }));
    }

    #[test]
    fn rejects_dangling_question_reference() {
        let raw = seed_json("opt1").replace(
            &format!("\"question_ids\":[\"{QUESTION}\"]"),
            "\"question_ids\":[\"6f1c3f34-0000-4000-8000-0000000000ff\"]",
        );
        let err = SeedData::from_json_str(&raw).unwrap_err();
        assert!(matches!(err, SeedError::DanglingReference(_)));
    }

    #[test]
    fn bundled_example_seed_is_consistent() {
        let seed = SeedData::from_json_str(include_str!("../../config/seed.example.json")).unwrap();
        assert_eq!(seed.events.len(), 1);
        assert_eq!(seed.activities.len(), 3);
    }
}
