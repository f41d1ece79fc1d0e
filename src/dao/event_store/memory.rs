//! Process-local [`EventStore`] backed by concurrent maps.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{BoxFuture, ready};
use uuid::Uuid;

use crate::dao::{
    event_store::EventStore,
    models::{
        ActivityEntity, ActivityKind, ActivityStatus, AnswerEntity, EventEntity, ParticipantEntity,
        QuestionEntity,
    },
    seed::SeedData,
    storage::{InsertOutcome, StorageError, StorageResult},
};

#[derive(Default)]
struct MemoryInner {
    events: DashMap<Uuid, EventEntity>,
    activities: DashMap<Uuid, ActivityEntity>,
    questions: DashMap<Uuid, QuestionEntity>,
    participants: DashMap<Uuid, ParticipantEntity>,
    answers: DashMap<(Uuid, Uuid), AnswerEntity>,
}

/// In-memory store used for demos, tests and single-node deployments.
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    inner: Arc<MemoryInner>,
}

impl MemoryEventStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store primed with the records of a seed file.
    pub fn from_seed(seed: SeedData) -> Self {
        let store = Self::new();
        for event in seed.events {
            store.insert_event(event);
        }
        for activity in seed.activities {
            store.insert_activity(activity);
        }
        for question in seed.questions {
            store.insert_question(question);
        }
        for participant in seed.participants {
            store.inner.participants.insert(participant.id, participant);
        }
        store
    }

    /// Insert or replace an event.
    pub fn insert_event(&self, event: EventEntity) {
        self.inner.events.insert(event.id, event);
    }

    /// Insert or replace an activity.
    pub fn insert_activity(&self, activity: ActivityEntity) {
        self.inner.activities.insert(activity.id, activity);
    }

    /// Insert or replace a question.
    pub fn insert_question(&self, question: QuestionEntity) {
        self.inner.questions.insert(question.id, question);
    }

    fn missing(kind: &'static str, id: Uuid) -> StorageError {
        StorageError::Missing {
            kind,
            id: id.to_string(),
        }
    }

    fn update_activity(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut ActivityEntity),
    ) -> StorageResult<()> {
        let mut activity = self
            .inner
            .activities
            .get_mut(&id)
            .ok_or_else(|| Self::missing("activity", id))?;
        apply(activity.value_mut());
        Ok(())
    }

    fn update_event(&self, id: Uuid, apply: impl FnOnce(&mut EventEntity)) -> StorageResult<()> {
        let mut event = self
            .inner
            .events
            .get_mut(&id)
            .ok_or_else(|| Self::missing("event", id))?;
        apply(event.value_mut());
        Ok(())
    }
}

impl EventStore for MemoryEventStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let found = self.inner.events.get(&id).map(|entry| entry.value().clone());
        Box::pin(ready(Ok(found)))
    }

    fn find_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ActivityEntity>>> {
        let found = self.inner.activities.get(&id).map(|entry| entry.value().clone());
        Box::pin(ready(Ok(found)))
    }

    fn find_question(
        &self,
        event_id: Uuid,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let found = self
            .inner
            .questions
            .get(&id)
            .filter(|question| question.event_id == event_id)
            .map(|entry| entry.value().clone());
        Box::pin(ready(Ok(found)))
    }

    fn list_questions(
        &self,
        event_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let mut questions: Vec<QuestionEntity> = self
            .inner
            .questions
            .iter()
            .filter(|entry| entry.event_id == event_id)
            .map(|entry| entry.value().clone())
            .collect();
        questions.sort_by_key(|question| question.order);
        Box::pin(ready(Ok(questions)))
    }

    fn find_participant(
        &self,
        event_id: Uuid,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let found = self
            .inner
            .participants
            .get(&id)
            .filter(|participant| participant.event_id == event_id)
            .map(|entry| entry.value().clone());
        Box::pin(ready(Ok(found)))
    }

    fn list_participants(
        &self,
        event_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let mut participants: Vec<ParticipantEntity> = self
            .inner
            .participants
            .iter()
            .filter(|entry| entry.event_id == event_id)
            .map(|entry| entry.value().clone())
            .collect();
        participants.sort_by_key(|participant| (participant.joined_at, participant.id));
        Box::pin(ready(Ok(participants)))
    }

    fn save_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.participants.insert(participant.id, participant);
        Box::pin(ready(Ok(())))
    }

    fn increment_participant_count(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.update_event(event_id, |event| event.participant_count += 1);
        Box::pin(ready(result))
    }

    fn create_answer_if_absent(
        &self,
        answer: AnswerEntity,
    ) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        // The shard lock held by `entry` makes the check and the insert one step.
        let outcome = match self
            .inner
            .answers
            .entry((answer.participant_id, answer.question_id))
        {
            Entry::Occupied(_) => InsertOutcome::AlreadyPresent,
            Entry::Vacant(slot) => {
                slot.insert(answer);
                InsertOutcome::Created
            }
        };
        Box::pin(ready(Ok(outcome)))
    }

    fn list_answers_by_question(
        &self,
        event_id: Uuid,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let mut answers: Vec<AnswerEntity> = self
            .inner
            .answers
            .iter()
            .filter(|entry| entry.event_id == event_id && entry.question_id == question_id)
            .map(|entry| entry.value().clone())
            .collect();
        answers.sort_by_key(|answer| answer.submitted_at);
        Box::pin(ready(Ok(answers)))
    }

    fn set_activity_status(
        &self,
        id: Uuid,
        status: ActivityStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.update_activity(id, |activity| activity.status = status);
        Box::pin(ready(result))
    }

    fn set_current_question(
        &self,
        activity_id: Uuid,
        index: Option<usize>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.update_activity(activity_id, |activity| {
            if let ActivityKind::Quiz {
                current_question_index,
                ..
            } = &mut activity.kind
            {
                *current_question_index = index;
            }
        });
        Box::pin(ready(result))
    }

    fn set_event_active_activity(
        &self,
        event_id: Uuid,
        activity_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.update_event(event_id, |event| event.active_activity_id = activity_id);
        Box::pin(ready(result))
    }

    fn delete_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let removed = self.inner.activities.remove(&id).is_some();
        Box::pin(ready(Ok(removed)))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn answer(participant_id: Uuid, question_id: Uuid, option: &str) -> AnswerEntity {
        AnswerEntity {
            participant_id,
            question_id,
            event_id: Uuid::nil(),
            activity_id: Uuid::nil(),
            selected_option_id: option.into(),
            response_time_ms: 1_200,
            is_correct: option == "opt1",
            points_earned: 1_000,
            submitted_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn conditional_create_keeps_the_first_answer() {
        let store = MemoryEventStore::new();
        let participant = Uuid::new_v4();
        let question = Uuid::new_v4();

        let first = store
            .create_answer_if_absent(answer(participant, question, "opt1"))
            .await
            .unwrap();
        let second = store
            .create_answer_if_absent(answer(participant, question, "opt2"))
            .await
            .unwrap();

        assert_eq!(first, InsertOutcome::Created);
        assert_eq!(second, InsertOutcome::AlreadyPresent);

        let stored = store
            .list_answers_by_question(Uuid::nil(), question)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].selected_option_id, "opt1");
    }

    #[tokio::test]
    async fn concurrent_conditional_creates_admit_exactly_one() {
        let store = MemoryEventStore::new();
        let participant = Uuid::new_v4();
        let question = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create_answer_if_absent(answer(participant, question, "opt1"))
                    .await
                    .unwrap()
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() == InsertOutcome::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn updates_on_missing_records_fail() {
        let store = MemoryEventStore::new();
        assert!(
            store
                .set_activity_status(Uuid::new_v4(), ActivityStatus::Active)
                .await
                .is_err()
        );
        assert!(
            store
                .set_event_active_activity(Uuid::new_v4(), None)
                .await
                .is_err()
        );
    }
}
