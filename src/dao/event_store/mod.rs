pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    ActivityEntity, ActivityStatus, AnswerEntity, EventEntity, ParticipantEntity, QuestionEntity,
};
use crate::dao::storage::{InsertOutcome, StorageResult};

/// Abstraction over the persistence layer for events and everything they own.
///
/// Authoring (creating events, activities and questions) happens elsewhere; this
/// trait only covers what the live session needs.
pub trait EventStore: Send + Sync {
    /// Short backend name reported by the health endpoint.
    fn backend_name(&self) -> &'static str;

    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>>;
    fn find_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ActivityEntity>>>;
    fn find_question(
        &self,
        event_id: Uuid,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;
    /// Questions of an event ordered by their `order` field.
    fn list_questions(&self, event_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    fn find_participant(
        &self,
        event_id: Uuid,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    /// Participants of an event in join order.
    fn list_participants(
        &self,
        event_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    fn save_participant(&self, participant: ParticipantEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    fn increment_participant_count(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    /// Atomically insert the answer unless one exists for the same
    /// `(participant_id, question_id)` pair.
    fn create_answer_if_absent(
        &self,
        answer: AnswerEntity,
    ) -> BoxFuture<'static, StorageResult<InsertOutcome>>;
    fn list_answers_by_question(
        &self,
        event_id: Uuid,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>>;
    fn set_activity_status(
        &self,
        id: Uuid,
        status: ActivityStatus,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Update the quiz's on-screen question index (`None` resets it).
    fn set_current_question(
        &self,
        activity_id: Uuid,
        index: Option<usize>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn set_event_active_activity(
        &self,
        event_id: Uuid,
        activity_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove an activity; resolves to `false` when it did not exist.
    fn delete_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
