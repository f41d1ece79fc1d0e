use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoActivityDocument, MongoAnswerDocument, MongoEventDocument, MongoParticipantDocument,
        MongoQuestionDocument, doc_id,
    },
};
use crate::dao::{
    event_store::EventStore,
    models::{
        ActivityEntity, ActivityStatus, AnswerEntity, EventEntity, ParticipantEntity,
        QuestionEntity,
    },
    storage::{InsertOutcome, StorageError, StorageResult},
};

const EVENT_COLLECTION_NAME: &str = "events";
const ACTIVITY_COLLECTION_NAME: &str = "activities";
const QUESTION_COLLECTION_NAME: &str = "questions";
const PARTICIPANT_COLLECTION_NAME: &str = "participants";
const ANSWER_COLLECTION_NAME: &str = "answers";

const DUPLICATE_KEY_CODE: i32 = 11000;

/// [`EventStore`] persisted in MongoDB.
#[derive(Clone)]
pub struct MongoEventStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        _ => false,
    }
}

impl MongoEventStore {
    /// Connect to MongoDB and make sure the indexes the session relies on exist.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // Unique on the pair in addition to the composite `_id`.
        let answers = database.collection::<Document>(ANSWER_COLLECTION_NAME);
        let unique_answer = IndexModel::builder()
            .keys(doc! {"participant_id": 1, "question_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("answer_participant_question_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        answers
            .create_index(unique_answer)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ANSWER_COLLECTION_NAME,
                index: "participant_id,question_id",
                source,
            })?;

        let by_question = IndexModel::builder()
            .keys(doc! {"event_id": 1, "question_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("answer_event_question_idx".to_owned()))
                    .build(),
            )
            .build();
        answers
            .create_index(by_question)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ANSWER_COLLECTION_NAME,
                index: "event_id,question_id",
                source,
            })?;

        let participants = database.collection::<Document>(PARTICIPANT_COLLECTION_NAME);
        let by_event = IndexModel::builder()
            .keys(doc! {"event_id": 1, "joined_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("participant_event_idx".to_owned()))
                    .build(),
            )
            .build();
        participants
            .create_index(by_event)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PARTICIPANT_COLLECTION_NAME,
                index: "event_id,joined_at",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn find_by_id<T, E>(&self, collection: &'static str, id: Uuid) -> MongoResult<Option<E>>
    where
        T: serde::de::DeserializeOwned + Send + Sync + Into<E>,
    {
        let document = self
            .collection::<T>(collection)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection,
                id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_by_event<T, E>(
        &self,
        collection: &'static str,
        event_id: Uuid,
        filter: Document,
        sort: Document,
    ) -> MongoResult<Vec<E>>
    where
        T: serde::de::DeserializeOwned + Unpin + Send + Sync + Into<E>,
    {
        let documents: Vec<T> = self
            .collection::<T>(collection)
            .await
            .find(filter)
            .sort(sort)
            .await
            .map_err(|source| MongoDaoError::List {
                collection,
                event_id,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::List {
                collection,
                event_id,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    /// Apply an update to one document; resolves to whether it matched.
    async fn update_one(
        &self,
        collection: &'static str,
        id: Uuid,
        update: Document,
    ) -> MongoResult<bool> {
        let result = self
            .collection::<Document>(collection)
            .await
            .update_one(doc_id(id), update)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection,
                id,
                source,
            })?;
        Ok(result.matched_count > 0)
    }

    async fn update_existing(
        &self,
        collection: &'static str,
        kind: &'static str,
        id: Uuid,
        update: Document,
    ) -> StorageResult<()> {
        if self.update_one(collection, id, update).await? {
            Ok(())
        } else {
            Err(StorageError::Missing {
                kind,
                id: id.to_string(),
            })
        }
    }

    async fn save_participant(&self, participant: ParticipantEntity) -> MongoResult<()> {
        let id = participant.id;
        let document: MongoParticipantDocument = participant.into();
        self.collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION_NAME)
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: PARTICIPANT_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(())
    }

    async fn create_answer_if_absent(&self, answer: AnswerEntity) -> MongoResult<InsertOutcome> {
        let id = answer.question_id;
        let document: MongoAnswerDocument = answer.into();
        let inserted = self
            .collection::<MongoAnswerDocument>(ANSWER_COLLECTION_NAME)
            .await
            .insert_one(&document)
            .await;

        match inserted {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(err) if is_duplicate_key(&err) => Ok(InsertOutcome::AlreadyPresent),
            Err(source) => Err(MongoDaoError::Write {
                collection: ANSWER_COLLECTION_NAME,
                id,
                source,
            }),
        }
    }

    async fn delete_activity(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .collection::<Document>(ACTIVITY_COLLECTION_NAME)
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: ACTIVITY_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }
}

impl EventStore for MongoEventStore {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_by_id::<MongoEventDocument, _>(EVENT_COLLECTION_NAME, id)
                .await
                .map_err(Into::into)
        })
    }

    fn find_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ActivityEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_by_id::<MongoActivityDocument, _>(ACTIVITY_COLLECTION_NAME, id)
                .await
                .map_err(Into::into)
        })
    }

    fn find_question(
        &self,
        event_id: Uuid,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let question: Option<QuestionEntity> = store
                .find_by_id::<MongoQuestionDocument, _>(QUESTION_COLLECTION_NAME, id)
                .await?;
            Ok(question.filter(|question| question.event_id == event_id))
        })
    }

    fn list_questions(
        &self,
        event_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_by_event::<MongoQuestionDocument, _>(
                    QUESTION_COLLECTION_NAME,
                    event_id,
                    doc! {"event_id": event_id.to_string()},
                    doc! {"order": 1},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn find_participant(
        &self,
        event_id: Uuid,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let participant: Option<ParticipantEntity> = store
                .find_by_id::<MongoParticipantDocument, _>(PARTICIPANT_COLLECTION_NAME, id)
                .await?;
            Ok(participant.filter(|participant| participant.event_id == event_id))
        })
    }

    fn list_participants(
        &self,
        event_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_by_event::<MongoParticipantDocument, _>(
                    PARTICIPANT_COLLECTION_NAME,
                    event_id,
                    doc! {"event_id": event_id.to_string()},
                    doc! {"joined_at": 1, "_id": 1},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn save_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_participant(participant).await.map_err(Into::into) })
    }

    fn increment_participant_count(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_existing(
                    EVENT_COLLECTION_NAME,
                    "event",
                    event_id,
                    doc! {"$inc": {"participant_count": 1}},
                )
                .await
        })
    }

    fn create_answer_if_absent(
        &self,
        answer: AnswerEntity,
    ) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.create_answer_if_absent(answer).await.map_err(Into::into) })
    }

    fn list_answers_by_question(
        &self,
        event_id: Uuid,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_by_event::<MongoAnswerDocument, _>(
                    ANSWER_COLLECTION_NAME,
                    event_id,
                    doc! {
                        "event_id": event_id.to_string(),
                        "question_id": question_id.to_string(),
                    },
                    doc! {"submitted_at": 1},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn set_activity_status(
        &self,
        id: Uuid,
        status: ActivityStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_existing(
                    ACTIVITY_COLLECTION_NAME,
                    "activity",
                    id,
                    doc! {"$set": {"status": status.as_str()}},
                )
                .await
        })
    }

    fn set_current_question(
        &self,
        activity_id: Uuid,
        index: Option<usize>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let index = index.map(|index| index as i64);
        Box::pin(async move {
            store
                .update_existing(
                    ACTIVITY_COLLECTION_NAME,
                    "activity",
                    activity_id,
                    doc! {"$set": {"current_question_index": index}},
                )
                .await
        })
    }

    fn set_event_active_activity(
        &self,
        event_id: Uuid,
        activity_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let activity_id = activity_id.map(|id| id.to_string());
        Box::pin(async move {
            store
                .update_existing(
                    EVENT_COLLECTION_NAME,
                    "event",
                    event_id,
                    doc! {"$set": {"active_activity_id": activity_id}},
                )
                .await
        })
    }

    fn delete_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_activity(id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
