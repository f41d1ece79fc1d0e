pub mod lifecycle;
pub mod rooms;
mod sse;
pub mod timers;

use std::{future::Future, sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, watch};
use tokio::time::timeout;
use uuid::Uuid;

use crate::{config::AppConfig, dao::event_store::EventStore, error::ServiceError};

pub use self::rooms::{ConnectionId, Rooms};
pub use self::sse::{OrganizerHubs, SseHub};
pub use self::timers::{QuestionTimers, TimerToken};

pub type SharedState = Arc<AppState>;

const ORGANIZER_HUB_CAPACITY: usize = 32;

/// Central application state storing live connections, timers and the store handle.
pub struct AppState {
    config: Arc<AppConfig>,
    event_store: RwLock<Option<Arc<dyn EventStore>>>,
    degraded: watch::Sender<bool>,
    rooms: Rooms,
    timers: QuestionTimers,
    organizers: OrganizerHubs,
    participant_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self::build(config, None))
    }

    /// Construct the state with a store already installed.
    pub fn with_store(config: AppConfig, store: Arc<dyn EventStore>) -> SharedState {
        Arc::new(Self::build(config, Some(store)))
    }

    fn build(config: AppConfig, store: Option<Arc<dyn EventStore>>) -> Self {
        let (degraded_tx, _rx) = watch::channel(store.is_none());
        let transition_timeout = Some(config.quiz().transition_timeout);
        Self {
            config: Arc::new(config),
            event_store: RwLock::new(store),
            degraded: degraded_tx,
            rooms: Rooms::new(),
            timers: QuestionTimers::new(),
            organizers: OrganizerHubs::new(ORGANIZER_HUB_CAPACITY),
            participant_locks: DashMap::new(),
            transition_gate: Mutex::new(()),
            transition_timeout,
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Obtain a handle to the current event store, if one is installed.
    pub async fn event_store(&self) -> Option<Arc<dyn EventStore>> {
        let guard = self.event_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current event store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_event_store(&self) -> Result<Arc<dyn EventStore>, ServiceError> {
        self.event_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new event store implementation and leave degraded mode.
    pub async fn set_event_store(&self, store: Arc<dyn EventStore>) {
        {
            let mut guard = self.event_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, returning whether it changed.
    pub fn update_degraded(&self, value: bool) -> bool {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        })
    }

    /// Per-event broadcast groups.
    pub fn rooms(&self) -> &Rooms {
        &self.rooms
    }

    /// Countdown table of running quizzes.
    pub fn timers(&self) -> &QuestionTimers {
        &self.timers
    }

    /// Dashboard streams keyed by organizer.
    pub fn organizers(&self) -> &OrganizerHubs {
        &self.organizers
    }

    /// Serialize score updates of one participant.
    pub async fn participant_lock(&self, participant_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .participant_locks
            .entry(participant_id)
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Drop the participant's lock unless someone is holding or waiting on it.
    pub fn release_participant_lock(&self, participant_id: Uuid) {
        self.participant_locks
            .remove_if(&participant_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Run a lifecycle transition while holding the transition gate.
    ///
    /// Transitions never interleave; `work` is abandoned with
    /// [`ServiceError::Timeout`] when it exceeds the configured limit.
    pub async fn run_transition<F, Fut, T>(&self, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;

        let work_future = work();
        let outcome = match self.transition_timeout {
            Some(limit) => match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => Err(ServiceError::Timeout),
            },
            None => work_future.await,
        };

        drop(gate);
        outcome
    }
}
