use std::{future::Future, sync::Arc};

use dashmap::{DashMap, DashSet, mapref::entry::Entry};
use tokio::{
    sync::{OwnedRwLockReadGuard, RwLock},
    task::JoinHandle,
};
use uuid::Uuid;

/// Identifies one countdown run so an expiring task only ever clears itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken {
    /// Quiz the countdown belongs to.
    pub activity_id: Uuid,
    /// Question being counted down.
    pub question_id: Uuid,
    generation: Uuid,
}

struct RunningTimer {
    generation: Uuid,
    question_id: Uuid,
    handle: JoinHandle<()>,
}

/// Countdown tasks of the quizzes currently showing a question, one per activity.
///
/// Also remembers which questions already ran out of time so late submissions
/// can be refused. Closing a question waits for every answer admitted through
/// [`QuestionTimers::admit`] to finish, so results computed after the close
/// see all accepted answers and nothing is accepted afterwards.
#[derive(Default)]
pub struct QuestionTimers {
    running: DashMap<Uuid, RunningTimer>,
    closed: DashSet<(Uuid, Uuid)>,
    admissions: DashMap<Uuid, Arc<RwLock<()>>>,
}

impl QuestionTimers {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the countdown built by `task`, aborting the activity's previous
    /// countdown first. The question is reopened for submissions.
    pub fn start<F, Fut>(&self, activity_id: Uuid, question_id: Uuid, task: F) -> TimerToken
    where
        F: FnOnce(TimerToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = TimerToken {
            activity_id,
            question_id,
            generation: Uuid::new_v4(),
        };
        self.closed.remove(&(activity_id, question_id));

        match self.running.entry(activity_id) {
            Entry::Occupied(mut slot) => {
                slot.get().handle.abort();
                let handle = tokio::spawn(task(token));
                slot.insert(RunningTimer {
                    generation: token.generation,
                    question_id,
                    handle,
                });
            }
            Entry::Vacant(slot) => {
                let handle = tokio::spawn(task(token));
                slot.insert(RunningTimer {
                    generation: token.generation,
                    question_id,
                    handle,
                });
            }
        }

        token
    }

    /// Abort the activity's countdown. Returns whether one was running.
    pub fn cancel(&self, activity_id: Uuid) -> bool {
        match self.running.remove(&activity_id) {
            Some((_, timer)) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel the countdown and forget every closed question of the activity.
    pub fn reset(&self, activity_id: Uuid) {
        self.cancel(activity_id);
        self.closed
            .retain(|(activity, _question)| *activity != activity_id);
        self.admissions
            .remove_if(&activity_id, |_, gate| Arc::strong_count(gate) == 1);
    }

    fn admission_gate(&self, activity_id: Uuid) -> Arc<RwLock<()>> {
        self.admissions.entry(activity_id).or_default().clone()
    }

    /// Hold off closing the activity's questions while one answer is recorded.
    ///
    /// Check [`QuestionTimers::is_closed`] after this returns, then keep the
    /// guard until the answer and the participant update are stored.
    pub async fn admit(&self, activity_id: Uuid) -> OwnedRwLockReadGuard<()> {
        self.admission_gate(activity_id).read_owned().await
    }

    /// Mark the token's question as out of time once admitted answers are done.
    pub async fn close(&self, token: TimerToken) {
        let _exclusive = self.admission_gate(token.activity_id).write_owned().await;
        self.closed.insert((token.activity_id, token.question_id));
    }

    /// Remove the entry created for `token`, leaving any successor untouched.
    pub fn clear(&self, token: TimerToken) {
        self.running
            .remove_if(&token.activity_id, |_, timer| timer.generation == token.generation);
    }

    /// Whether the question's countdown already expired.
    pub fn is_closed(&self, activity_id: Uuid, question_id: Uuid) -> bool {
        self.closed.contains(&(activity_id, question_id))
    }

    /// Question currently counted down for the activity, if any.
    pub fn running_question(&self, activity_id: Uuid) -> Option<Uuid> {
        self.running
            .get(&activity_id)
            .map(|timer| timer.question_id)
    }

    /// Number of countdowns in flight.
    pub fn active_count(&self) -> usize {
        self.running.len()
    }
}
