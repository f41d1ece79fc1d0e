use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        models::{ActivityEntity, ActivityKind, ActivityStatus, AnswerEntity, QuestionEntity},
        storage::InsertOutcome,
    },
    dto::{
        activity::{AnswerResult, DisplayedQuestion, QuestionView, QuizSummary},
        unix_millis,
    },
    error::ServiceError,
    services::{
        activity_service::{self, load_activity},
        scoring::{
            self, LeaderboardEntry, QuestionStatistics, StreakState, calculate_points,
            update_streak,
        },
    },
    state::{SharedState, lifecycle::ActivityEvent},
};

/// Question put on screen by [`show_question`].
#[derive(Debug, Clone)]
pub struct ShownQuestion {
    /// Event whose room gets the question.
    pub event_id: Uuid,
    /// Countdown length.
    pub timer_seconds: u32,
    /// Payload for the room.
    pub display: DisplayedQuestion,
}

/// Quiz that was just started.
#[derive(Debug, Clone)]
pub struct StartedQuiz {
    /// Quiz after the transition.
    pub activity: ActivityEntity,
    /// Number of questions in the quiz.
    pub total_questions: usize,
}

/// Quiz that was just completed, with its final standings.
#[derive(Debug, Clone)]
pub struct EndedQuiz {
    /// Quiz after the transition.
    pub activity: ActivityEntity,
    /// Final standings.
    pub summary: QuizSummary,
}

/// Answer submission as received from a participant connection.
#[derive(Debug, Clone)]
pub struct SubmitAnswer {
    /// Quiz being answered.
    pub activity_id: Uuid,
    /// Who answers.
    pub participant_id: Uuid,
    /// Question being answered.
    pub question_id: Uuid,
    /// Selected option.
    pub option_id: String,
    /// Client measured, may be fractional or garbage.
    pub response_time_ms: f64,
}

fn question_ids(activity: &ActivityEntity) -> Result<&[Uuid], ServiceError> {
    match &activity.kind {
        ActivityKind::Quiz { question_ids, .. } => Ok(question_ids),
        ActivityKind::Poll { .. } | ActivityKind::Raffle { .. } => Err(ServiceError::WrongType(
            format!("activity `{}` is not a quiz", activity.id),
        )),
    }
}

fn ensure_running(activity: &ActivityEntity) -> Result<(), ServiceError> {
    if activity.status == ActivityStatus::Active {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(format!(
            "quiz `{}` is {}, not active",
            activity.id, activity.status
        )))
    }
}

async fn load_quiz_question(
    state: &SharedState,
    activity: &ActivityEntity,
    question_id: Uuid,
) -> Result<(usize, QuestionEntity), ServiceError> {
    let ids = question_ids(activity)?;
    let index = ids
        .iter()
        .position(|id| *id == question_id)
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "question `{question_id}` is not part of quiz `{}`",
                activity.id
            ))
        })?;

    let store = state.require_event_store().await?;
    let question = store
        .find_question(activity.event_id, question_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("question `{question_id}` not found")))?;
    Ok((index, question))
}

/// Reset the quiz to its first question and mark it running.
pub async fn start(state: &SharedState, activity_id: Uuid) -> Result<StartedQuiz, ServiceError> {
    let store = state.require_event_store().await?;

    let started = state
        .run_transition(|| async {
            let mut activity = load_activity(&store, activity_id).await?;
            let ids = question_ids(&activity)?;
            let total_questions = ids.len();
            let next = activity.status.transition(ActivityEvent::Start)?;

            let authored = store.list_questions(activity.event_id).await?;
            let missing = ids.iter().find(|id| {
                !authored
                    .iter()
                    .any(|question| question.id == **id && question.activity_id == activity_id)
            });
            if let Some(missing) = missing {
                return Err(ServiceError::NotFound(format!(
                    "quiz `{activity_id}` references unknown question `{missing}`"
                )));
            }

            store.set_activity_status(activity_id, next).await?;
            store.set_current_question(activity_id, None).await?;
            activity.status = next;
            if let ActivityKind::Quiz {
                current_question_index,
                ..
            } = &mut activity.kind
            {
                *current_question_index = None;
            }

            Ok(StartedQuiz {
                activity,
                total_questions,
            })
        })
        .await?;

    state.timers().reset(activity_id);
    info!(activity_id = %activity_id, total = started.total_questions, "quiz started");
    Ok(started)
}

/// Put a question of a running quiz on screen.
pub async fn show_question(
    state: &SharedState,
    activity_id: Uuid,
    question_id: Uuid,
) -> Result<ShownQuestion, ServiceError> {
    let store = state.require_event_store().await?;
    let activity = load_activity(&store, activity_id).await?;
    let total_questions = question_ids(&activity)?.len();
    ensure_running(&activity)?;

    let (index, question) = load_quiz_question(state, &activity, question_id).await?;
    store.set_current_question(activity_id, Some(index)).await?;

    debug!(
        activity_id = %activity_id,
        question_id = %question_id,
        number = index + 1,
        "question displayed"
    );

    Ok(ShownQuestion {
        event_id: activity.event_id,
        timer_seconds: question.timer_seconds,
        display: DisplayedQuestion {
            question: QuestionView::from(&question),
            question_number: index + 1,
            total_questions,
            start_time: unix_millis(SystemTime::now()),
        },
    })
}

/// Record an answer and update the participant's counters.
///
/// Uniqueness of `(participant, question)` is decided by the store alone; a
/// second submission gets [`ServiceError::DuplicateSubmission`] and changes
/// nothing. The closed check, the insert and the participant update all run
/// under the quiz's admission guard, so a countdown that runs out meanwhile
/// waits for this answer before publishing results.
pub async fn submit_answer(
    state: &SharedState,
    submission: SubmitAnswer,
) -> Result<AnswerResult, ServiceError> {
    let response_time_ms = response_time_millis(submission.response_time_ms)?;

    let store = state.require_event_store().await?;
    let activity = load_activity(&store, submission.activity_id).await?;
    question_ids(&activity)?;
    ensure_running(&activity)?;

    let (_, question) = load_quiz_question(state, &activity, submission.question_id).await?;
    if !question.has_option(&submission.option_id) {
        return Err(ServiceError::Validation(format!(
            "option `{}` does not belong to question `{}`",
            submission.option_id, question.id
        )));
    }

    store
        .find_participant(activity.event_id, submission.participant_id)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "participant `{}` not found",
                submission.participant_id
            ))
        })?;

    let is_correct = submission.option_id == question.correct_option_id;
    let points_earned = calculate_points(is_correct, response_time_ms, question.timer_seconds);

    let _admission = state.timers().admit(activity.id).await;
    if state.config().quiz().reject_late_answers
        && state.timers().is_closed(activity.id, question.id)
    {
        return Err(ServiceError::InvalidState(format!(
            "question `{}` is closed",
            question.id
        )));
    }

    let answer = AnswerEntity {
        participant_id: submission.participant_id,
        question_id: question.id,
        event_id: activity.event_id,
        activity_id: activity.id,
        selected_option_id: submission.option_id,
        response_time_ms,
        is_correct,
        points_earned,
        submitted_at: SystemTime::now(),
    };
    if store.create_answer_if_absent(answer).await? == InsertOutcome::AlreadyPresent {
        return Err(ServiceError::DuplicateSubmission);
    }

    let current_streak = {
        let _guard = state.participant_lock(submission.participant_id).await;
        let mut participant = store
            .find_participant(activity.event_id, submission.participant_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "participant `{}` not found",
                    submission.participant_id
                ))
            })?;

        let streak = update_streak(
            is_correct,
            StreakState {
                current: participant.current_streak,
                longest: participant.longest_streak,
            },
        );
        participant.score = participant.score.saturating_add(u64::from(points_earned));
        participant.total_answer_time_ms = participant
            .total_answer_time_ms
            .saturating_add(response_time_ms);
        participant.current_streak = streak.current;
        participant.longest_streak = streak.longest;
        participant.answered_question_ids.push(question.id);
        store.save_participant(participant).await?;
        streak.current
    };

    debug!(
        participant_id = %submission.participant_id,
        question_id = %question.id,
        is_correct,
        points_earned,
        "answer recorded"
    );

    Ok(AnswerResult {
        is_correct,
        points_earned,
        correct_option_id: question.correct_option_id,
        current_streak,
    })
}

/// Whole milliseconds of a client measured response time.
fn response_time_millis(raw: f64) -> Result<u64, ServiceError> {
    if !raw.is_finite() || raw < 0.0 {
        return Err(ServiceError::Validation(format!(
            "response time must be a non-negative number of milliseconds (got {raw})"
        )));
    }
    Ok(raw.round() as u64)
}

/// Answer distribution of a question of the quiz.
pub async fn question_statistics(
    state: &SharedState,
    activity_id: Uuid,
    question_id: Uuid,
) -> Result<QuestionStatistics, ServiceError> {
    let store = state.require_event_store().await?;
    let activity = load_activity(&store, activity_id).await?;
    let (_, question) = load_quiz_question(state, &activity, question_id).await?;
    let answers = store
        .list_answers_by_question(activity.event_id, question_id)
        .await?;
    Ok(scoring::answer_statistics(
        question.id,
        &question.correct_option_id,
        &answers,
    ))
}

/// Ranked participants of the quiz's event.
pub async fn leaderboard(
    state: &SharedState,
    activity_id: Uuid,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let store = state.require_event_store().await?;
    let activity = load_activity(&store, activity_id).await?;
    question_ids(&activity)?;
    event_leaderboard(state, activity.event_id).await
}

async fn event_leaderboard(
    state: &SharedState,
    event_id: Uuid,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let store = state.require_event_store().await?;
    let participants = store.list_participants(event_id).await?;
    Ok(scoring::rank_leaderboard(&participants))
}

/// Complete the quiz and compute its final standings.
pub async fn end(state: &SharedState, activity_id: Uuid) -> Result<EndedQuiz, ServiceError> {
    let activity = activity_service::end(state, activity_id).await?;

    let final_leaderboard = event_leaderboard(state, activity.event_id).await?;
    let summary = QuizSummary {
        top_three: scoring::top_three(&final_leaderboard),
        participant_count: final_leaderboard.len(),
        final_leaderboard,
    };
    info!(
        activity_id = %activity_id,
        participants = summary.participant_count,
        "quiz ended"
    );

    Ok(EndedQuiz { activity, summary })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            event_store::{EventStore, memory::MemoryEventStore},
            models::{AnswerOption, EventEntity, EventStatus, ParticipantEntity},
        },
        state::AppState,
    };

    pub(crate) struct Fixture {
        pub state: SharedState,
        pub store: MemoryEventStore,
        pub event_id: Uuid,
        pub activity_id: Uuid,
        pub questions: Vec<Uuid>,
    }

    pub(crate) fn question(event_id: Uuid, activity_id: Uuid, order: u32) -> QuestionEntity {
        QuestionEntity {
            id: Uuid::new_v4(),
            event_id,
            activity_id,
            text: format!("Question {order}"),
            options: ["opt1", "opt2", "opt3"]
                .iter()
                .map(|id| AnswerOption {
                    id: (*id).into(),
                    text: id.to_uppercase(),
                    color: "#1368ce".into(),
                    shape: "square".into(),
                })
                .collect(),
            correct_option_id: "opt1".into(),
            timer_seconds: 30,
            order,
        }
    }

    pub(crate) fn fixture(status: ActivityStatus) -> Fixture {
        let store = MemoryEventStore::new();
        let event_id = Uuid::new_v4();
        let activity_id = Uuid::new_v4();
        store.insert_event(EventEntity {
            id: event_id,
            name: "Pub quiz".into(),
            organizer_id: Some("org-1".into()),
            status: EventStatus::Live,
            active_activity_id: None,
            participant_count: 0,
        });

        let questions: Vec<QuestionEntity> =
            (0..2).map(|order| question(event_id, activity_id, order)).collect();
        let question_ids: Vec<Uuid> = questions.iter().map(|question| question.id).collect();
        for question in questions {
            store.insert_question(question);
        }
        store.insert_activity(ActivityEntity {
            id: activity_id,
            event_id,
            name: "Round 1".into(),
            status,
            order: 0,
            kind: ActivityKind::Quiz {
                question_ids: question_ids.clone(),
                current_question_index: None,
            },
        });

        Fixture {
            state: AppState::with_store(AppConfig::default(), Arc::new(store.clone())),
            store,
            event_id,
            activity_id,
            questions: question_ids,
        }
    }

    pub(crate) async fn add_participant(fixture: &Fixture, name: &str) -> Uuid {
        let participant = ParticipantEntity::new(fixture.event_id, name.into());
        let id = participant.id;
        fixture.store.save_participant(participant).await.unwrap();
        id
    }

    fn submission(fixture: &Fixture, participant_id: Uuid, option: &str, ms: i64) -> SubmitAnswer {
        SubmitAnswer {
            activity_id: fixture.activity_id,
            participant_id,
            question_id: fixture.questions[0],
            option_id: option.into(),
            response_time_ms: ms as f64,
        }
    }

    #[tokio::test]
    async fn starting_resets_the_question_pointer() {
        let fixture = fixture(ActivityStatus::Ready);
        fixture
            .store
            .set_current_question(fixture.activity_id, Some(1))
            .await
            .unwrap();

        let started = start(&fixture.state, fixture.activity_id).await.unwrap();
        assert_eq!(started.total_questions, 2);
        assert_eq!(started.activity.status, ActivityStatus::Active);

        let stored = fixture.store.find_activity(fixture.activity_id).await.unwrap().unwrap();
        assert!(matches!(
            stored.kind,
            ActivityKind::Quiz {
                current_question_index: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn questions_are_shown_without_the_answer() {
        let fixture = fixture(ActivityStatus::Active);
        let shown = show_question(&fixture.state, fixture.activity_id, fixture.questions[1])
            .await
            .unwrap();
        assert_eq!(shown.event_id, fixture.event_id);
        assert_eq!(shown.display.question_number, 2);
        assert_eq!(shown.display.total_questions, 2);

        let json = serde_json::to_value(&shown.display).unwrap();
        assert!(json["question"].get("correctOptionId").is_none());

        assert!(matches!(
            show_question(&fixture.state, fixture.activity_id, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn questions_need_a_running_quiz() {
        let fixture = fixture(ActivityStatus::Ready);
        assert!(matches!(
            show_question(&fixture.state, fixture.activity_id, fixture.questions[0]).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn answers_update_score_and_streak() {
        let fixture = fixture(ActivityStatus::Active);
        let alice = add_participant(&fixture, "Alice").await;

        let result = submit_answer(&fixture.state, submission(&fixture, alice, "opt1", 5_000))
            .await
            .unwrap();
        assert!(result.is_correct);
        assert_eq!(result.points_earned, 1_000);
        assert_eq!(result.current_streak, 1);
        assert_eq!(result.correct_option_id, "opt1");

        let stored = fixture
            .store
            .find_participant(fixture.event_id, alice)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.score, 1_000);
        assert_eq!(stored.total_answer_time_ms, 5_000);
        assert_eq!(stored.longest_streak, 1);
        assert_eq!(stored.answered_question_ids, vec![fixture.questions[0]]);
    }

    #[tokio::test]
    async fn second_submission_is_refused_and_changes_nothing() {
        let fixture = fixture(ActivityStatus::Active);
        let alice = add_participant(&fixture, "Alice").await;

        submit_answer(&fixture.state, submission(&fixture, alice, "opt2", 2_000))
            .await
            .unwrap();
        assert!(matches!(
            submit_answer(&fixture.state, submission(&fixture, alice, "opt1", 1_000)).await,
            Err(ServiceError::DuplicateSubmission)
        ));

        let stored = fixture
            .store
            .find_participant(fixture.event_id, alice)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.score, 0);
        assert_eq!(stored.current_streak, 0);
        assert_eq!(stored.answered_question_ids.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_submissions_record_one_answer() {
        let fixture = fixture(ActivityStatus::Active);
        let alice = add_participant(&fixture, "Alice").await;

        let (first, second) = tokio::join!(
            submit_answer(&fixture.state, submission(&fixture, alice, "opt1", 1_000)),
            submit_answer(&fixture.state, submission(&fixture, alice, "opt1", 1_000)),
        );
        assert_eq!(
            [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );

        let answers = fixture
            .store
            .list_answers_by_question(fixture.event_id, fixture.questions[0])
            .await
            .unwrap();
        assert_eq!(answers.len(), 1);
    }

    #[tokio::test]
    async fn malformed_submissions_are_rejected() {
        let fixture = fixture(ActivityStatus::Active);
        let alice = add_participant(&fixture, "Alice").await;

        assert!(matches!(
            submit_answer(&fixture.state, submission(&fixture, alice, "opt9", 1_000)).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            submit_answer(&fixture.state, submission(&fixture, alice, "opt1", -5)).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            submit_answer(
                &fixture.state,
                submission(&fixture, Uuid::new_v4(), "opt1", 1_000)
            )
            .await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn closed_questions_refuse_answers() {
        let fixture = fixture(ActivityStatus::Active);
        let alice = add_participant(&fixture, "Alice").await;

        let token = fixture.state.timers().start(
            fixture.activity_id,
            fixture.questions[0],
            |_| async {},
        );
        fixture.state.timers().close(token).await;

        assert!(matches!(
            submit_answer(&fixture.state, submission(&fixture, alice, "opt1", 1_000)).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn countdown_close_waits_for_an_answer_in_flight() {
        let fixture = fixture(ActivityStatus::Active);
        let alice = add_participant(&fixture, "Alice").await;
        let bob = add_participant(&fixture, "Bob").await;
        let token = fixture.state.timers().start(
            fixture.activity_id,
            fixture.questions[0],
            |_| std::future::pending(),
        );

        let held = fixture.state.participant_lock(alice).await;
        let pending_answer = {
            let state = fixture.state.clone();
            let submission = submission(&fixture, alice, "opt1", 1_000);
            tokio::spawn(async move { submit_answer(&state, submission).await })
        };
        while fixture
            .store
            .list_answers_by_question(fixture.event_id, fixture.questions[0])
            .await
            .unwrap()
            .is_empty()
        {
            tokio::task::yield_now().await;
        }

        let closing = {
            let state = fixture.state.clone();
            tokio::spawn(async move { state.timers().close(token).await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(!closing.is_finished());
        assert!(
            !fixture
                .state
                .timers()
                .is_closed(fixture.activity_id, fixture.questions[0])
        );

        drop(held);
        let accepted = pending_answer.await.unwrap().unwrap();
        closing.await.unwrap();
        assert_eq!(accepted.points_earned, 1_000);

        let stored = fixture
            .store
            .find_participant(fixture.event_id, alice)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.score, 1_000);
        assert!(matches!(
            submit_answer(&fixture.state, submission(&fixture, bob, "opt1", 1_500)).await,
            Err(ServiceError::InvalidState(_))
        ));
        let answers = fixture
            .store
            .list_answers_by_question(fixture.event_id, fixture.questions[0])
            .await
            .unwrap();
        assert_eq!(answers.len(), 1);
    }

    #[tokio::test]
    async fn fractional_response_times_are_rounded() {
        let fixture = fixture(ActivityStatus::Active);
        let alice = add_participant(&fixture, "Alice").await;

        let mut fractional = submission(&fixture, alice, "opt2", 0);
        fractional.response_time_ms = 1_523.4;
        submit_answer(&fixture.state, fractional).await.unwrap();

        let stored = fixture
            .store
            .find_participant(fixture.event_id, alice)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_answer_time_ms, 1_523);

        for garbage in [f64::NAN, f64::INFINITY, -0.5] {
            let mut invalid = submission(&fixture, alice, "opt1", 0);
            invalid.response_time_ms = garbage;
            assert!(matches!(
                submit_answer(&fixture.state, invalid).await,
                Err(ServiceError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn quizzes_with_dangling_questions_do_not_start() {
        let fixture = fixture(ActivityStatus::Ready);
        let mut activity = fixture
            .store
            .find_activity(fixture.activity_id)
            .await
            .unwrap()
            .unwrap();
        if let ActivityKind::Quiz { question_ids, .. } = &mut activity.kind {
            question_ids.push(Uuid::new_v4());
        }
        fixture.store.insert_activity(activity);

        assert!(matches!(
            start(&fixture.state, fixture.activity_id).await,
            Err(ServiceError::NotFound(_))
        ));
        let stored = fixture
            .store
            .find_activity(fixture.activity_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ActivityStatus::Ready);
    }

    #[tokio::test]
    async fn statistics_and_final_standings() {
        let fixture = fixture(ActivityStatus::Active);
        let alice = add_participant(&fixture, "Alice").await;
        let bob = add_participant(&fixture, "Bob").await;
        let carol = add_participant(&fixture, "Carol").await;

        for (participant, option) in [(alice, "opt1"), (bob, "opt1"), (carol, "opt2")] {
            submit_answer(&fixture.state, submission(&fixture, participant, option, 3_000))
                .await
                .unwrap();
        }

        let stats = question_statistics(&fixture.state, fixture.activity_id, fixture.questions[0])
            .await
            .unwrap();
        assert_eq!(stats.total_responses, 3);
        assert_eq!(stats.options["opt1"].count, 2);
        assert_eq!(stats.options["opt1"].percentage, 66.7);
        assert!(stats.options["opt1"].is_correct);
        assert_eq!(stats.options["opt2"].percentage, 33.3);

        let ended = end(&fixture.state, fixture.activity_id).await.unwrap();
        assert_eq!(ended.activity.status, ActivityStatus::Completed);
        assert_eq!(ended.summary.participant_count, 3);
        assert_eq!(ended.summary.final_leaderboard.last().unwrap().participant_id, carol);
        assert_eq!(ended.summary.top_three.len(), 3);
        assert_eq!(ended.summary.top_three[0].rank, 1);

        assert!(matches!(
            submit_answer(&fixture.state, submission(&fixture, carol, "opt1", 1_000)).await,
            Err(ServiceError::InvalidState(_))
        ));
    }
}
