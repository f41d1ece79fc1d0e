//! Point, streak and ranking rules. Pure functions, no I/O.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{AnswerEntity, ParticipantEntity};

/// Points for a correct answer given within the fast window.
pub const MAX_POINTS: u32 = 1_000;
/// Floor for a correct answer, reached at the end of the countdown.
pub const MIN_POINTS: u32 = 500;
/// Share of the countdown during which a correct answer earns [`MAX_POINTS`].
pub const FAST_RESPONSE_RATIO: f64 = 0.25;

/// Points earned by an answer.
///
/// Correct answers inside the first quarter of the countdown earn the full
/// 1000 points, then the reward decreases linearly to 500 at the deadline.
/// Answers past the deadline are clamped to 500.
pub fn calculate_points(is_correct: bool, response_time_ms: u64, timer_seconds: u32) -> u32 {
    if !is_correct {
        return 0;
    }

    let max_time_ms = f64::from(timer_seconds) * 1_000.0;
    let fast_threshold_ms = FAST_RESPONSE_RATIO * max_time_ms;
    let elapsed = response_time_ms as f64;

    if elapsed <= fast_threshold_ms {
        return MAX_POINTS;
    }
    if max_time_ms <= fast_threshold_ms {
        return MIN_POINTS;
    }

    let span = f64::from(MAX_POINTS - MIN_POINTS);
    let points = f64::from(MAX_POINTS)
        - span * (elapsed - fast_threshold_ms) / (max_time_ms - fast_threshold_ms);
    points
        .round()
        .clamp(f64::from(MIN_POINTS), f64::from(MAX_POINTS)) as u32
}

/// Streak counters of a participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakState {
    /// Consecutive correct answers.
    pub current: u32,
    /// Best run so far.
    pub longest: u32,
}

/// Counters after one more answer.
pub fn update_streak(is_correct: bool, state: StreakState) -> StreakState {
    let current = if is_correct {
        state.current.saturating_add(1)
    } else {
        0
    };
    StreakState {
        current,
        longest: state.longest.max(current),
    }
}

/// One row of a ranked leaderboard.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    /// Ranked participant.
    pub participant_id: Uuid,
    /// Display name.
    pub name: String,
    /// Points accumulated so far.
    pub score: u64,
    /// Sum of response times; breaks score ties.
    pub total_answer_time_ms: u64,
    /// Consecutive correct answers.
    pub current_streak: u32,
    /// Best run of correct answers.
    pub longest_streak: u32,
}

/// Rank participants by score (highest first), then by cumulative answer time
/// (fastest first). Remaining ties keep their input order.
pub fn rank_leaderboard(participants: &[ParticipantEntity]) -> Vec<LeaderboardEntry> {
    let mut ordered: Vec<&ParticipantEntity> = participants.iter().collect();
    ordered.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.total_answer_time_ms.cmp(&b.total_answer_time_ms))
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, participant)| LeaderboardEntry {
            rank: index + 1,
            participant_id: participant.id,
            name: participant.name.clone(),
            score: participant.score,
            total_answer_time_ms: participant.total_answer_time_ms,
            current_streak: participant.current_streak,
            longest_streak: participant.longest_streak,
        })
        .collect()
}

/// First three entries of a ranked leaderboard.
pub fn top_three(leaderboard: &[LeaderboardEntry]) -> Vec<LeaderboardEntry> {
    leaderboard.iter().take(3).cloned().collect()
}

/// Share of the answers that picked one option.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptionStatistics {
    /// Answers that picked the option.
    pub count: u32,
    /// Percentage of all responses with one decimal.
    pub percentage: f64,
    /// Whether the option is the right one.
    pub is_correct: bool,
}

/// Answer distribution of a question.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStatistics {
    /// Question the answers belong to.
    pub question_id: Uuid,
    /// Number of recorded answers.
    pub total_responses: u32,
    /// Identifier of the right option.
    pub correct_option_id: String,
    /// Keyed by option id; options nobody picked are absent.
    pub options: BTreeMap<String, OptionStatistics>,
}

/// Group answers by selected option.
///
/// Percentages carry one decimal and always add up to exactly 100 for a
/// non-empty answer set: shares are counted in tenths of a percent and the
/// tenths lost to truncation go to the options with the largest remainders
/// (option id order breaks ties).
pub fn answer_statistics(
    question_id: Uuid,
    correct_option_id: &str,
    answers: &[AnswerEntity],
) -> QuestionStatistics {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for answer in answers {
        *counts.entry(answer.selected_option_id.clone()).or_default() += 1;
    }

    let total = answers.len() as u32;
    let tenths = percentage_tenths(&counts, total);
    let options = counts
        .into_iter()
        .zip(tenths)
        .map(|((option_id, count), tenths)| {
            let is_correct = option_id == correct_option_id;
            (
                option_id,
                OptionStatistics {
                    count,
                    percentage: f64::from(tenths) / 10.0,
                    is_correct,
                },
            )
        })
        .collect();

    QuestionStatistics {
        question_id,
        total_responses: total,
        correct_option_id: correct_option_id.to_owned(),
        options,
    }
}

/// Largest-remainder split of 1000 tenths, in the map's iteration order.
fn percentage_tenths(counts: &BTreeMap<String, u32>, total: u32) -> Vec<u32> {
    const WHOLE: u64 = 1_000;
    if total == 0 {
        return vec![0; counts.len()];
    }

    let total = u64::from(total);
    let mut shares: Vec<(u64, u64)> = counts
        .values()
        .map(|count| {
            let scaled = WHOLE * u64::from(*count);
            (scaled / total, scaled % total)
        })
        .collect();

    let assigned: u64 = shares.iter().map(|(tenths, _)| tenths).sum();
    let mut by_remainder: Vec<usize> = (0..shares.len()).collect();
    by_remainder.sort_by(|a, b| shares[*b].1.cmp(&shares[*a].1));
    for index in by_remainder
        .into_iter()
        .take(WHOLE.saturating_sub(assigned) as usize)
    {
        shares[index].0 += 1;
    }

    shares
        .into_iter()
        .map(|(tenths, _)| tenths as u32)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn participant(name: &str, score: u64, total_answer_time_ms: u64) -> ParticipantEntity {
        let mut participant = ParticipantEntity::new(Uuid::nil(), name.into());
        participant.score = score;
        participant.total_answer_time_ms = total_answer_time_ms;
        participant
    }

    fn answer(option: &str) -> AnswerEntity {
        AnswerEntity {
            participant_id: Uuid::new_v4(),
            question_id: Uuid::nil(),
            event_id: Uuid::nil(),
            activity_id: Uuid::nil(),
            selected_option_id: option.into(),
            response_time_ms: 1_000,
            is_correct: option == "opt1",
            points_earned: 0,
            submitted_at: SystemTime::now(),
        }
    }

    #[test]
    fn fast_correct_answers_earn_full_points() {
        for t in [0, 1, 3_750, 7_500] {
            assert_eq!(calculate_points(true, t, 30), MAX_POINTS, "t = {t}");
        }
    }

    #[test]
    fn incorrect_answers_earn_nothing() {
        for (t, s) in [(0, 1), (15_000, 30), (90_000, 30)] {
            assert_eq!(calculate_points(false, t, s), 0);
        }
    }

    #[test]
    fn points_decrease_towards_the_deadline() {
        let mut previous = MAX_POINTS;
        for t in (0..=30_000).step_by(250) {
            let points = calculate_points(true, t, 30);
            assert!(points <= previous, "points rose at t = {t}");
            previous = points;
        }
        assert_eq!(calculate_points(true, 30_000, 30), MIN_POINTS);
    }

    #[test]
    fn half_time_lands_between_bounds() {
        let points = calculate_points(true, 15_000, 30);
        assert!(points > MIN_POINTS && points < MAX_POINTS);
        assert_eq!(points, 833);
    }

    #[test]
    fn late_answers_clamp_to_floor() {
        assert_eq!(calculate_points(true, 45_000, 30), MIN_POINTS);
        assert_eq!(calculate_points(true, u64::MAX, 30), MIN_POINTS);
    }

    #[test]
    fn streak_law() {
        let state = StreakState {
            current: 2,
            longest: 5,
        };
        let next = update_streak(true, state);
        assert_eq!(next.current, 3);
        assert_eq!(next.longest, 5);

        let reset = update_streak(false, next);
        assert_eq!(reset.current, 0);
        assert_eq!(reset.longest, 5);

        let record = update_streak(
            true,
            StreakState {
                current: 5,
                longest: 5,
            },
        );
        assert_eq!(record.longest, 6);
    }

    #[test]
    fn leaderboard_orders_by_score_then_time() {
        let board = rank_leaderboard(&[
            participant("c", 500, 100),
            participant("a", 1_500, 9_000),
            participant("b", 1_000, 1),
        ]);
        let names: Vec<&str> = board.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        let ranks: Vec<usize> = board.iter().map(|entry| entry.rank).collect();
        assert_eq!(ranks, [1, 2, 3]);

        let tied = rank_leaderboard(&[
            participant("slow", 800, 9_000),
            participant("fast", 800, 3_000),
        ]);
        assert_eq!(tied[0].name, "fast");
    }

    #[test]
    fn exact_ties_keep_input_order() {
        let board = rank_leaderboard(&[
            participant("first", 700, 10),
            participant("second", 700, 10),
        ]);
        assert_eq!(board[0].name, "first");
        assert_eq!(board[1].rank, 2);
    }

    #[test]
    fn top_three_handles_short_boards() {
        assert!(top_three(&[]).is_empty());
        let board = rank_leaderboard(&[participant("solo", 10, 0)]);
        assert_eq!(top_three(&board).len(), 1);
        let board = rank_leaderboard(&[
            participant("a", 4, 0),
            participant("b", 3, 0),
            participant("c", 2, 0),
            participant("d", 1, 0),
        ]);
        let podium: Vec<String> = top_three(&board).into_iter().map(|entry| entry.name).collect();
        assert_eq!(podium, ["a", "b", "c"]);
    }

    #[test]
    fn statistics_group_answers_by_option() {
        let stats = answer_statistics(
            Uuid::nil(),
            "opt1",
            &[answer("opt1"), answer("opt2"), answer("opt1")],
        );

        assert_eq!(stats.total_responses, 3);
        assert_eq!(stats.options["opt1"].count, 2);
        assert_eq!(stats.options["opt1"].percentage, 66.7);
        assert!(stats.options["opt1"].is_correct);
        assert_eq!(stats.options["opt2"].count, 1);
        assert_eq!(stats.options["opt2"].percentage, 33.3);
        assert!(!stats.options["opt2"].is_correct);

        let sum: f64 = stats.options.values().map(|option| option.percentage).sum();
        assert!((sum - 100.0).abs() <= 0.1);
    }

    #[test]
    fn skewed_percentages_still_add_up_to_one_hundred() {
        let mut answers: Vec<AnswerEntity> = (0..10).map(|_| answer("opt1")).collect();
        answers.extend(["opt2", "opt3", "opt4", "opt5"].map(answer));

        let stats = answer_statistics(Uuid::nil(), "opt1", &answers);
        assert_eq!(stats.total_responses, 14);
        assert_eq!(stats.options["opt1"].percentage, 71.4);
        let minor: Vec<f64> = ["opt2", "opt3", "opt4", "opt5"]
            .iter()
            .map(|id| stats.options[*id].percentage)
            .collect();
        assert_eq!(minor, [7.2, 7.2, 7.1, 7.1]);

        let tenths: f64 = stats
            .options
            .values()
            .map(|option| (option.percentage * 10.0).round())
            .sum();
        assert_eq!(tenths, 1_000.0);
    }

    #[test]
    fn uneven_thirds_add_up_to_one_hundred() {
        let stats = answer_statistics(
            Uuid::nil(),
            "opt1",
            &[answer("opt1"), answer("opt2"), answer("opt3")],
        );
        let percentages: Vec<f64> = stats
            .options
            .values()
            .map(|option| option.percentage)
            .collect();
        assert_eq!(percentages, [33.4, 33.3, 33.3]);
    }

    #[test]
    fn empty_statistics_do_not_divide_by_zero() {
        let stats = answer_statistics(Uuid::nil(), "opt1", &[]);
        assert_eq!(stats.total_responses, 0);
        assert!(stats.options.is_empty());
    }
}
