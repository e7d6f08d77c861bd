// src/engine/scoring.rs

use std::collections::BTreeSet;

use crate::models::quiz::Question;

/// Bonus multiplier for an answer submitted the instant the round opened.
pub const TIME_BONUS_MAX: f64 = 1.0;
/// Bonus multiplier floor, reached as elapsed time approaches the limit.
pub const TIME_BONUS_FLOOR: f64 = 0.5;

/// Whether a submission is correct: the selected set must equal the correct
/// set exactly, for both question kinds. No partial credit for subsets or
/// supersets.
pub fn is_correct(question: &Question, selected: &[usize]) -> bool {
    let want: BTreeSet<usize> = question.correct.iter().copied().collect();
    let got: BTreeSet<usize> = selected.iter().copied().collect();
    want == got
}

/// Linear decay from [`TIME_BONUS_MAX`] at elapsed 0 to [`TIME_BONUS_FLOOR`]
/// at the time limit. Elapsed times past the limit clamp to the floor.
pub fn time_bonus(elapsed_ms: u64, time_limit_secs: u64) -> f64 {
    let limit_ms = time_limit_secs.saturating_mul(1000).max(1);
    let fraction = (elapsed_ms as f64 / limit_ms as f64).clamp(0.0, 1.0);
    TIME_BONUS_MAX - (TIME_BONUS_MAX - TIME_BONUS_FLOOR) * fraction
}

/// Points for one submission: `points x time_bonus` rounded half up when
/// correct, zero otherwise.
pub fn score_answer(question: &Question, selected: &[usize], elapsed_ms: u64) -> i64 {
    if !is_correct(question, selected) {
        return 0;
    }
    round_half_up(f64::from(question.points) * time_bonus(elapsed_ms, question.time_limit))
}

fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}
