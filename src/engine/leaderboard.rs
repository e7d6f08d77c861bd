// src/engine/leaderboard.rs

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::player::Player;
use crate::models::results::LeaderboardEntry;

/// Builds the final ranking from per-player stats.
///
/// Total order: score descending, then correct count descending, then mean
/// time-to-submit ascending (players who never answered sort after those who
/// did), then join order. The last key is unique per room, so the output is
/// independent of input iteration order.
pub fn build(players: &HashMap<String, Player>) -> Vec<LeaderboardEntry> {
    let mut seats: Vec<&Player> = players.values().collect();
    seats.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.correct_answers.cmp(&a.correct_answers))
            .then_with(|| cmp_mean_elapsed(a, b))
            .then_with(|| a.join_seq.cmp(&b.join_seq))
    });

    seats
        .into_iter()
        .enumerate()
        .map(|(index, player)| LeaderboardEntry {
            rank: index + 1,
            user_id: player.id.clone(),
            username: player.username.clone(),
            score: player.score,
            correct_answers: player.correct_answers,
            wrong_answers: player.wrong_answers,
            tab_switches: player.tab_switches,
        })
        .collect()
}

fn cmp_mean_elapsed(a: &Player, b: &Player) -> Ordering {
    match (a.mean_elapsed_ms(), b.mean_elapsed_ms()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::player::Submission;
    use chrono::Utc;

    fn player(id: &str, join_seq: u64, score: i64, correct: u32) -> Player {
        let mut p = Player::new(id.to_string(), id.to_uppercase(), join_seq, Utc::now());
        p.score = score;
        p.correct_answers = correct;
        p
    }

    fn with_answer(mut p: Player, index: usize, elapsed_ms: u64) -> Player {
        p.answers.insert(index, Submission { selected: vec![0], elapsed_ms });
        p
    }

    fn ids(entries: &[LeaderboardEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.user_id.as_str()).collect()
    }

    #[test]
    fn orders_by_score_descending() {
        let mut players = HashMap::new();
        players.insert("a".into(), player("a", 0, 100, 1));
        players.insert("b".into(), player("b", 1, 300, 3));
        players.insert("c".into(), player("c", 2, 200, 2));

        let board = build(&players);
        assert_eq!(ids(&board), vec!["b", "c", "a"]);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[2].rank, 3);
    }

    #[test]
    fn equal_scores_break_on_correct_count() {
        let mut players = HashMap::new();
        players.insert("a".into(), player("a", 0, 100, 1));
        players.insert("b".into(), player("b", 1, 100, 2));

        assert_eq!(ids(&build(&players)), vec!["b", "a"]);
    }

    #[test]
    fn equal_correct_break_on_mean_elapsed() {
        let mut players = HashMap::new();
        players.insert("slow".into(), with_answer(player("slow", 0, 100, 1), 0, 8_000));
        players.insert("fast".into(), with_answer(player("fast", 1, 100, 1), 0, 2_000));

        assert_eq!(ids(&build(&players)), vec!["fast", "slow"]);
    }

    #[test]
    fn never_answered_sorts_after_answered_within_tie() {
        let mut players = HashMap::new();
        players.insert("mute".into(), player("mute", 0, 0, 0));
        players.insert("tried".into(), with_answer(player("tried", 1, 0, 0), 0, 9_000));

        assert_eq!(ids(&build(&players)), vec!["tried", "mute"]);
    }

    #[test]
    fn final_tie_break_is_join_order() {
        let mut players = HashMap::new();
        players.insert("late".into(), player("late", 5, 0, 0));
        players.insert("early".into(), player("early", 1, 0, 0));

        assert_eq!(ids(&build(&players)), vec!["early", "late"]);
    }

    #[test]
    fn ranking_is_input_order_independent() {
        let seats = vec![
            player("a", 0, 100, 1),
            with_answer(player("b", 1, 100, 1), 0, 500),
            player("c", 2, 250, 2),
            player("d", 3, 100, 2),
        ];

        let mut forward = HashMap::new();
        for p in seats.iter().cloned() {
            forward.insert(p.id.clone(), p);
        }
        let mut reverse = HashMap::new();
        for p in seats.iter().rev().cloned() {
            reverse.insert(p.id.clone(), p);
        }

        assert_eq!(ids(&build(&forward)), ids(&build(&reverse)));
    }
}
