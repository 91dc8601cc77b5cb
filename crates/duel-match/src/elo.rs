use duel_core::ELO_K;
use duel_core::Rating;

/// Outcome of a single player relative to their opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Tie,
    Loss,
}

impl Outcome {
    fn actual(self) -> f32 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Tie => 0.5,
            Outcome::Loss => 0.0,
        }
    }
}

/// Computes the §4.9 step-8 K=32 logistic rating delta for a player rated
/// `rating` against an opponent rated `opponent_rating`, given `outcome`.
/// Positive for a win, negative for a loss, small in either direction for
/// a tie between closely-rated players.
pub fn delta(rating: Rating, opponent_rating: Rating, outcome: Outcome) -> i32 {
    let expected = 1.0 / (1.0 + 10f32.powf((opponent_rating - rating) as f32 / 400.0));
    (ELO_K * (outcome.actual() - expected)).round() as i32
}

/// Computes both players' deltas from one match result at once, so callers
/// never accidentally derive one side's outcome inconsistently with the
/// other's.
pub fn update_pair(
    rating1: Rating,
    rating2: Rating,
    winner: Option<bool>,
) -> (i32, i32) {
    let (o1, o2) = match winner {
        Some(true) => (Outcome::Win, Outcome::Loss),
        Some(false) => (Outcome::Loss, Outcome::Win),
        None => (Outcome::Tie, Outcome::Tie),
    };
    (
        delta(rating1, rating2, o1),
        delta(rating2, rating1, o2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ratings_win_gains_half_of_k() {
        assert_eq!(delta(1000, 1000, Outcome::Win), 16);
        assert_eq!(delta(1000, 1000, Outcome::Loss), -16);
    }

    #[test]
    fn tie_between_equals_is_a_wash() {
        assert_eq!(delta(1000, 1000, Outcome::Tie), 0);
    }

    #[test]
    fn underdog_win_gains_more_than_favorite_win() {
        let underdog_gain = delta(900, 1100, Outcome::Win);
        let favorite_gain = delta(1100, 900, Outcome::Win);
        assert!(underdog_gain > favorite_gain);
    }

    #[test]
    fn update_pair_is_symmetric_for_a_tie() {
        let (d1, d2) = update_pair(1000, 1010, None);
        assert!((d1 + d2).abs() <= 1); // roughly zero-sum, up to rounding
        assert_eq!(delta(1000, 1010, Outcome::Tie), d1);
        assert_eq!(delta(1010, 1000, Outcome::Tie), d2);
    }

    #[test]
    fn update_pair_matches_winner_loser_deltas() {
        let (d1, d2) = update_pair(1000, 1010, Some(true));
        assert_eq!(d1, delta(1000, 1010, Outcome::Win));
        assert_eq!(d2, delta(1010, 1000, Outcome::Loss));
    }
}
