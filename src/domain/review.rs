//! Review aggregate math.
//!
//! Product ratings are always recomputed from the full review set, never
//! adjusted incrementally, so the stored average cannot drift.

use rust_decimal::{Decimal, RoundingStrategy};

/// Mean of all current ratings, rounded half-away-from-zero to 1 dp — the
/// same rule NUMERIC `ROUND()` applies in the recompute statement. Zero
/// when there are no reviews.
pub fn average_rating(ratings: &[i32]) -> Decimal {
    if ratings.is_empty() {
        return Decimal::ZERO;
    }
    let sum: i64 = ratings.iter().map(|&r| r as i64).sum();
    (Decimal::from(sum) / Decimal::from(ratings.len() as i64))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_set_is_zero() {
        assert_eq!(average_rating(&[]), Decimal::ZERO);
    }

    #[test]
    fn mean_rounds_to_one_place() {
        assert_eq!(average_rating(&[5]), dec!(5.0));
        assert_eq!(average_rating(&[4, 5]), dec!(4.5));
        assert_eq!(average_rating(&[3, 4, 4]), dec!(3.7));
        assert_eq!(average_rating(&[1, 1, 5]), dec!(2.3));
    }

    #[test]
    fn midpoints_round_up_like_numeric_round() {
        // 13/4 = 3.25 and 11/4 = 2.75 sit exactly on the midpoint.
        assert_eq!(average_rating(&[3, 3, 3, 4]), dec!(3.3));
        assert_eq!(average_rating(&[2, 3, 3, 3]), dec!(2.8));
    }

    #[test]
    fn overwrite_keeps_single_record() {
        // A re-review replaces the prior rating rather than adding one.
        let before = average_rating(&[2, 4]);
        let after = average_rating(&[5, 4]);
        assert_eq!(before, dec!(3.0));
        assert_eq!(after, dec!(4.5));
    }
}
