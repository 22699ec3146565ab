//! Derived quote computation
//!
//! The quoted probability of the YES outcome is the notional-weighted
//! share of the YES side in the aggregated book:
//! `p = totalYesNotional / (totalYesNotional + totalNoNotional)`, with
//! `p = 0.5` for an empty book. Quoted prices discretize `p` onto the
//! 0–10 half-point grid, each side rounded independently. The pair
//! need not sum to exactly 10, and downstream consumers rely on that
//! exact behavior.

use rust_decimal::{Decimal, RoundingStrategy};
use types::market::{AggregatedBook, Quote};

/// Probability of the YES outcome implied by resting notional.
pub fn yes_probability(book: &AggregatedBook) -> Decimal {
    let total_yes: Decimal = book
        .yes
        .iter()
        .map(|level| level.price.notional(level.quantity))
        .sum();
    let total_no: Decimal = book
        .no
        .iter()
        .map(|level| level.price.notional(level.quantity))
        .sum();

    let total = total_yes + total_no;
    if total.is_zero() {
        // Even odds by convention
        return Decimal::new(5, 1);
    }

    total_yes / total
}

/// Discretize a probability onto the 0–10 half-point scale.
///
/// Midpoints round away from zero, matching the canonical rounding of
/// the upstream services.
fn half_point(probability: Decimal) -> Decimal {
    (probability * Decimal::from(20))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        / Decimal::from(2)
}

/// Quote both sides from a probability.
pub fn quote_from(probability: Decimal) -> Quote {
    Quote {
        yes_price: half_point(probability),
        no_price: half_point(Decimal::ONE - probability),
    }
}

/// Quote directly from an aggregated book.
pub fn quote(book: &AggregatedBook) -> Quote {
    quote_from(yes_probability(book))
}
