//! Per-market order book
//!
//! Two resting sequences, one per outcome side, holding LIMIT orders
//! only. Each sequence is kept sorted by descending price; the sort is
//! stable, so orders at the same price keep their arrival order and
//! fill FIFO within a level. Fully filled orders are removed by the
//! matching loop the moment the completing fill lands.

use std::collections::BTreeMap;
use types::market::{AggregatedBook, PriceLevel};
use types::order::{Order, OrderType, Side};

/// The pair of resting-order sequences for one market.
#[derive(Debug, Default)]
pub struct OrderBook {
    yes: Vec<Order>,
    no: Vec<Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resting orders of one outcome side, best (highest) price first.
    pub fn side(&self, side: Side) -> &Vec<Order> {
        match side {
            Side::Yes => &self.yes,
            Side::No => &self.no,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut Vec<Order> {
        match side {
            Side::Yes => &mut self.yes,
            Side::No => &mut self.no,
        }
    }

    /// Insert a resting LIMIT order and re-sort its side.
    ///
    /// The sort is stable on price only, preserving FIFO among equal
    /// prices.
    ///
    /// # Panics
    /// Panics if handed a MARKET order; those never rest.
    pub fn insert(&mut self, order: Order) {
        assert_eq!(
            order.order_type,
            OrderType::Limit,
            "MARKET orders never rest"
        );

        let sequence = self.side_mut(order.side);
        sequence.push(order);
        sequence.sort_by(|a, b| b.price.cmp(&a.price));
    }

    /// Collapse both sides into price levels of unfilled quantity,
    /// ascending by price for external consumption. Exhausted orders
    /// contribute nothing.
    pub fn aggregate(&self) -> AggregatedBook {
        AggregatedBook {
            yes: Self::aggregate_side(&self.yes),
            no: Self::aggregate_side(&self.no),
        }
    }

    fn aggregate_side(orders: &[Order]) -> Vec<PriceLevel> {
        let mut levels: BTreeMap<types::numeric::Price, u64> = BTreeMap::new();

        for order in orders {
            let remaining = order.remaining();
            if remaining > 0 {
                *levels.entry(order.price).or_insert(0) += remaining;
            }
        }

        levels
            .into_iter()
            .map(|(price, quantity)| PriceLevel { price, quantity })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.yes.len() + self.no.len()
    }

    pub fn is_empty(&self) -> bool {
        self.yes.is_empty() && self.no.is_empty()
    }
}
