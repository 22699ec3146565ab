//! Market, activity, timeline and quote types

use crate::numeric::Price;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market lifecycle status.
///
/// `Closed` only gates new order acceptance; resting state survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    Closed,
}

/// Descriptive market metadata supplied at creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub title: String,
    pub category_id: String,
    pub thumbnail: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub source_of_truth: String,
    pub rules: String,
    pub eos: String,
}

/// One executed fill, recorded exactly once per match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub buyer_phone: String,
    pub seller_phone: String,
    pub outcome: String,
    pub price: Price,
    pub quantity: u64,
    pub timestamp: DateTime<Utc>,
}

/// A point on the market's quote timeline, appended when the quote moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub yes_price: Decimal,
    pub no_price: Decimal,
}

/// Aggregated resting quantity at one price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub quantity: u64,
}

/// Book collapsed into price levels, ascending by price per side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedBook {
    pub yes: Vec<PriceLevel>,
    pub no: Vec<PriceLevel>,
}

impl AggregatedBook {
    pub fn is_empty(&self) -> bool {
        self.yes.is_empty() && self.no.is_empty()
    }
}

/// The quoted (yesPrice, noPrice) pair on the 0–10 half-point scale.
///
/// The two sides are rounded independently and need not sum to 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub yes_price: Decimal,
    pub no_price: Decimal,
}

impl Quote {
    /// The even quote an empty book produces.
    pub fn even() -> Self {
        Self {
            yes_price: Decimal::from(5),
            no_price: Decimal::from(5),
        }
    }
}
