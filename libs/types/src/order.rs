//! Order lifecycle types

use crate::ids::{MarketId, OrderId, Symbol, UserId};
use crate::numeric::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Binary outcome side of a prediction market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "YES",
            Side::No => "NO",
        }
    }
}

/// Whether the order takes or provides shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    /// The action a resting counterparty must carry to be matchable.
    pub fn counterparty(&self) -> Self {
        match self {
            Action::Buy => Action::Sell,
            Action::Sell => Action::Buy,
        }
    }
}

/// Order type.
///
/// A `Limit` order rests on the book when it cannot fully cross; a
/// `Market` order never rests; any unfilled remainder is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
}

/// Role of the submitting party.
///
/// `Admin` orders seed liquidity and bypass wallet/position pre-checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

/// A buy/sell order for one outcome side of a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub market_id: MarketId,
    pub symbol: Symbol,
    pub side: Side,
    pub action: Action,
    pub order_type: OrderType,
    pub role: Role,
    pub price: Price,
    pub quantity: u64,
    pub filled: u64,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    /// Create a new unfilled order with a fresh id.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        market_id: MarketId,
        symbol: Symbol,
        side: Side,
        action: Action,
        order_type: OrderType,
        role: Role,
        price: Price,
        quantity: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id: OrderId::new(),
            user_id,
            market_id,
            symbol,
            side,
            action,
            order_type,
            role,
            price,
            quantity,
            filled: 0,
            timestamp,
        }
    }

    /// Unfilled remainder.
    pub fn remaining(&self) -> u64 {
        self.quantity - self.filled
    }

    pub fn is_filled(&self) -> bool {
        self.filled == self.quantity
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Record a fill against this order.
    ///
    /// # Panics
    /// Panics if the fill would exceed the order quantity.
    pub fn add_fill(&mut self, quantity: u64) {
        let new_filled = self.filled + quantity;
        assert!(
            new_filled <= self.quantity,
            "Fill would exceed order quantity"
        );
        self.filled = new_filled;
    }
}
