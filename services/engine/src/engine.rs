//! Engine facade
//!
//! Owns the ledger, the market registry and the outbound boundaries.
//! The registry maps symbols to running market workers; it is written
//! only on market creation, so lookups take a short read lock and all
//! order flow goes through the per-market inboxes.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use types::errors::{EngineError, MarketError};
use types::ids::{MarketId, Symbol, UserId};
use types::market::{
    Activity, AggregatedBook, MarketStatus, Overview, PricePoint,
};
use types::numeric::Price;
use types::order::{Action, Order, OrderType, Role, Side};

use crate::config::EngineConfig;
use crate::events::{EventSink, StreamPublisher};
use crate::ledger::Ledger;
use crate::market::{self, MarketHandle, OrderAck};

/// Full market view combining live book and descriptive state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDetails {
    pub market_id: MarketId,
    pub symbol: Symbol,
    pub status: MarketStatus,
    pub overview: Overview,
    pub orderbook: AggregatedBook,
    pub yes_price: Decimal,
    pub no_price: Decimal,
    pub timeline: Vec<PricePoint>,
    pub activities: Vec<Activity>,
    pub total_traders: u64,
}

/// Parameters for one order, as accepted from the outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub user_id: UserId,
    /// Optional; the market registry is the authority when omitted.
    #[serde(default)]
    pub market_id: Option<MarketId>,
    pub symbol: Symbol,
    pub side: Side,
    pub action: Action,
    pub order_type: OrderType,
    #[serde(default)]
    pub role: Role,
    pub price: Price,
    pub quantity: u64,
}

pub struct Engine {
    ledger: Arc<Ledger>,
    markets: RwLock<HashMap<Symbol, MarketHandle>>,
    sink: Arc<dyn EventSink>,
    publisher: Arc<dyn StreamPublisher>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        sink: Arc<dyn EventSink>,
        publisher: Arc<dyn StreamPublisher>,
    ) -> Self {
        Self {
            ledger: Arc::new(Ledger::new()),
            markets: RwLock::new(HashMap::new()),
            sink,
            publisher,
            config,
        }
    }

    /// Account and balance operations live on the ledger directly.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Register a market and start its worker.
    pub fn create_market(
        &self,
        market_id: MarketId,
        symbol: Symbol,
        overview: Overview,
    ) -> Result<(), EngineError> {
        let mut markets = self
            .markets
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if markets.contains_key(&symbol) {
            return Err(MarketError::AlreadyExists {
                symbol: symbol.to_string(),
            }
            .into());
        }

        let handle = market::spawn(
            market_id.clone(),
            symbol.clone(),
            overview,
            Arc::clone(&self.ledger),
            Arc::clone(&self.sink),
            Arc::clone(&self.publisher),
            self.config.sink_topic.clone(),
            self.config.stream_channel.clone(),
            self.config.inbox_capacity,
        );
        markets.insert(symbol.clone(), handle);
        info!(%market_id, %symbol, "Market created");
        Ok(())
    }

    fn market(&self, symbol: &Symbol) -> Result<MarketHandle, EngineError> {
        self.markets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .cloned()
            .ok_or_else(|| {
                MarketError::NotFound {
                    symbol: symbol.to_string(),
                }
                .into()
            })
    }

    /// Route one order to its market and wait for the result.
    pub async fn place_order(&self, request: OrderRequest) -> Result<OrderAck, EngineError> {
        let handle = self.market(&request.symbol)?;
        let market_id = match request.market_id {
            Some(id) => id,
            None => handle.read_state(|s| s.market_id.clone()),
        };
        let order = Order::new(
            request.user_id,
            market_id,
            request.symbol,
            request.side,
            request.action,
            request.order_type,
            request.role,
            request.price,
            request.quantity,
            Utc::now(),
        );
        handle.place_order(order, self.config.reply_timeout()).await
    }

    /// Seed both books with four admin LIMIT orders around the given
    /// prices. Admin orders bypass balance and position checks.
    pub async fn add_liquidity(
        &self,
        user_id: UserId,
        symbol: Symbol,
        yes_price: Price,
        no_price: Price,
        yes_quantity: u64,
        no_quantity: u64,
    ) -> Result<Vec<OrderAck>, EngineError> {
        let legs = [
            (Side::Yes, Action::Buy, yes_price, yes_quantity),
            (Side::Yes, Action::Sell, yes_price, yes_quantity),
            (Side::No, Action::Buy, no_price, no_quantity),
            (Side::No, Action::Sell, no_price, no_quantity),
        ];

        let mut acks = Vec::with_capacity(legs.len());
        for (side, action, price, quantity) in legs {
            let ack = self
                .place_order(OrderRequest {
                    user_id: user_id.clone(),
                    market_id: None,
                    symbol: symbol.clone(),
                    side,
                    action,
                    order_type: OrderType::Limit,
                    role: Role::Admin,
                    price,
                    quantity,
                })
                .await?;
            acks.push(ack);
        }
        Ok(acks)
    }

    pub async fn aggregated_book(&self, symbol: &Symbol) -> Result<AggregatedBook, EngineError> {
        let handle = self.market(symbol)?;
        handle.aggregated_book(self.config.reply_timeout()).await
    }

    /// Combined view for one market.
    pub async fn market_details(&self, symbol: &Symbol) -> Result<MarketDetails, EngineError> {
        let handle = self.market(symbol)?;
        let orderbook = handle.aggregated_book(self.config.reply_timeout()).await?;
        Ok(handle.read_state(|state| MarketDetails {
            market_id: state.market_id.clone(),
            symbol: state.symbol.clone(),
            status: state.status,
            overview: state.overview.clone(),
            orderbook,
            yes_price: state.quote.yes_price,
            no_price: state.quote.no_price,
            timeline: state.timeline.clone(),
            activities: state.activities.clone(),
            total_traders: state.traders.len() as u64,
        }))
    }

    /// Stop a market from accepting new orders.
    pub fn close_market(&self, symbol: &Symbol) -> Result<(), EngineError> {
        let handle = self.market(symbol)?;
        handle.close();
        Ok(())
    }
}
