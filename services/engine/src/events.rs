//! Outbound event boundary
//!
//! The core depends on two fire-and-forget collaborators it does not
//! implement: an event sink that persists trade/market state durably,
//! and a publish channel streaming live snapshots to subscribers.
//! Implementations log their own failures; an order that already
//! settled against the ledger and book never fails because emission
//! did.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::debug;
use types::ids::{MarketId, OrderId, Symbol, UserId};
use types::market::{Activity, AggregatedBook, PricePoint};
use types::numeric::Price;
use types::order::{Action, Side};

/// Durable event emitted toward the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "data")]
pub enum EngineEvent {
    #[serde(rename = "ORDER_PLACED")]
    #[serde(rename_all = "camelCase")]
    OrderPlaced {
        order_id: OrderId,
        market_id: MarketId,
        symbol: Symbol,
        user_id: UserId,
        side: Side,
        action: Action,
        price: Price,
        original_quantity: u64,
        filled_quantity: u64,
        remaining_quantity: u64,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "RECORD_ACTIVITY")]
    #[serde(rename_all = "camelCase")]
    ActivityRecorded {
        market_id: MarketId,
        symbol: Symbol,
        activity: Activity,
    },

    #[serde(rename = "UPDATE_MARKET_TIMELINE")]
    #[serde(rename_all = "camelCase")]
    TimelineUpdated {
        market_id: MarketId,
        point: PricePoint,
    },

    #[serde(rename = "UPDATE_STOCK_PRICE")]
    #[serde(rename_all = "camelCase")]
    StockPriceUpdated {
        market_id: MarketId,
        yes_price: Decimal,
        no_price: Decimal,
    },

    #[serde(rename = "INCREASE_TRADERS_COUNT")]
    #[serde(rename_all = "camelCase")]
    TraderCountIncreased { market_id: MarketId, count: u64 },
}

impl EngineEvent {
    /// Stable label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            EngineEvent::OrderPlaced { .. } => "ORDER_PLACED",
            EngineEvent::ActivityRecorded { .. } => "RECORD_ACTIVITY",
            EngineEvent::TimelineUpdated { .. } => "UPDATE_MARKET_TIMELINE",
            EngineEvent::StockPriceUpdated { .. } => "UPDATE_STOCK_PRICE",
            EngineEvent::TraderCountIncreased { .. } => "INCREASE_TRADERS_COUNT",
        }
    }
}

/// Combined live snapshot published after each processed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSnapshot {
    pub symbol: Symbol,
    pub orderbook: AggregatedBook,
    pub yes_price: Decimal,
    pub no_price: Decimal,
    pub timeline: Vec<PricePoint>,
    pub activities: Vec<Activity>,
}

/// Durable persistence sink. Fire-and-forget: no acknowledgment is
/// awaited by the core.
pub trait EventSink: Send + Sync {
    fn emit(&self, topic: &str, event: EngineEvent);
}

/// Live-stream publish channel. Fire-and-forget.
pub trait StreamPublisher: Send + Sync {
    fn publish(&self, channel: &str, message: String);
}

/// Sink that drops everything, for wiring the engine without a store.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, topic: &str, event: EngineEvent) {
        debug!(topic, event = event.label(), "Event dropped (null sink)");
    }
}

impl StreamPublisher for NullSink {
    fn publish(&self, channel: &str, _message: String) {
        debug!(channel, "Snapshot dropped (null sink)");
    }
}

/// In-memory sink recording every emission, for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(String, EngineEvent)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, EngineEvent)> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Events with the given label, any topic.
    pub fn labeled(&self, label: &str) -> Vec<EngineEvent> {
        self.events()
            .into_iter()
            .filter(|(_, event)| event.label() == label)
            .map(|(_, event)| event)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, topic: &str, event: EngineEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((topic.to_string(), event));
    }
}

/// In-memory publisher recording every message, for tests.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<(String, String)>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl StreamPublisher for MemoryPublisher {
    fn publish(&self, channel: &str, message: String) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((channel.to_string(), message));
    }
}
