//! Per-market worker
//!
//! Each market runs as one task owning its order book exclusively.
//! Orders arrive over a bounded inbox and are processed strictly in
//! arrival order, so no two orders for the same market ever interleave.
//! Descriptive state (quote, timeline, activities, traders) lives
//! behind a shared lock so snapshot reads never have to queue behind
//! order flow.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use types::errors::{EngineError, MarketError};
use types::ids::{MarketId, Symbol, UserId};
use types::market::{Activity, AggregatedBook, MarketStatus, Overview, PricePoint, Quote};
use types::order::Order;

use crate::book::OrderBook;
use crate::events::{EngineEvent, EventSink, StreamPublisher, StreamSnapshot};
use crate::ledger::Ledger;
use crate::pricing;

/// Outcome of a processed order, returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: types::ids::OrderId,
    pub filled: u64,
    pub remaining: u64,
    pub rested: bool,
    pub quote: Quote,
}

/// Messages a market worker accepts.
#[derive(Debug)]
pub enum MarketMessage {
    PlaceOrder {
        order: Order,
        reply: oneshot::Sender<Result<OrderAck, EngineError>>,
    },
    GetBook {
        reply: oneshot::Sender<AggregatedBook>,
    },
}

/// Descriptive market state, readable without going through the worker.
#[derive(Debug)]
pub struct MarketState {
    pub market_id: MarketId,
    pub symbol: Symbol,
    pub status: MarketStatus,
    pub overview: Overview,
    pub quote: Quote,
    pub timeline: Vec<PricePoint>,
    pub activities: Vec<Activity>,
    pub traders: HashSet<UserId>,
}

impl MarketState {
    fn new(market_id: MarketId, symbol: Symbol, overview: Overview) -> Self {
        Self {
            market_id,
            symbol,
            status: MarketStatus::Open,
            overview,
            quote: Quote::even(),
            timeline: Vec::new(),
            activities: Vec::new(),
            traders: HashSet::new(),
        }
    }
}

/// Handle to a spawned market worker.
#[derive(Clone)]
pub struct MarketHandle {
    pub symbol: Symbol,
    inbox: mpsc::Sender<MarketMessage>,
    shared: Arc<RwLock<MarketState>>,
}

impl MarketHandle {
    /// Queue one order and wait for its result.
    pub async fn place_order(
        &self,
        order: Order,
        timeout: std::time::Duration,
    ) -> Result<OrderAck, EngineError> {
        let (reply, response) = oneshot::channel();
        self.inbox
            .send(MarketMessage::PlaceOrder { order, reply })
            .await
            .map_err(|_| MarketError::Unavailable {
                symbol: self.symbol.to_string(),
            })?;

        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(MarketError::Unavailable {
                symbol: self.symbol.to_string(),
            }
            .into()),
            Err(_) => Err(MarketError::ReplyTimeout {
                symbol: self.symbol.to_string(),
            }
            .into()),
        }
    }

    /// Fetch the aggregated book from the worker.
    pub async fn aggregated_book(
        &self,
        timeout: std::time::Duration,
    ) -> Result<AggregatedBook, EngineError> {
        let (reply, response) = oneshot::channel();
        self.inbox
            .send(MarketMessage::GetBook { reply })
            .await
            .map_err(|_| MarketError::Unavailable {
                symbol: self.symbol.to_string(),
            })?;

        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(book)) => Ok(book),
            Ok(Err(_)) => Err(MarketError::Unavailable {
                symbol: self.symbol.to_string(),
            }
            .into()),
            Err(_) => Err(MarketError::ReplyTimeout {
                symbol: self.symbol.to_string(),
            }
            .into()),
        }
    }

    /// Read the shared descriptive state.
    pub fn read_state<T>(&self, f: impl FnOnce(&MarketState) -> T) -> T {
        let state = self.shared.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Stop accepting new orders. Resting state is untouched.
    pub fn close(&self) {
        let mut state = self.shared.write().unwrap_or_else(PoisonError::into_inner);
        state.status = MarketStatus::Closed;
        info!(symbol = %self.symbol, "Market closed");
    }
}

/// Spawn a market worker and return its handle.
pub fn spawn(
    market_id: MarketId,
    symbol: Symbol,
    overview: Overview,
    ledger: Arc<Ledger>,
    sink: Arc<dyn EventSink>,
    publisher: Arc<dyn StreamPublisher>,
    sink_topic: String,
    stream_channel: String,
    inbox_capacity: usize,
) -> MarketHandle {
    let (tx, rx) = mpsc::channel(inbox_capacity);
    let shared = Arc::new(RwLock::new(MarketState::new(
        market_id,
        symbol.clone(),
        overview,
    )));

    let worker = MarketWorker {
        symbol: symbol.clone(),
        book: OrderBook::new(),
        ledger,
        sink,
        publisher,
        sink_topic,
        stream_channel,
        shared: Arc::clone(&shared),
    };
    tokio::spawn(worker.run(rx));

    MarketHandle {
        symbol,
        inbox: tx,
        shared,
    }
}

struct MarketWorker {
    symbol: Symbol,
    book: OrderBook,
    ledger: Arc<Ledger>,
    sink: Arc<dyn EventSink>,
    publisher: Arc<dyn StreamPublisher>,
    sink_topic: String,
    stream_channel: String,
    shared: Arc<RwLock<MarketState>>,
}

impl MarketWorker {
    async fn run(mut self, mut inbox: mpsc::Receiver<MarketMessage>) {
        info!(symbol = %self.symbol, "Market worker started");

        while let Some(message) = inbox.recv().await {
            match message {
                MarketMessage::PlaceOrder { order, reply } => {
                    let result = self.handle_order(order);
                    if reply.send(result).is_err() {
                        warn!(symbol = %self.symbol, "Order reply receiver dropped");
                    }
                }
                MarketMessage::GetBook { reply } => {
                    if reply.send(self.book.aggregate()).is_err() {
                        debug!(symbol = %self.symbol, "Book reply receiver dropped");
                    }
                }
            }
        }

        info!(symbol = %self.symbol, "Market worker stopped");
    }

    fn handle_order(&mut self, order: Order) -> Result<OrderAck, EngineError> {
        {
            let state = self.shared.read().unwrap_or_else(PoisonError::into_inner);
            if state.status == MarketStatus::Closed {
                return Err(MarketError::Closed {
                    symbol: self.symbol.to_string(),
                }
                .into());
            }
        }

        let order_id = order.order_id;
        let outcome = crate::matching::execute(&self.ledger, &mut self.book, order)?;

        info!(
            symbol = %self.symbol,
            order_id = %order_id,
            filled = outcome.order.filled,
            remaining = outcome.order.remaining(),
            rested = outcome.rested,
            fills = outcome.activities.len(),
            "Order processed"
        );

        let quote = pricing::quote(&self.book.aggregate());
        let ack = OrderAck {
            order_id,
            filled: outcome.order.filled,
            remaining: outcome.order.remaining(),
            rested: outcome.rested,
            quote,
        };

        self.sink.emit(
            &self.sink_topic,
            EngineEvent::OrderPlaced {
                order_id,
                market_id: self.market_id(),
                symbol: self.symbol.clone(),
                user_id: outcome.order.user_id.clone(),
                side: outcome.order.side,
                action: outcome.order.action,
                price: outcome.order.price,
                original_quantity: outcome.order.quantity,
                filled_quantity: outcome.order.filled,
                remaining_quantity: outcome.order.remaining(),
                timestamp: outcome.order.timestamp,
            },
        );

        self.record_activities(&outcome.activities);
        self.register_traders(&outcome.participants);
        self.update_quote(quote);
        self.publish_snapshot(quote);

        Ok(ack)
    }

    fn market_id(&self) -> MarketId {
        self.shared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .market_id
            .clone()
    }

    fn record_activities(&self, activities: &[Activity]) {
        if activities.is_empty() {
            return;
        }
        let market_id = self.market_id();
        let mut state = self.shared.write().unwrap_or_else(PoisonError::into_inner);
        for activity in activities {
            state.activities.push(activity.clone());
            self.sink.emit(
                &self.sink_topic,
                EngineEvent::ActivityRecorded {
                    market_id: market_id.clone(),
                    symbol: self.symbol.clone(),
                    activity: activity.clone(),
                },
            );
        }
    }

    /// Register every user the order touched, emitting one single-unit
    /// increment event per first appearance in this market.
    fn register_traders(&self, participants: &[UserId]) {
        let market_id = self.market_id();
        let mut state = self.shared.write().unwrap_or_else(PoisonError::into_inner);
        for user in participants {
            if state.traders.insert(user.clone()) {
                self.sink.emit(
                    &self.sink_topic,
                    EngineEvent::TraderCountIncreased {
                        market_id: market_id.clone(),
                        count: 1,
                    },
                );
            }
        }
    }

    /// Store the fresh quote; the timeline only grows when it moved.
    fn update_quote(&self, quote: Quote) {
        let market_id = self.market_id();
        let mut state = self.shared.write().unwrap_or_else(PoisonError::into_inner);

        self.sink.emit(
            &self.sink_topic,
            EngineEvent::StockPriceUpdated {
                market_id: market_id.clone(),
                yes_price: quote.yes_price,
                no_price: quote.no_price,
            },
        );

        if quote != state.quote {
            let point = PricePoint {
                timestamp: Utc::now(),
                yes_price: quote.yes_price,
                no_price: quote.no_price,
            };
            state.timeline.push(point.clone());
            state.quote = quote;
            self.sink.emit(
                &self.sink_topic,
                EngineEvent::TimelineUpdated { market_id, point },
            );
        }
    }

    fn publish_snapshot(&self, quote: Quote) {
        let snapshot = {
            let state = self.shared.read().unwrap_or_else(PoisonError::into_inner);
            StreamSnapshot {
                symbol: self.symbol.clone(),
                orderbook: self.book.aggregate(),
                yes_price: quote.yes_price,
                no_price: quote.no_price,
                timeline: state.timeline.clone(),
                activities: state.activities.clone(),
            }
        };

        match serde_json::to_string(&snapshot) {
            Ok(message) => self.publisher.publish(&self.stream_channel, message),
            Err(err) => error!(symbol = %self.symbol, %err, "Snapshot serialization failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MemoryPublisher, MemorySink};
    use rust_decimal::Decimal;
    use std::time::Duration;
    use types::numeric::Price;
    use types::order::{Action, OrderType, Role, Side};

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn setup() -> (Arc<Ledger>, Arc<MemorySink>, Arc<MemoryPublisher>, MarketHandle) {
        let ledger = Arc::new(Ledger::new());
        let sink = Arc::new(MemorySink::new());
        let publisher = Arc::new(MemoryPublisher::new());
        let handle = spawn(
            MarketId::new("mkt-1"),
            Symbol::new("RAIN-TOMORROW"),
            Overview::default(),
            Arc::clone(&ledger),
            sink.clone() as Arc<dyn EventSink>,
            publisher.clone() as Arc<dyn StreamPublisher>,
            "process_db".to_string(),
            "stream:data".to_string(),
            16,
        );
        (ledger, sink, publisher, handle)
    }

    fn funded_user(ledger: &Ledger, name: &str, funds: u64) -> UserId {
        let user = UserId::new(name);
        ledger
            .create_account(user.clone(), format!("+1555{name}"))
            .unwrap();
        if funds > 0 {
            ledger.deposit(&user, Decimal::from(funds)).unwrap();
        }
        user
    }

    fn limit_order(user: &UserId, side: Side, action: Action, role: Role, price: &str, quantity: u64) -> Order {
        Order::new(
            user.clone(),
            MarketId::new("mkt-1"),
            Symbol::new("RAIN-TOMORROW"),
            side,
            action,
            OrderType::Limit,
            role,
            Price::from_str(price).unwrap(),
            quantity,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_order_flow_emits_events_and_snapshot() {
        let (ledger, sink, publisher, handle) = setup();
        let alice = funded_user(&ledger, "alice", 1000);

        let ack = handle
            .place_order(
                limit_order(&alice, Side::Yes, Action::Buy, Role::User, "6.0", 10),
                TIMEOUT,
            )
            .await
            .unwrap();

        assert_eq!(ack.filled, 0);
        assert!(ack.rested);
        // One-sided book of YES notional quotes all the way up
        assert_eq!(ack.quote.yes_price, Decimal::from(10));

        assert_eq!(sink.labeled("ORDER_PLACED").len(), 1);
        assert_eq!(sink.labeled("UPDATE_STOCK_PRICE").len(), 1);
        assert_eq!(sink.labeled("UPDATE_MARKET_TIMELINE").len(), 1);
        assert_eq!(sink.labeled("INCREASE_TRADERS_COUNT").len(), 1);
        assert!(sink.labeled("RECORD_ACTIVITY").is_empty());

        let messages = publisher.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "stream:data");
        let snapshot: StreamSnapshot = serde_json::from_str(&messages[0].1).unwrap();
        assert_eq!(snapshot.symbol, Symbol::new("RAIN-TOMORROW"));
        assert_eq!(snapshot.orderbook.yes.len(), 1);
    }

    #[tokio::test]
    async fn test_fill_records_activity_and_both_traders() {
        let (ledger, sink, _publisher, handle) = setup();
        let house = funded_user(&ledger, "house", 0);
        let alice = funded_user(&ledger, "alice", 1000);

        handle
            .place_order(
                limit_order(&house, Side::Yes, Action::Sell, Role::Admin, "4.0", 10),
                TIMEOUT,
            )
            .await
            .unwrap();
        let ack = handle
            .place_order(
                limit_order(&alice, Side::Yes, Action::Buy, Role::User, "4.0", 10),
                TIMEOUT,
            )
            .await
            .unwrap();

        assert_eq!(ack.filled, 10);
        assert_eq!(sink.labeled("RECORD_ACTIVITY").len(), 1);
        // house on its ask, then alice on her fill, one increment each
        let increments = sink.labeled("INCREASE_TRADERS_COUNT");
        assert_eq!(increments.len(), 2);
        for event in &increments {
            match event {
                EngineEvent::TraderCountIncreased { count, .. } => assert_eq!(*count, 1),
                other => panic!("unexpected event: {other:?}"),
            }
        }

        assert_eq!(handle.read_state(|s| s.traders.len()), 2);
        assert_eq!(handle.read_state(|s| s.activities.len()), 1);
    }

    #[tokio::test]
    async fn test_timeline_grows_only_on_quote_change() {
        let (ledger, _sink, _publisher, handle) = setup();
        let house = funded_user(&ledger, "house", 0);

        handle
            .place_order(
                limit_order(&house, Side::Yes, Action::Sell, Role::Admin, "5.0", 10),
                TIMEOUT,
            )
            .await
            .unwrap();
        let first = handle.read_state(|s| s.timeline.len());

        // Same-side liquidity at the same notional leaves the quote at 10
        handle
            .place_order(
                limit_order(&house, Side::Yes, Action::Sell, Role::Admin, "5.0", 10),
                TIMEOUT,
            )
            .await
            .unwrap();
        let second = handle.read_state(|s| s.timeline.len());

        assert_eq!(first, 1);
        assert_eq!(second, 1);
    }

    #[tokio::test]
    async fn test_closed_market_rejects_orders() {
        let (ledger, _sink, _publisher, handle) = setup();
        let alice = funded_user(&ledger, "alice", 1000);

        handle.close();
        let err = handle
            .place_order(
                limit_order(&alice, Side::Yes, Action::Buy, Role::User, "5.0", 1),
                TIMEOUT,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Market(MarketError::Closed { .. })
        ));
        // Nothing was reserved for the rejected order
        assert_eq!(ledger.balance_of(&alice).unwrap().locked, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_failed_order_still_replies() {
        let (ledger, sink, _publisher, handle) = setup();
        let alice = funded_user(&ledger, "alice", 3);

        let err = handle
            .place_order(
                limit_order(&alice, Side::Yes, Action::Buy, Role::User, "5.0", 10),
                TIMEOUT,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Ledger(_)));
        assert!(sink.labeled("ORDER_PLACED").is_empty());
    }

    #[tokio::test]
    async fn test_get_book_reflects_resting_orders() {
        let (ledger, _sink, _publisher, handle) = setup();
        let alice = funded_user(&ledger, "alice", 1000);

        handle
            .place_order(
                limit_order(&alice, Side::No, Action::Buy, Role::User, "3.0", 5),
                TIMEOUT,
            )
            .await
            .unwrap();

        let book = handle.aggregated_book(TIMEOUT).await.unwrap();
        assert!(book.yes.is_empty());
        assert_eq!(book.no.len(), 1);
        assert_eq!(book.no[0].quantity, 5);
    }
}
