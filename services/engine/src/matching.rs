//! Order matching
//!
//! An incoming order crosses against resting orders in its own outcome
//! side's book; eligible counterparties are the resting orders carrying
//! the economically opposite action (an incoming BUY consumes
//! SELL-origin liquidity and vice versa). Execution always happens at
//! the resting order's price. LIMIT remainders rest; MARKET remainders
//! are discarded and their unused reservations returned.
//!
//! Pre-trade validation runs before the loop: a non-admin buyer
//! reserves the full order notional up front, a non-admin seller is
//! debited the full quantity up front. Admin orders bypass both checks
//! to seed liquidity.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::debug;
use types::errors::LedgerError;
use types::ids::UserId;
use types::market::Activity;
use types::order::{Action, Order, OrderType};

use crate::book::OrderBook;
use crate::ledger::Ledger;

/// Result of matching one incoming order.
#[derive(Debug)]
pub struct MatchOutcome {
    /// The incoming order with its fills applied.
    pub order: Order,
    /// One record per fill, in execution order.
    pub activities: Vec<Activity>,
    /// Whether an unfilled LIMIT remainder was inserted into the book.
    pub rested: bool,
    /// Users that took part, incoming user first, deduplicated.
    pub participants: Vec<UserId>,
}

/// Match `order` against `book`, settling every fill through `ledger`.
pub fn execute(
    ledger: &Ledger,
    book: &mut OrderBook,
    mut order: Order,
) -> Result<MatchOutcome, LedgerError> {
    let is_admin = order.is_admin();
    let reserved = match order.action {
        Action::Buy if !is_admin => {
            let notional = order.price.notional(order.quantity);
            ledger.reserve_funds(&order.user_id, notional)?;
            notional
        }
        Action::Buy => Decimal::ZERO,
        Action::Sell => {
            if !is_admin {
                ledger.debit_position(&order.user_id, &order.symbol, order.side, order.quantity)?;
            } else if !ledger.contains(&order.user_id) {
                return Err(LedgerError::AccountNotFound {
                    user_id: order.user_id.to_string(),
                });
            }
            Decimal::ZERO
        }
    };

    let counterparty_action = order.action.counterparty();
    let mut activities = Vec::new();
    let mut participants = vec![order.user_id.clone()];
    // Notional the incoming buyer actually consumed, for releasing the
    // unused part of the reservation afterwards.
    let mut spent = Decimal::ZERO;

    let sequence = book.side_mut(order.side);
    let mut i = 0;

    while i < sequence.len() && order.remaining() > 0 {
        let resting = &sequence[i];

        if resting.action != counterparty_action {
            i += 1;
            continue;
        }

        // Self-trade prevention: never consumed, never blocking.
        if resting.user_id == order.user_id {
            debug!(resting_order = %resting.order_id, "Skip self-trade");
            i += 1;
            continue;
        }

        if order.order_type == OrderType::Limit {
            let crossable = match order.action {
                Action::Buy => resting.price <= order.price,
                Action::Sell => resting.price >= order.price,
            };
            if !crossable {
                break;
            }
        }

        let quantity = order.remaining().min(resting.remaining());
        let price = resting.price;
        let (buyer, seller) = match order.action {
            Action::Buy => (order.user_id.clone(), resting.user_id.clone()),
            Action::Sell => (resting.user_id.clone(), order.user_id.clone()),
        };

        // Execution at the resting price; the buyer's reservation (or
        // for an incoming sell, the resting buyer's own reservation)
        // covers it.
        let (buyer_phone, seller_phone) =
            ledger.settle_fill(&buyer, &seller, &order.symbol, order.side, price, quantity)?;

        debug!(
            resting_order = %sequence[i].order_id,
            %price,
            quantity,
            "Executing trade"
        );

        order.add_fill(quantity);
        sequence[i].add_fill(quantity);

        if order.action == Action::Buy {
            spent += price.notional(quantity);
        }

        activities.push(Activity {
            buyer_phone,
            seller_phone,
            outcome: order.side.as_str().to_string(),
            price,
            quantity,
            timestamp: Utc::now(),
        });

        let counterparty = sequence[i].user_id.clone();
        if !participants.contains(&counterparty) {
            participants.push(counterparty);
        }

        if sequence[i].is_filled() {
            sequence.remove(i);
        } else {
            i += 1;
        }
    }

    let remaining = order.remaining();
    let mut rested = false;

    if remaining > 0 {
        match order.order_type {
            OrderType::Limit => {
                // Rest the remainder as a fresh unfilled order in the
                // same side's book, keeping the original id.
                let resting = Order {
                    quantity: remaining,
                    filled: 0,
                    ..order.clone()
                };
                book.insert(resting);
                rested = true;
            }
            OrderType::Market => {
                // Immediate-or-cancel: the remainder is dropped. A
                // non-admin seller gets the undelivered shares back.
                if order.action == Action::Sell && !is_admin {
                    ledger.credit_position(
                        &order.user_id,
                        &order.symbol,
                        order.side,
                        remaining,
                    )?;
                }
                debug!(
                    order_id = %order.order_id,
                    remaining,
                    "MARKET remainder discarded"
                );
            }
        }
    }

    // Return the part of a buy reservation that neither fills consumed
    // nor a resting remainder still needs.
    if order.action == Action::Buy && !is_admin {
        let still_needed = if rested {
            order.price.notional(remaining)
        } else {
            Decimal::ZERO
        };
        let unused = reserved - spent - still_needed;
        if unused > Decimal::ZERO {
            ledger.release_funds(&order.user_id, unused)?;
        }
    }

    Ok(MatchOutcome {
        order,
        activities,
        rested,
        participants,
    })
}
