//! Matching core of the binary prediction-market exchange
//!
//! For each market (symbol) the engine maintains two order books, one
//! per outcome side, matches incoming buy/sell orders against resting
//! liquidity under price priority, settles wallet and position balances
//! through a single in-memory ledger, and derives a probability-based
//! quote with its timeline.
//!
//! **Key invariants:**
//! - One worker task exclusively owns each market's books; all order
//!   flow for a symbol is serialized through that market's inbox
//! - The ledger-wide sum of `amount + locked` is conserved by matching
//! - Books stay sorted by non-increasing price, FIFO within a level
//! - No self-trades; MARKET-order remainders never rest

pub mod book;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod market;
pub mod matching;
pub mod pricing;

pub use config::EngineConfig;
pub use engine::Engine;
