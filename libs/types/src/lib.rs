//! Types library for the prediction-market exchange
//!
//! This library provides all core type definitions used across the engine,
//! ensuring type safety and deterministic behavior.
//!
//! # Modules
//! - `ids`: Unique identifiers (OrderId, UserId, MarketId, Symbol)
//! - `numeric`: Fixed-point decimal price type
//! - `order`: Order lifecycle types
//! - `account`: Account, wallet and position types
//! - `market`: Market, activity, timeline and quote types
//! - `errors`: Error taxonomy

// Public modules
pub mod account;
pub mod errors;
pub mod ids;
pub mod market;
pub mod numeric;
pub mod order;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::account::*;
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::market::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
}
