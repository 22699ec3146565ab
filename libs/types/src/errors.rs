//! Error taxonomy for the engine
//!
//! Three families: ledger failures (balance/position business rules),
//! market failures (routing and lifecycle), and request failures
//! (transport payload problems). Only undecodable payloads are
//! considered retryable, as a transient schema mismatch between services;
//! every business-rule violation is final.

use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level engine error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    /// Whether the caller may retry the request unchanged.
    pub fn retryable(&self) -> bool {
        matches!(self, EngineError::Request(RequestError::InvalidPayload(_)))
    }
}

/// Balance and position failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Account not found: {user_id}")]
    AccountNotFound { user_id: String },

    #[error("Account already exists: {user_id}")]
    AccountExists { user_id: String },

    #[error("Insufficient wallet balance: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("Not enough shares to sell: required {required}, available {available}")]
    InsufficientShares { required: u64, available: u64 },

    #[error("KYC and payment method are not verified")]
    NotVerified,

    #[error("Amount must be greater than 0")]
    InvalidAmount,
}

/// Market routing and lifecycle failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("Market not found: {symbol}")]
    NotFound { symbol: String },

    #[error("Market already exists: {symbol}")]
    AlreadyExists { symbol: String },

    #[error("Market is closed: {symbol}")]
    Closed { symbol: String },

    #[error("Market {symbol} did not reply in time")]
    ReplyTimeout { symbol: String },

    #[error("Market {symbol} is no longer accepting messages")]
    Unavailable { symbol: String },
}

/// Transport payload failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("Failed to validate payload data: {0}")]
    InvalidPayload(String),

    #[error("Unhandled event type: {0}")]
    UnknownEventType(String),

    #[error("Invalid date format: {0}")]
    InvalidDate(String),
}
