//! Account, wallet and position types

use crate::ids::{Symbol, UserId};
use crate::order::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// KYC / payment verification status reported by the upstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

impl Default for VerificationStatus {
    fn default() -> Self {
        VerificationStatus::Pending
    }
}

/// Wallet balance.
///
/// `amount` is spendable; `locked` is reserved against open buy orders
/// and never goes negative. The `amount + locked` sum only changes via
/// deposits, withdrawals, bonuses and trade settlement credits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub amount: Decimal,
    pub locked: Decimal,
}

impl Wallet {
    pub fn with_amount(amount: Decimal) -> Self {
        Self {
            amount,
            locked: Decimal::ZERO,
        }
    }

    pub fn total(&self) -> Decimal {
        self.amount + self.locked
    }

    /// Move funds from `amount` into `locked`.
    ///
    /// # Panics
    /// Panics if `notional` exceeds available funds; callers check first
    /// under the ledger lock.
    pub fn reserve(&mut self, notional: Decimal) {
        assert!(notional >= Decimal::ZERO, "Reserve must be non-negative");
        assert!(notional <= self.amount, "Insufficient available funds");

        self.amount -= notional;
        self.locked += notional;
    }

    /// Debit `notional` for a fill, consuming the reservation first.
    ///
    /// Anything beyond the remaining reservation falls through to
    /// `amount` (market orders filling above the reserved price, admin
    /// liquidity flows), so `locked` never goes negative and the
    /// ledger-wide funds sum stays exact.
    pub fn debit(&mut self, notional: Decimal) {
        assert!(notional >= Decimal::ZERO, "Debit must be non-negative");

        let from_locked = notional.min(self.locked);
        self.locked -= from_locked;
        self.amount -= notional - from_locked;
    }

    /// Add spendable funds.
    pub fn credit(&mut self, notional: Decimal) {
        assert!(notional >= Decimal::ZERO, "Credit must be non-negative");
        self.amount += notional;
    }
}

/// Per-symbol holdings of outcome shares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub yes: u64,
    pub no: u64,
}

impl Position {
    pub fn get(&self, side: Side) -> u64 {
        match side {
            Side::Yes => self.yes,
            Side::No => self.no,
        }
    }

    pub fn credit(&mut self, side: Side, quantity: u64) {
        match side {
            Side::Yes => self.yes += quantity,
            Side::No => self.no += quantity,
        }
    }

    /// # Panics
    /// Panics on insufficient shares; callers check first under the
    /// ledger lock.
    pub fn debit(&mut self, side: Side, quantity: u64) {
        match side {
            Side::Yes => {
                assert!(quantity <= self.yes, "Insufficient YES shares");
                self.yes -= quantity;
            }
            Side::No => {
                assert!(quantity <= self.no, "Insufficient NO shares");
                self.no -= quantity;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.yes == 0 && self.no == 0
    }
}

/// A user account as the engine sees it.
///
/// Created once by the account-creation event and mutated only through
/// ledger operations; never deleted during normal operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub phone: String,
    pub kyc_status: VerificationStatus,
    pub payment_status: VerificationStatus,
    pub wallet: Wallet,
    pub positions: HashMap<Symbol, Position>,
}

impl Account {
    pub fn new(user_id: UserId, phone: impl Into<String>) -> Self {
        Self {
            user_id,
            phone: phone.into(),
            kyc_status: VerificationStatus::Pending,
            payment_status: VerificationStatus::Pending,
            wallet: Wallet::default(),
            positions: HashMap::new(),
        }
    }

    /// Position for a symbol, zero if the user never traded it.
    pub fn position(&self, symbol: &Symbol) -> Position {
        self.positions.get(symbol).copied().unwrap_or_default()
    }

    pub fn position_mut(&mut self, symbol: &Symbol) -> &mut Position {
        self.positions.entry(symbol.clone()).or_default()
    }

    /// Withdrawals require both KYC and payment verification.
    pub fn is_verified(&self) -> bool {
        self.kyc_status == VerificationStatus::Verified
            && self.payment_status == VerificationStatus::Verified
    }
}
