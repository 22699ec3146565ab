//! In-memory account ledger
//!
//! One map of user accounts guarded by a single engine-wide read/write
//! lock. Every read-modify-write holds the write lock for its full
//! duration, including fill settlement that touches both counterparties
//! at once. There is no per-account locking, so a trade never has to
//! order two lock acquisitions.
//!
//! The ledger is the in-memory authority; durable state is replicated
//! asynchronously through the event sink by the market workers.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};
use types::account::{Account, Position, VerificationStatus, Wallet};
use types::errors::LedgerError;
use types::ids::{Symbol, UserId};
use types::numeric::Price;
use types::order::Side;

/// The engine-wide account ledger.
pub struct Ledger {
    accounts: RwLock<HashMap<UserId, Account>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<UserId, Account>> {
        self.accounts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<UserId, Account>> {
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn not_found(user_id: &UserId) -> LedgerError {
        LedgerError::AccountNotFound {
            user_id: user_id.to_string(),
        }
    }

    /// Register a new account. Accounts are never deleted afterwards.
    pub fn create_account(
        &self,
        user_id: UserId,
        phone: impl Into<String>,
    ) -> Result<(), LedgerError> {
        let mut accounts = self.write();

        if accounts.contains_key(&user_id) {
            return Err(LedgerError::AccountExists {
                user_id: user_id.to_string(),
            });
        }

        info!(user_id = %user_id, "Account created in engine");
        accounts.insert(user_id.clone(), Account::new(user_id, phone));
        Ok(())
    }

    /// Overwrite wallet balances, used when the upstream store seeds an
    /// account into the engine.
    pub fn init_balance(
        &self,
        user_id: &UserId,
        amount: Decimal,
        locked: Decimal,
    ) -> Result<(), LedgerError> {
        let mut accounts = self.write();
        let account = accounts.get_mut(user_id).ok_or_else(|| Self::not_found(user_id))?;

        account.wallet = Wallet { amount, locked };

        info!(user_id = %user_id, %amount, %locked, "Balance initialized");
        Ok(())
    }

    /// Credit spendable funds, returning the new balance.
    pub fn deposit(&self, user_id: &UserId, amount: Decimal) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let mut accounts = self.write();
        let account = accounts.get_mut(user_id).ok_or_else(|| Self::not_found(user_id))?;

        account.wallet.credit(amount);

        info!(user_id = %user_id, %amount, balance = %account.wallet.amount, "Deposit processed");
        Ok(account.wallet.amount)
    }

    /// Debit spendable funds, returning the remaining balance.
    ///
    /// Requires the account to have passed both KYC and payment
    /// verification.
    pub fn withdraw(&self, user_id: &UserId, amount: Decimal) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let mut accounts = self.write();
        let account = accounts.get_mut(user_id).ok_or_else(|| Self::not_found(user_id))?;

        if !account.is_verified() {
            return Err(LedgerError::NotVerified);
        }

        if account.wallet.amount < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: account.wallet.amount,
            });
        }

        account.wallet.amount -= amount;

        info!(
            user_id = %user_id,
            %amount,
            remaining = %account.wallet.amount,
            "Withdrawal processed"
        );
        Ok(account.wallet.amount)
    }

    /// Credit a referral bonus, returning the new balance.
    pub fn credit_bonus(&self, user_id: &UserId, amount: Decimal) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let mut accounts = self.write();
        let account = accounts.get_mut(user_id).ok_or_else(|| Self::not_found(user_id))?;

        account.wallet.credit(amount);

        info!(user_id = %user_id, %amount, "Referral bonus credited");
        Ok(account.wallet.amount)
    }

    /// Update KYC / payment verification status.
    pub fn set_verification(
        &self,
        user_id: &UserId,
        kyc: Option<VerificationStatus>,
        payment: Option<VerificationStatus>,
    ) -> Result<(), LedgerError> {
        let mut accounts = self.write();
        let account = accounts.get_mut(user_id).ok_or_else(|| Self::not_found(user_id))?;

        if let Some(status) = kyc {
            account.kyc_status = status;
        }
        if let Some(status) = payment {
            account.payment_status = status;
        }

        info!(
            user_id = %user_id,
            kyc = ?account.kyc_status,
            payment = ?account.payment_status,
            "Verification status updated"
        );
        Ok(())
    }

    pub fn balance_of(&self, user_id: &UserId) -> Result<Wallet, LedgerError> {
        let accounts = self.read();
        let account = accounts.get(user_id).ok_or_else(|| Self::not_found(user_id))?;
        Ok(account.wallet.clone())
    }

    pub fn position_of(&self, user_id: &UserId, symbol: &Symbol) -> Result<Position, LedgerError> {
        let accounts = self.read();
        let account = accounts.get(user_id).ok_or_else(|| Self::not_found(user_id))?;
        Ok(account.position(symbol))
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.read().contains_key(user_id)
    }

    /// Reserve the full notional of a buy order: `amount` → `locked`.
    pub fn reserve_funds(&self, user_id: &UserId, notional: Decimal) -> Result<(), LedgerError> {
        let mut accounts = self.write();
        let account = accounts.get_mut(user_id).ok_or_else(|| Self::not_found(user_id))?;

        if account.wallet.amount < notional {
            return Err(LedgerError::InsufficientFunds {
                required: notional,
                available: account.wallet.amount,
            });
        }

        account.wallet.reserve(notional);
        debug!(user_id = %user_id, %notional, "Funds reserved");
        Ok(())
    }

    /// Return an unused reservation: `locked` → `amount`, capped at what
    /// is actually locked.
    pub fn release_funds(&self, user_id: &UserId, notional: Decimal) -> Result<(), LedgerError> {
        if notional <= Decimal::ZERO {
            return Ok(());
        }

        let mut accounts = self.write();
        let account = accounts.get_mut(user_id).ok_or_else(|| Self::not_found(user_id))?;

        let released = notional.min(account.wallet.locked);
        account.wallet.locked -= released;
        account.wallet.amount += released;

        debug!(user_id = %user_id, %released, "Reservation released");
        Ok(())
    }

    /// Debit shares from a seller's position ahead of matching.
    pub fn debit_position(
        &self,
        user_id: &UserId,
        symbol: &Symbol,
        side: Side,
        quantity: u64,
    ) -> Result<(), LedgerError> {
        let mut accounts = self.write();
        let account = accounts.get_mut(user_id).ok_or_else(|| Self::not_found(user_id))?;

        let available = account.position(symbol).get(side);
        if available < quantity {
            return Err(LedgerError::InsufficientShares {
                required: quantity,
                available,
            });
        }

        account.position_mut(symbol).debit(side, quantity);
        debug!(user_id = %user_id, symbol = %symbol, quantity, "Position debited");
        Ok(())
    }

    /// Credit shares back to a position (admin liquidity, rollbacks).
    pub fn credit_position(
        &self,
        user_id: &UserId,
        symbol: &Symbol,
        side: Side,
        quantity: u64,
    ) -> Result<(), LedgerError> {
        let mut accounts = self.write();
        let account = accounts.get_mut(user_id).ok_or_else(|| Self::not_found(user_id))?;

        account.position_mut(symbol).credit(side, quantity);
        Ok(())
    }

    /// Settle one fill: the buyer receives `quantity` shares and pays
    /// `price × quantity` out of their reservation; the seller's wallet
    /// is credited the same notional. Performed under one write-lock
    /// hold so both counterparties move atomically.
    ///
    /// Returns `(buyer_phone, seller_phone)` for the activity record.
    pub fn settle_fill(
        &self,
        buyer: &UserId,
        seller: &UserId,
        symbol: &Symbol,
        side: Side,
        price: Price,
        quantity: u64,
    ) -> Result<(String, String), LedgerError> {
        let notional = price.notional(quantity);
        let mut accounts = self.write();

        if !accounts.contains_key(seller) {
            return Err(Self::not_found(seller));
        }

        let buyer_account = accounts.get_mut(buyer).ok_or_else(|| Self::not_found(buyer))?;
        buyer_account.position_mut(symbol).credit(side, quantity);
        buyer_account.wallet.debit(notional);
        let buyer_phone = buyer_account.phone.clone();

        let seller_account = accounts
            .get_mut(seller)
            .ok_or_else(|| Self::not_found(seller))?;
        seller_account.wallet.credit(notional);
        let seller_phone = seller_account.phone.clone();

        debug!(
            buyer = %buyer,
            seller = %seller,
            symbol = %symbol,
            %price,
            quantity,
            "Fill settled"
        );
        Ok((buyer_phone, seller_phone))
    }

    /// Sum of `amount + locked` over every account.
    ///
    /// Matching conserves this quantity; only deposits, withdrawals and
    /// bonuses move it.
    pub fn total_funds(&self) -> Decimal {
        self.read().values().map(|a| a.wallet.total()).sum()
    }
}
