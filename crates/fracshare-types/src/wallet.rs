//! Cash wallet row with available/pending accounting.
//!
//! Every user has an `available` balance (spendable) and a `pending`
//! balance (earmarked for a hold or reservation that has not settled).
//! Every mutation either applies fully or leaves the row unchanged.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{FracshareError, Result, UserId};

/// A user's cash account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wallet {
    pub owner: UserId,
    /// Spendable funds.
    pub available_balance: Decimal,
    /// Funds earmarked for unsettled holds and reservations.
    pub pending_balance: Decimal,
    /// Cost basis of the owner's current holdings.
    pub total_invested: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create an empty wallet.
    #[must_use]
    pub fn new(owner: UserId, now: DateTime<Utc>) -> Self {
        Self {
            owner,
            available_balance: Decimal::ZERO,
            pending_balance: Decimal::ZERO,
            total_invested: Decimal::ZERO,
            updated_at: now,
        }
    }

    /// Available + pending.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.available_balance + self.pending_balance
    }

    /// Remove `amount` from the available balance.
    ///
    /// # Errors
    /// `InvalidAmount` for non-positive amounts, `InsufficientFunds` if
    /// available < amount.
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        ensure_positive(amount)?;
        if self.available_balance < amount {
            return Err(FracshareError::InsufficientFunds {
                required: amount,
                available: self.available_balance,
            });
        }
        self.available_balance -= amount;
        Ok(())
    }

    /// Add `amount` to the available balance.
    ///
    /// # Errors
    /// `InvalidAmount` for non-positive amounts, or if the wallet's total
    /// would no longer fit a `Decimal`.
    pub fn credit(&mut self, amount: Decimal) -> Result<()> {
        ensure_positive(amount)?;
        let available = self
            .available_balance
            .checked_add(amount)
            .filter(|a| a.checked_add(self.pending_balance).is_some())
            .ok_or(FracshareError::InvalidAmount { amount })?;
        self.available_balance = available;
        Ok(())
    }

    /// Move funds available → pending (hold placement).
    ///
    /// # Errors
    /// `InsufficientFunds` if available < amount.
    pub fn move_to_pending(&mut self, amount: Decimal) -> Result<()> {
        let pending = checked_sum(self.pending_balance, amount)?;
        self.debit(amount)?;
        self.pending_balance = pending;
        Ok(())
    }

    /// Move funds pending → available (hold/reservation reversal).
    ///
    /// # Errors
    /// `PendingUnderflow` if pending < amount. That is a bookkeeping bug,
    /// never a user error.
    pub fn release_pending(&mut self, amount: Decimal) -> Result<()> {
        let available = checked_sum(self.available_balance, amount)?;
        self.take_pending(amount)?;
        self.available_balance = available;
        Ok(())
    }

    /// Drop funds from pending without returning them to available
    /// (reservation settlement; the counterparty is credited separately).
    pub fn consume_pending(&mut self, amount: Decimal) -> Result<()> {
        self.take_pending(amount)
    }

    fn take_pending(&mut self, amount: Decimal) -> Result<()> {
        ensure_positive(amount)?;
        if self.pending_balance < amount {
            return Err(FracshareError::PendingUnderflow {
                user: self.owner,
                requested: amount,
                pending: self.pending_balance,
            });
        }
        self.pending_balance -= amount;
        Ok(())
    }
}

fn checked_sum(balance: Decimal, amount: Decimal) -> Result<Decimal> {
    balance
        .checked_add(amount)
        .ok_or(FracshareError::InvalidAmount { amount })
}

fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(FracshareError::InvalidAmount { amount });
    }
    Ok(())
}
