//! Share ownership per (user, property).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{constants, FracshareError, PropertyId, Result, UserId};

/// Shares a user owns in one property, with weighted-average cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Holding {
    pub user: UserId,
    pub property: PropertyId,
    pub shares_owned: u64,
    /// Weighted-average acquisition price.
    pub price_per_share: Decimal,
    /// Cost basis of `shares_owned`.
    pub total_investment: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Holding {
    /// First acquisition of a property by a user.
    #[must_use]
    pub fn open(
        user: UserId,
        property: PropertyId,
        shares: u64,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        let mut holding = Self {
            user,
            property,
            shares_owned: 0,
            price_per_share: Decimal::ZERO,
            total_investment: Decimal::ZERO,
            updated_at: now,
        };
        holding.acquire(shares, amount, now);
        holding
    }

    /// Add shares bought for `amount`, re-averaging the price.
    pub fn acquire(&mut self, shares: u64, amount: Decimal, now: DateTime<Utc>) {
        self.shares_owned += shares;
        self.total_investment += amount;
        self.price_per_share = if self.shares_owned == 0 {
            Decimal::ZERO
        } else {
            (self.total_investment / Decimal::from(self.shares_owned))
                .round_dp(constants::AVERAGE_PRICE_PRECISION)
        };
        self.updated_at = now;
    }

    /// Remove shares and return the cost basis that left with them.
    ///
    /// The average price is unchanged by a disposal. When the last share
    /// leaves, the whole remaining investment is returned so no rounding
    /// residue is left behind.
    ///
    /// # Errors
    /// `DataIntegrity` if the holding has fewer shares than requested; the
    /// share park makes that unreachable for listed shares.
    pub fn dispose(&mut self, shares: u64, now: DateTime<Utc>) -> Result<Decimal> {
        if self.shares_owned < shares {
            return Err(FracshareError::DataIntegrity {
                reason: format!(
                    "holding of {} in {} has {} shares, trade needs {}",
                    self.user, self.property, self.shares_owned, shares
                ),
            });
        }
        let cost_basis = if shares == self.shares_owned {
            self.total_investment
        } else {
            (self.total_investment * Decimal::from(shares) / Decimal::from(self.shares_owned))
                .round_dp(constants::AVERAGE_PRICE_PRECISION)
        };
        self.shares_owned -= shares;
        self.total_investment -= cost_basis;
        if self.shares_owned == 0 {
            self.price_per_share = Decimal::ZERO;
        }
        self.updated_at = now;
        Ok(cost_basis)
    }

    /// A holding with zero shares is deleted by the store.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shares_owned == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(shares: u64, amount: i64) -> Holding {
        Holding::open(
            UserId::new(),
            PropertyId::new(),
            shares,
            Decimal::new(amount, 0),
            Utc::now(),
        )
    }

    #[test]
    fn weighted_average_on_second_purchase() {
        let mut h = holding(10, 500); // 10 @ 50
        h.acquire(10, Decimal::new(700, 0), Utc::now()); // 10 @ 70
        assert_eq!(h.shares_owned, 20);
        assert_eq!(h.total_investment, Decimal::new(1200, 0));
        assert_eq!(h.price_per_share, Decimal::new(60, 0));
    }

    #[test]
    fn partial_disposal_keeps_average() {
        let mut h = holding(20, 1200);
        let basis = h.dispose(5, Utc::now()).unwrap();
        assert_eq!(basis, Decimal::new(300, 0));
        assert_eq!(h.shares_owned, 15);
        assert_eq!(h.price_per_share, Decimal::new(60, 0));
        assert_eq!(h.total_investment, Decimal::new(900, 0));
    }

    #[test]
    fn full_disposal_empties_holding() {
        let mut h = holding(3, 100);
        let basis = h.dispose(3, Utc::now()).unwrap();
        assert_eq!(basis, Decimal::new(100, 0));
        assert!(h.is_empty());
        assert_eq!(h.total_investment, Decimal::ZERO);
    }

    #[test]
    fn overdraw_is_integrity_violation() {
        let mut h = holding(3, 90);
        let err = h.dispose(5, Utc::now()).unwrap_err();
        assert!(matches!(err, FracshareError::DataIntegrity { .. }));
        assert_eq!(h.shares_owned, 3);
    }
}
