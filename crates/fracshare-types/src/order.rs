//! Sell listing types.
//!
//! An [`Order`] is a fixed-price, first-come-first-served listing of a
//! seller's shares in one property. Its shares move between three buckets:
//!
//! ```text
//!   remaining ──hold──▶ held ──seller confirm──▶ reserved ──settle──▶ filled
//!       │  ▲              │                          │
//!       │  └──expire/cancel┘◀─────reject/expire──────┘
//!       └──instant match──────────────────────────────────────────▶ filled
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{constants, FracshareError, OrderId, PropertyId, Result, UserId};

/// Lifecycle status of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Active,
    Completed,
    Cancelled,
    Expired,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Where shares handed back by a hold or reservation ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareReturn {
    /// Back on the live listing.
    Relisted,
    /// The listing is closed; the caller must release the park slice.
    ReleaseToPark,
}

/// A seller's listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub seller: UserId,
    pub property: PropertyId,
    /// Original listing size.
    pub shares_to_sell: u64,
    /// Shares still purchasable.
    pub remaining_shares: u64,
    /// Shares committed to unconfirmed holds.
    pub held_shares: u64,
    /// Shares committed to reservations awaiting settlement.
    pub reserved_shares: u64,
    pub price_per_share: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn new(
        seller: UserId,
        property: PropertyId,
        shares: u64,
        price_per_share: Decimal,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            seller,
            property,
            shares_to_sell: shares,
            remaining_shares: shares,
            held_shares: 0,
            reserved_shares: 0,
            price_per_share,
            status: OrderStatus::Active,
            created_at: now,
            updated_at: now,
            expires_at,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }

    #[must_use]
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Shares that have changed hands.
    #[must_use]
    pub fn filled_shares(&self) -> u64 {
        self.shares_to_sell
            .saturating_sub(self.remaining_shares + self.held_shares + self.reserved_shares)
    }

    /// Cash value of `shares` at the listing price.
    ///
    /// # Errors
    /// `InvalidPrice` if the product does not fit a `Decimal`.
    pub fn amount_for(&self, shares: u64) -> Result<Decimal> {
        listing_amount(shares, self.price_per_share)
    }

    /// Fail unless the order is active.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(FracshareError::OrderNotActive {
                order: self.id,
                status: self.status,
            })
        }
    }

    /// Fail unless `shares` are still purchasable.
    pub fn ensure_remaining(&self, shares: u64) -> Result<()> {
        if self.remaining_shares < shares {
            return Err(FracshareError::InsufficientRemainingShares {
                requested: shares,
                remaining: self.remaining_shares,
            });
        }
        Ok(())
    }

    /// Instant match fill.
    pub fn fill(&mut self, shares: u64, now: DateTime<Utc>) -> Result<()> {
        self.ensure_remaining(shares)?;
        self.remaining_shares -= shares;
        self.touch(now);
        Ok(())
    }

    /// Move shares remaining → held.
    pub fn hold(&mut self, shares: u64, now: DateTime<Utc>) -> Result<()> {
        self.ensure_remaining(shares)?;
        self.remaining_shares -= shares;
        self.held_shares += shares;
        self.touch(now);
        Ok(())
    }

    /// Move shares held → reserved once both parties confirmed.
    pub fn promote_hold(&mut self, shares: u64, now: DateTime<Utc>) -> Result<()> {
        self.held_shares = checked_bucket(self.id, "held", self.held_shares, shares)?;
        self.reserved_shares += shares;
        self.touch(now);
        Ok(())
    }

    /// Reserved shares changed hands.
    pub fn settle_reserved(&mut self, shares: u64, now: DateTime<Utc>) -> Result<()> {
        self.reserved_shares = checked_bucket(self.id, "reserved", self.reserved_shares, shares)?;
        self.touch(now);
        Ok(())
    }

    /// Hand back shares from an expired or withdrawn hold.
    pub fn return_held(&mut self, shares: u64, now: DateTime<Utc>) -> Result<ShareReturn> {
        self.held_shares = checked_bucket(self.id, "held", self.held_shares, shares)?;
        Ok(self.relist(shares, now))
    }

    /// Hand back shares from a rejected or expired reservation.
    pub fn return_reserved(&mut self, shares: u64, now: DateTime<Utc>) -> Result<ShareReturn> {
        self.reserved_shares = checked_bucket(self.id, "reserved", self.reserved_shares, shares)?;
        Ok(self.relist(shares, now))
    }

    /// Close the listing as cancelled. Returns the unsold shares the park
    /// must release.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<u64> {
        self.close(OrderStatus::Cancelled, now)
    }

    /// Close the listing as expired. Returns the unsold shares the park
    /// must release.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<u64> {
        self.close(OrderStatus::Expired, now)
    }

    fn close(&mut self, status: OrderStatus, now: DateTime<Utc>) -> Result<u64> {
        self.ensure_active()?;
        let released = self.remaining_shares;
        self.remaining_shares = 0;
        self.status = status;
        self.updated_at = now;
        Ok(released)
    }

    fn relist(&mut self, shares: u64, now: DateTime<Utc>) -> ShareReturn {
        self.updated_at = now;
        if self.is_active() {
            self.remaining_shares += shares;
            ShareReturn::Relisted
        } else {
            ShareReturn::ReleaseToPark
        }
    }

    /// Records the change and completes the listing once nothing is
    /// remaining or committed.
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        if self.is_active()
            && self.remaining_shares == 0
            && self.held_shares == 0
            && self.reserved_shares == 0
        {
            self.status = OrderStatus::Completed;
        }
    }
}

fn checked_bucket(order: OrderId, bucket: &str, current: u64, shares: u64) -> Result<u64> {
    current
        .checked_sub(shares)
        .ok_or_else(|| FracshareError::DataIntegrity {
            reason: format!("order {order} has {current} {bucket} shares, cannot return {shares}"),
        })
}

/// Validate listing inputs before any lock is taken.
///
/// # Errors
/// `InvalidShares` for zero or oversized listings, `InvalidPrice` for
/// non-positive prices or prices finer than a cent.
pub fn validate_listing(shares: u64, price_per_share: Decimal) -> Result<()> {
    validate_shares(shares)?;
    if price_per_share <= Decimal::ZERO {
        return Err(FracshareError::InvalidPrice {
            price: price_per_share,
            reason: "must be positive".to_string(),
        });
    }
    if price_per_share > Decimal::from(constants::MAX_PRICE_PER_SHARE) {
        return Err(FracshareError::InvalidPrice {
            price: price_per_share,
            reason: format!("at most {} per share", constants::MAX_PRICE_PER_SHARE),
        });
    }
    if price_per_share.normalize().scale() > constants::PRICE_PRECISION {
        return Err(FracshareError::InvalidPrice {
            price: price_per_share,
            reason: format!("at most {} decimal places", constants::PRICE_PRECISION),
        });
    }
    Ok(())
}

/// `shares × price_per_share`, refusing to overflow.
///
/// # Errors
/// `InvalidPrice` if the product does not fit a `Decimal`.
pub fn listing_amount(shares: u64, price_per_share: Decimal) -> Result<Decimal> {
    Decimal::from(shares)
        .checked_mul(price_per_share)
        .ok_or_else(|| FracshareError::InvalidPrice {
            price: price_per_share,
            reason: format!("{shares} shares at this price overflow"),
        })
}

/// Share counts must be positive and bounded.
pub fn validate_shares(shares: u64) -> Result<()> {
    if shares == 0 {
        return Err(FracshareError::InvalidShares {
            reason: "must be positive".to_string(),
        });
    }
    if shares > constants::MAX_SHARES_PER_ORDER {
        return Err(FracshareError::InvalidShares {
            reason: format!("at most {} per order", constants::MAX_SHARES_PER_ORDER),
        });
    }
    Ok(())
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy(seller: UserId, shares: u64, price: Decimal) -> Self {
        let now = Utc::now();
        Self::new(
            seller,
            PropertyId::new(),
            shares,
            price,
            now,
            now + chrono::Duration::days(30),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(shares: u64) -> Order {
        Order::dummy(UserId::new(), shares, Decimal::new(50, 0))
    }

    #[test]
    fn fill_to_zero_completes() {
        let mut o = order(100);
        o.fill(20, Utc::now()).unwrap();
        assert_eq!(o.remaining_shares, 80);
        assert_eq!(o.status, OrderStatus::Active);
        o.fill(80, Utc::now()).unwrap();
        assert_eq!(o.status, OrderStatus::Completed);
        assert_eq!(o.filled_shares(), 100);
    }

    #[test]
    fn overfill_rejected_without_change() {
        let mut o = order(10);
        let err = o.fill(11, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            FracshareError::InsufficientRemainingShares { requested: 11, remaining: 10 }
        ));
        assert_eq!(o.remaining_shares, 10);
    }

    #[test]
    fn held_shares_keep_order_open() {
        let mut o = order(10);
        o.hold(10, Utc::now()).unwrap();
        assert_eq!(o.remaining_shares, 0);
        assert_eq!(o.status, OrderStatus::Active);

        o.promote_hold(10, Utc::now()).unwrap();
        assert_eq!(o.reserved_shares, 10);
        o.settle_reserved(10, Utc::now()).unwrap();
        assert_eq!(o.status, OrderStatus::Completed);
    }

    #[test]
    fn returned_hold_relists_on_active_order() {
        let mut o = order(10);
        o.hold(4, Utc::now()).unwrap();
        assert_eq!(o.return_held(4, Utc::now()).unwrap(), ShareReturn::Relisted);
        assert_eq!(o.remaining_shares, 10);
        assert_eq!(o.held_shares, 0);
    }

    #[test]
    fn returned_hold_on_cancelled_order_goes_to_park() {
        let mut o = order(10);
        o.hold(4, Utc::now()).unwrap();
        assert_eq!(o.cancel(Utc::now()).unwrap(), 6);
        assert_eq!(
            o.return_held(4, Utc::now()).unwrap(),
            ShareReturn::ReleaseToPark
        );
        assert_eq!(o.remaining_shares, 0);
    }

    #[test]
    fn double_cancel_is_rejected() {
        let mut o = order(10);
        o.cancel(Utc::now()).unwrap();
        assert!(matches!(
            o.cancel(Utc::now()),
            Err(FracshareError::OrderNotActive { status: OrderStatus::Cancelled, .. })
        ));
    }

    #[test]
    fn returning_more_than_held_is_integrity_error() {
        let mut o = order(10);
        o.hold(2, Utc::now()).unwrap();
        assert!(matches!(
            o.return_held(3, Utc::now()),
            Err(FracshareError::DataIntegrity { .. })
        ));
    }

    #[test]
    fn listing_validation() {
        assert!(validate_listing(10, Decimal::new(5000, 2)).is_ok());
        assert!(matches!(
            validate_listing(0, Decimal::ONE),
            Err(FracshareError::InvalidShares { .. })
        ));
        assert!(matches!(
            validate_listing(1, Decimal::ZERO),
            Err(FracshareError::InvalidPrice { .. })
        ));
        assert!(validate_listing(1, Decimal::new(1001, 3)).is_err());
        // trailing zeros are not extra precision
        assert!(validate_listing(1, Decimal::new(1000, 3)).is_ok());
    }

    #[test]
    fn listing_price_is_capped() {
        let cap = Decimal::from(constants::MAX_PRICE_PER_SHARE);
        assert!(validate_listing(constants::MAX_SHARES_PER_ORDER, cap).is_ok());
        assert!(matches!(
            validate_listing(10, cap + Decimal::ONE),
            Err(FracshareError::InvalidPrice { .. })
        ));
        let huge: Decimal = "70000000000000000000000000000".parse().unwrap();
        assert!(validate_listing(10, huge).is_err());
    }

    #[test]
    fn largest_listing_amount_fits() {
        let amount = listing_amount(
            constants::MAX_SHARES_PER_ORDER,
            Decimal::from(constants::MAX_PRICE_PER_SHARE),
        )
        .unwrap();
        assert_eq!(amount, Decimal::from(10_000_000_000_000_000_u64));
    }

    #[test]
    fn overflowing_amount_is_an_error() {
        let o = Order::dummy(UserId::new(), 10, Decimal::MAX);
        assert!(matches!(o.amount_for(10), Err(FracshareError::InvalidPrice { .. })));
        assert_eq!(o.amount_for(1).unwrap(), Decimal::MAX);
    }
}
