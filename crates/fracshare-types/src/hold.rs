//! Buyer holds and reservations.
//!
//! ## Hold state machine
//!
//! ```text
//!   ┌────────┐ buyer   ┌─────────────────┐ seller  ┌────────────────┐
//!   │ ACTIVE ├────────▶│ BUYER_CONFIRMED ├────────▶│ BOTH_CONFIRMED │ → Reservation
//!   └─┬───┬──┘         └───────┬─────────┘         └────────────────┘
//!     │   │ withdraw           │ TTL
//!     │   ▼                    ▼
//!     │ ┌───────────┐     ┌─────────┐
//!     │ │ CANCELLED │     │ EXPIRED │
//!     │ └───────────┘     └─────────┘
//!     └──────── TTL ──────────▲
//! ```
//!
//! A both-confirmed hold is terminal: its shares and funds are carried by
//! the [`Reservation`] it spawned.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{FracshareError, HoldId, Order, OrderId, PropertyId, ReservationId, Result, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HoldStatus {
    Active,
    BuyerConfirmed,
    BothConfirmed,
    Expired,
    Cancelled,
}

impl HoldStatus {
    /// Holds that still carry shares and pending funds.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::BuyerConfirmed)
    }
}

impl std::fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::BuyerConfirmed => write!(f, "BUYER_CONFIRMED"),
            Self::BothConfirmed => write!(f, "BOTH_CONFIRMED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A buyer's time-boxed commitment to a slice of a listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hold {
    pub id: HoldId,
    pub order_id: OrderId,
    pub buyer: UserId,
    pub seller: UserId,
    pub property: PropertyId,
    pub shares: u64,
    pub price_per_share: Decimal,
    /// Funds moved to the buyer's pending balance.
    pub amount: Decimal,
    pub buyer_confirmed: bool,
    pub seller_confirmed: bool,
    pub status: HoldStatus,
    pub created_at: DateTime<Utc>,
    pub hold_expires_at: DateTime<Utc>,
    pub reservation_id: Option<ReservationId>,
}

impl Hold {
    /// # Errors
    /// `InvalidPrice` if the hold's amount overflows.
    pub fn new(
        order: &Order,
        buyer: UserId,
        shares: u64,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            id: HoldId::new(),
            order_id: order.id,
            buyer,
            seller: order.seller,
            property: order.property,
            shares,
            price_per_share: order.price_per_share,
            amount: order.amount_for(shares)?,
            buyer_confirmed: false,
            seller_confirmed: false,
            status: HoldStatus::Active,
            created_at: now,
            hold_expires_at: expires_at,
            reservation_id: None,
        })
    }

    #[must_use]
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.hold_expires_at
    }

    /// Buyer confirmation: `Active → BuyerConfirmed`.
    pub fn confirm_by_buyer(&mut self) -> Result<()> {
        match self.status {
            HoldStatus::Active => {
                self.buyer_confirmed = true;
                self.status = HoldStatus::BuyerConfirmed;
                Ok(())
            }
            HoldStatus::BuyerConfirmed | HoldStatus::BothConfirmed => {
                Err(FracshareError::HoldAlreadyConfirmed(self.id))
            }
            status => Err(FracshareError::HoldNotActive {
                hold: self.id,
                status,
            }),
        }
    }

    /// Seller confirmation: `BuyerConfirmed → BothConfirmed`.
    pub fn confirm_by_seller(&mut self, reservation: ReservationId) -> Result<()> {
        match self.status {
            HoldStatus::BuyerConfirmed => {
                self.seller_confirmed = true;
                self.status = HoldStatus::BothConfirmed;
                self.reservation_id = Some(reservation);
                Ok(())
            }
            HoldStatus::Active => Err(FracshareError::BuyerNotConfirmed(self.id)),
            status => Err(FracshareError::HoldNotActive {
                hold: self.id,
                status,
            }),
        }
    }

    /// Close an open hold as expired or cancelled.
    pub fn close(&mut self, status: HoldStatus) -> Result<()> {
        debug_assert!(matches!(status, HoldStatus::Expired | HoldStatus::Cancelled));
        if !self.status.is_open() {
            return Err(FracshareError::HoldNotActive {
                hold: self.id,
                status: self.status,
            });
        }
        self.status = status;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    Active,
    Settled,
    Cancelled,
    Expired,
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Settled => write!(f, "SETTLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// A mutually confirmed trade awaiting out-of-band settlement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    pub id: ReservationId,
    pub hold_id: HoldId,
    pub order_id: OrderId,
    pub buyer: UserId,
    pub seller: UserId,
    pub property: PropertyId,
    pub shares: u64,
    pub price_per_share: Decimal,
    pub amount: Decimal,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Reservation {
    #[must_use]
    pub fn from_hold(hold: &Hold, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: ReservationId::new(),
            hold_id: hold.id,
            order_id: hold.order_id,
            buyer: hold.buyer,
            seller: hold.seller,
            property: hold.property,
            shares: hold.shares,
            price_per_share: hold.price_per_share,
            amount: hold.amount,
            status: ReservationStatus::Active,
            created_at: now,
            expires_at,
            resolved_at: None,
        }
    }

    #[must_use]
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Resolve an active reservation.
    pub fn resolve(&mut self, status: ReservationStatus, now: DateTime<Utc>) -> Result<()> {
        if self.status != ReservationStatus::Active {
            return Err(FracshareError::ReservationNotActive {
                reservation: self.id,
                status: self.status,
            });
        }
        self.status = status;
        self.resolved_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hold() -> Hold {
        let order = Order::dummy(UserId::new(), 100, Decimal::new(50, 0));
        let now = Utc::now();
        Hold::new(&order, UserId::new(), 10, now, now + chrono::Duration::minutes(60)).unwrap()
    }

    #[test]
    fn new_hold_prices_from_order() {
        let h = hold();
        assert_eq!(h.amount, Decimal::new(500, 0));
        assert_eq!(h.status, HoldStatus::Active);
        assert!(!h.buyer_confirmed && !h.seller_confirmed);
    }

    #[test]
    fn confirmation_sequence() {
        let mut h = hold();
        assert!(matches!(
            h.confirm_by_seller(ReservationId::new()),
            Err(FracshareError::BuyerNotConfirmed(_))
        ));
        h.confirm_by_buyer().unwrap();
        assert!(matches!(
            h.confirm_by_buyer(),
            Err(FracshareError::HoldAlreadyConfirmed(_))
        ));
        let resv = ReservationId::new();
        h.confirm_by_seller(resv).unwrap();
        assert_eq!(h.status, HoldStatus::BothConfirmed);
        assert_eq!(h.reservation_id, Some(resv));
        assert!(!h.status.is_open());
    }

    #[test]
    fn closed_hold_rejects_confirmation() {
        let mut h = hold();
        h.close(HoldStatus::Expired).unwrap();
        assert!(matches!(
            h.confirm_by_buyer(),
            Err(FracshareError::HoldNotActive { status: HoldStatus::Expired, .. })
        ));
        assert!(h.close(HoldStatus::Cancelled).is_err());
    }

    #[test]
    fn reservation_resolves_once() {
        let h = hold();
        let now = Utc::now();
        let mut r = Reservation::from_hold(&h, now, now + chrono::Duration::hours(48));
        assert_eq!(r.amount, h.amount);
        r.resolve(ReservationStatus::Settled, now).unwrap();
        assert!(matches!(
            r.resolve(ReservationStatus::Cancelled, now),
            Err(FracshareError::ReservationNotActive { status: ReservationStatus::Settled, .. })
        ));
    }
}
