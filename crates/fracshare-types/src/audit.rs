//! Append-only audit rows.
//!
//! [`OrderEvent`]s describe listing, hold and reservation transitions;
//! [`LedgerTransaction`]s describe every balance movement. Both are sealed
//! into a hash chain by the ledger's audit log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    HoldId, IdempotencyToken, OrderId, PropertyId, ReservationId, TradeResult, TransactionId,
    UserId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderEventKind {
    OrderCreated,
    OrderCancelled,
    OrderExpired,
    InstantMatched,
    HoldPlaced,
    HoldBuyerConfirmed,
    ReservationCreated,
    HoldCancelled,
    HoldExpired,
    ReservationSettled,
    ReservationCancelled,
    ReservationExpired,
}

impl std::fmt::Display for OrderEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::OrderCreated => "ORDER_CREATED",
            Self::OrderCancelled => "ORDER_CANCELLED",
            Self::OrderExpired => "ORDER_EXPIRED",
            Self::InstantMatched => "INSTANT_MATCHED",
            Self::HoldPlaced => "HOLD_PLACED",
            Self::HoldBuyerConfirmed => "HOLD_BUYER_CONFIRMED",
            Self::ReservationCreated => "RESERVATION_CREATED",
            Self::HoldCancelled => "HOLD_CANCELLED",
            Self::HoldExpired => "HOLD_EXPIRED",
            Self::ReservationSettled => "RESERVATION_SETTLED",
            Self::ReservationCancelled => "RESERVATION_CANCELLED",
            Self::ReservationExpired => "RESERVATION_EXPIRED",
        };
        f.write_str(s)
    }
}

/// One state change of a listing or of a commitment against it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub kind: OrderEventKind,
    /// `None` for system actions (reconciler).
    pub actor: Option<UserId>,
    pub token: Option<IdempotencyToken>,
    pub shares: u64,
    pub hold_id: Option<HoldId>,
    pub reservation_id: Option<ReservationId>,
    /// Present on events that represent an executed trade.
    pub trade: Option<TradeResult>,
    pub at: DateTime<Utc>,
}

impl OrderEvent {
    #[must_use]
    pub fn new(
        order_id: OrderId,
        kind: OrderEventKind,
        actor: Option<UserId>,
        shares: u64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            kind,
            actor,
            token: None,
            shares,
            hold_id: None,
            reservation_id: None,
            trade: None,
            at,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<IdempotencyToken>) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn with_hold(mut self, hold: HoldId) -> Self {
        self.hold_id = Some(hold);
        self
    }

    #[must_use]
    pub fn with_reservation(mut self, reservation: ReservationId) -> Self {
        self.reservation_id = Some(reservation);
        self
    }

    #[must_use]
    pub fn with_trade(mut self, trade: TradeResult) -> Self {
        self.trade = Some(trade);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Purchase,
    Sale,
    HoldEscrow,
    HoldRelease,
    ReservationPurchase,
    ReservationSale,
    ShareGrant,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Deposit => "DEPOSIT",
            Self::Withdrawal => "WITHDRAWAL",
            Self::Purchase => "PURCHASE",
            Self::Sale => "SALE",
            Self::HoldEscrow => "HOLD_ESCROW",
            Self::HoldRelease => "HOLD_RELEASE",
            Self::ReservationPurchase => "RESERVATION_PURCHASE",
            Self::ReservationSale => "RESERVATION_SALE",
            Self::ShareGrant => "SHARE_GRANT",
        };
        f.write_str(s)
    }
}

/// One balance movement on one user's wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub id: TransactionId,
    pub user: UserId,
    pub kind: TransactionKind,
    /// Signed change to the available balance.
    pub available_delta: Decimal,
    /// Signed change to the pending balance.
    pub pending_delta: Decimal,
    pub shares: u64,
    pub property: Option<PropertyId>,
    pub order_id: Option<OrderId>,
    pub at: DateTime<Utc>,
}

impl LedgerTransaction {
    #[must_use]
    pub fn new(
        user: UserId,
        kind: TransactionKind,
        available_delta: Decimal,
        pending_delta: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            user,
            kind,
            available_delta,
            pending_delta,
            shares: 0,
            property: None,
            order_id: None,
            at,
        }
    }

    #[must_use]
    pub fn for_trade(mut self, order_id: OrderId, property: PropertyId, shares: u64) -> Self {
        self.order_id = Some(order_id);
        self.property = Some(property);
        self.shares = shares;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditEntry {
    Order(OrderEvent),
    Transaction(LedgerTransaction),
}

/// A sealed audit entry. `hash = SHA-256(prev_hash || seq || json(entry))`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditRecord {
    pub seq: u64,
    pub prev_hash: [u8; 32],
    pub hash: [u8; 32],
    pub entry: AuditEntry,
}
