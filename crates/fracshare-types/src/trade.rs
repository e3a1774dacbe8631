//! Executed trade record.
//!
//! A [`TradeResult`] is returned to the caller and stored verbatim in the
//! audit log so a retried request can be answered with the original outcome.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderId, OrderStatus, PropertyId, TradeId, UserId};

/// Which settlement protocol produced a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeProtocol {
    InstantMatch,
    Reservation,
}

impl std::fmt::Display for TradeProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InstantMatch => write!(f, "INSTANT_MATCH"),
            Self::Reservation => write!(f, "RESERVATION"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TradeResult {
    pub trade_id: TradeId,
    pub protocol: TradeProtocol,
    pub order_id: OrderId,
    pub buyer: UserId,
    pub seller: UserId,
    pub property: PropertyId,
    pub shares: u64,
    pub price_per_share: Decimal,
    /// shares × price_per_share.
    pub amount: Decimal,
    /// Listing state right after the trade.
    pub order_remaining: u64,
    pub order_status: OrderStatus,
    pub executed_at: DateTime<Utc>,
}

impl std::fmt::Display for TradeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade[{}] {} {} shares of {} @ {} = {}",
            self.trade_id, self.protocol, self.shares, self.property, self.price_per_share, self.amount,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_protocol_and_amount() {
        let t = TradeResult {
            trade_id: TradeId::new(),
            protocol: TradeProtocol::InstantMatch,
            order_id: OrderId::new(),
            buyer: UserId::new(),
            seller: UserId::new(),
            property: PropertyId::new(),
            shares: 20,
            price_per_share: Decimal::new(50, 0),
            amount: Decimal::new(1000, 0),
            order_remaining: 80,
            order_status: OrderStatus::Active,
            executed_at: Utc::now(),
        };
        let s = t.to_string();
        assert!(s.contains("INSTANT_MATCH"));
        assert!(s.contains("1000"));
    }
}
