//! Instant match: a buyer takes shares off a listing in one transaction.
//!
//! ```text
//! lock order → checks → lock park, wallets, holdings → debit/credit,
//! fill, move shares, release park slice → audit batch → commit → alerts
//! ```
//!
//! Replays of a committed `(order, token)` return the original
//! [`TradeResult`] without touching any row.

use fracshare_types::{
    order::validate_shares, Actor, AlertType, AuditEntry, FracshareError, IdempotencyToken,
    OrderEvent, OrderEventKind, OrderId, Result, TradeId, TradeProtocol, TradeResult,
    TransactionKind,
};

use crate::engine::{ensure_same_request, SettlementEngine};
use crate::idempotency::Outcome;
use crate::transfer::TradeRows;

impl SettlementEngine {
    /// Buy `shares` from `order_id` at the listing price.
    ///
    /// # Errors
    /// `OrderNotFound`, `OrderNotActive`, `OrderExpired`, `SelfTrade`,
    /// `TradingDisabled`, `InsufficientRemainingShares`, `InsufficientFunds`;
    /// `LockTimeout` once retries are exhausted.
    pub async fn instant_match(
        &self,
        actor: &Actor,
        order_id: OrderId,
        shares: u64,
        token: IdempotencyToken,
    ) -> Result<TradeResult> {
        self.retry
            .run("instant_match", move || {
                self.try_instant_match(actor, order_id, shares, token.clone())
            })
            .await
    }

    /// The trade an earlier request with this token executed, provided it
    /// was the same buyer asking for the same number of shares.
    async fn replayed_trade(
        &self,
        actor: &Actor,
        order_id: OrderId,
        shares: u64,
        token: &IdempotencyToken,
    ) -> Result<Option<TradeResult>> {
        match self.prior_outcome(order_id, token).await {
            None => Ok(None),
            Some(Outcome::Trade(trade)) => {
                ensure_same_request(actor, token, trade.buyer, shares, trade.shares)?;
                tracing::debug!(order = %order_id, token = %token, trade = %trade.trade_id, "Replaying trade");
                Ok(Some(trade))
            }
            Some(Outcome::Hold(hold)) => Err(FracshareError::InvalidToken {
                reason: format!("token already placed hold {hold}"),
            }),
        }
    }

    async fn try_instant_match(
        &self,
        actor: &Actor,
        order_id: OrderId,
        shares: u64,
        token: IdempotencyToken,
    ) -> Result<TradeResult> {
        self.ensure_protocol(TradeProtocol::InstantMatch)?;
        validate_shares(shares)?;
        if let Some(prior) = self.replayed_trade(actor, order_id, shares, &token).await? {
            return Ok(prior);
        }

        let now = self.clock.now();
        let mut order = self.store.lock_order(order_id).await?;
        if let Some(prior) = self.replayed_trade(actor, order_id, shares, &token).await? {
            return Ok(prior);
        }
        order.ensure_active()?;
        if order.is_past_deadline(now) {
            self.book.close_expired(order, now).await?;
            return Err(FracshareError::OrderExpired(order_id));
        }
        let buyer = actor.user_id;
        if buyer == order.seller {
            return Err(FracshareError::SelfTrade);
        }
        let listing = self.catalog.ensure_tradable(order.property)?;
        order.ensure_remaining(shares)?;

        let amount = order.amount_for(shares)?;
        let (seller, property) = (order.seller, order.property);
        let mut rows = TradeRows::lock(&self.store, buyer, seller, property).await?;

        rows.buyer_wallet.debit(amount)?;
        rows.seller_wallet.credit(amount)?;
        order.fill(shares, now)?;
        rows.transfer_shares(property, shares, amount, now)?;
        rows.park.release(order_id, shares, now)?;

        let trade = TradeResult {
            trade_id: TradeId::new(),
            protocol: TradeProtocol::InstantMatch,
            order_id,
            buyer,
            seller,
            property,
            shares,
            price_per_share: order.price_per_share,
            amount,
            order_remaining: order.remaining_shares,
            order_status: order.status,
            executed_at: now,
        };

        let mut entries = vec![AuditEntry::Order(
            OrderEvent::new(order_id, OrderEventKind::InstantMatched, Some(buyer), shares, now)
                .with_token(Some(token.clone()))
                .with_trade(trade.clone()),
        )];
        entries.extend(rows.transactions(
            TransactionKind::Purchase,
            TransactionKind::Sale,
            order_id,
            property,
            shares,
            now,
        ));
        self.store.audit.append(entries).await?;
        rows.commit();
        order.commit();
        self.remember(order_id, token, Outcome::Trade(trade.clone())).await;

        tracing::info!(
            trade = %trade.trade_id,
            order = %order_id,
            buyer = %buyer,
            seller = %seller,
            shares,
            amount = %amount,
            remaining = trade.order_remaining,
            "Instant match executed"
        );
        self.alert(
            buyer,
            AlertType::PurchaseCompleted,
            "Purchase completed",
            format!("You bought {shares} shares of {} for {amount}", listing.title),
            property,
        );
        self.alert(
            seller,
            AlertType::SaleCompleted,
            "Sale completed",
            format!("You sold {shares} shares of {} for {amount}", listing.title),
            property,
        );
        Ok(trade)
    }
}
