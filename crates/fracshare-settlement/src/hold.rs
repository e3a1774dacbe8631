//! Hold protocol: escrow first, confirm twice, settle later.
//!
//! A hold moves the buyer's cash to pending and the shares to the order's
//! held bucket. Once the buyer and then the seller confirm, the hold spawns
//! a [`Reservation`] and becomes terminal. A hold that misses its deadline,
//! or that the buyer withdraws while still unconfirmed, is reversed.

use chrono::{DateTime, Utc};
use fracshare_ledger::wallet_ledger::transaction;
use fracshare_ledger::RowGuard;
use fracshare_types::{
    order::validate_shares, Actor, AlertType, AuditEntry, FracshareError, Hold, HoldId,
    HoldStatus, IdempotencyToken, Order, OrderEvent, OrderEventKind, OrderId, Reservation, Result,
    ShareReturn, TradeProtocol, TransactionKind, UserId,
};

use crate::engine::{ensure_same_request, SettlementEngine};
use crate::idempotency::Outcome;

impl SettlementEngine {
    /// Reserve `shares` of `order_id` for the actor, escrowing the price.
    ///
    /// # Errors
    /// As [`SettlementEngine::instant_match`].
    pub async fn create_hold(
        &self,
        actor: &Actor,
        order_id: OrderId,
        shares: u64,
        token: IdempotencyToken,
    ) -> Result<Hold> {
        self.retry
            .run("create_hold", move || {
                self.try_create_hold(actor, order_id, shares, token.clone())
            })
            .await
    }

    pub async fn buyer_confirm_hold(&self, actor: &Actor, hold_id: HoldId) -> Result<()> {
        self.retry
            .run("buyer_confirm_hold", move || self.try_buyer_confirm(actor, hold_id))
            .await
    }

    /// Second confirmation. Spawns the reservation the admin will settle.
    pub async fn seller_confirm_hold(&self, actor: &Actor, hold_id: HoldId) -> Result<Reservation> {
        self.retry
            .run("seller_confirm_hold", move || self.try_seller_confirm(actor, hold_id))
            .await
    }

    /// Buyer withdrawal of a hold nobody has confirmed yet.
    pub async fn cancel_hold(&self, actor: &Actor, hold_id: HoldId) -> Result<()> {
        self.retry
            .run("cancel_hold", move || self.try_cancel_hold(actor, hold_id))
            .await
    }

    /// Reconciler entry point. `Ok(false)` if the hold was no longer open or
    /// not yet overdue when its lock was taken.
    pub async fn expire_hold(&self, hold_id: HoldId, now: DateTime<Utc>) -> Result<bool> {
        let hold = self.store.lock_hold(hold_id).await?;
        if !hold.status.is_open() || !hold.is_past_deadline(now) {
            return Ok(false);
        }
        let order = self.store.lock_order(hold.order_id).await?;
        self.unwind_hold(hold, order, HoldStatus::Expired, None, now)
            .await?;
        Ok(true)
    }

    async fn replayed_hold(
        &self,
        actor: &Actor,
        order_id: OrderId,
        shares: u64,
        token: &IdempotencyToken,
    ) -> Result<Option<Hold>> {
        match self.prior_outcome(order_id, token).await {
            None => Ok(None),
            Some(Outcome::Hold(hold_id)) => {
                let hold = match self.hold(hold_id).await {
                    // The placing request logged the token but has not
                    // inserted the row yet; it finishes under the order lock.
                    Err(FracshareError::HoldNotFound(_)) => {
                        drop(self.store.lock_order(order_id).await?);
                        self.hold(hold_id).await?
                    }
                    other => other?,
                };
                ensure_same_request(actor, token, hold.buyer, shares, hold.shares)?;
                tracing::debug!(order = %order_id, token = %token, hold = %hold_id, "Replaying hold");
                Ok(Some(hold))
            }
            Some(Outcome::Trade(trade)) => Err(FracshareError::InvalidToken {
                reason: format!("token already executed trade {}", trade.trade_id),
            }),
        }
    }

    async fn try_create_hold(
        &self,
        actor: &Actor,
        order_id: OrderId,
        shares: u64,
        token: IdempotencyToken,
    ) -> Result<Hold> {
        self.ensure_protocol(TradeProtocol::Reservation)?;
        validate_shares(shares)?;
        if let Some(prior) = self.replayed_hold(actor, order_id, shares, &token).await? {
            return Ok(prior);
        }

        let now = self.clock.now();
        let mut order = self.store.lock_order(order_id).await?;
        if self.prior_outcome(order_id, &token).await.is_some() {
            // Hold rows lock before orders; release the order first.
            drop(order);
            return self
                .replayed_hold(actor, order_id, shares, &token)
                .await?
                .ok_or_else(|| FracshareError::Internal(format!("outcome for token {token} vanished")));
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
        let mut wallet = self.store.lock_wallet(buyer).await?;
        wallet.move_to_pending(amount)?;
        wallet.updated_at = now;
        order.hold(shares, now)?;
        let hold = Hold::new(&order, buyer, shares, now, now + self.config.hold_ttl())?;

        let entries = vec![
            AuditEntry::Order(
                OrderEvent::new(order_id, OrderEventKind::HoldPlaced, Some(buyer), shares, now)
                    .with_token(Some(token.clone()))
                    .with_hold(hold.id),
            ),
            AuditEntry::Transaction(
                transaction(buyer, TransactionKind::HoldEscrow, wallet.committed(), &wallet, now)
                    .for_trade(order_id, order.property, shares),
            ),
        ];
        self.store.audit.append(entries).await?;
        self.store.holds.insert_new(hold.id, hold.clone()).await;
        wallet.commit();
        order.commit();
        self.remember(order_id, token, Outcome::Hold(hold.id)).await;

        tracing::info!(
            hold = %hold.id,
            order = %order_id,
            buyer = %buyer,
            shares,
            amount = %amount,
            expires_at = %hold.hold_expires_at,
            "Hold placed"
        );
        self.alert(
            buyer,
            AlertType::HoldPlaced,
            "Hold placed",
            format!(
                "{shares} shares of {} are held for you until {}",
                listing.title, hold.hold_expires_at
            ),
            hold.property,
        );
        Ok(hold)
    }

    async fn try_buyer_confirm(&self, actor: &Actor, hold_id: HoldId) -> Result<()> {
        let now = self.clock.now();
        let mut hold = self.store.lock_hold(hold_id).await?;
        actor.require_party(hold.buyer, "confirm this hold as buyer")?;
        if hold.status.is_open() && hold.is_past_deadline(now) {
            let order = self.store.lock_order(hold.order_id).await?;
            self.unwind_hold(hold, order, HoldStatus::Expired, None, now)
                .await?;
            return Err(FracshareError::HoldExpired(hold_id));
        }
        hold.confirm_by_buyer()?;

        let event = OrderEvent::new(
            hold.order_id,
            OrderEventKind::HoldBuyerConfirmed,
            Some(actor.user_id),
            hold.shares,
            now,
        )
        .with_hold(hold_id);
        self.store.audit.append(vec![AuditEntry::Order(event)]).await?;
        let (seller, shares, property) = (hold.seller, hold.shares, hold.property);
        hold.commit();

        tracing::info!(hold = %hold_id, buyer = %actor.user_id, "Hold confirmed by buyer");
        self.alert(
            seller,
            AlertType::HoldAwaitingSeller,
            "Buyer confirmed",
            format!(
                "A buyer confirmed a hold on {shares} shares of {}; your confirmation is needed",
                self.catalog.title(property)
            ),
            property,
        );
        Ok(())
    }

    async fn try_seller_confirm(&self, actor: &Actor, hold_id: HoldId) -> Result<Reservation> {
        let now = self.clock.now();
        let mut hold = self.store.lock_hold(hold_id).await?;
        actor.require_party(hold.seller, "confirm this hold as seller")?;
        let mut order = self.store.lock_order(hold.order_id).await?;
        if hold.status.is_open() && hold.is_past_deadline(now) {
            self.unwind_hold(hold, order, HoldStatus::Expired, None, now)
                .await?;
            return Err(FracshareError::HoldExpired(hold_id));
        }

        let reservation =
            Reservation::from_hold(&hold, now, now + self.config.reservation_ttl());
        hold.confirm_by_seller(reservation.id)?;
        order.promote_hold(hold.shares, now)?;

        let event = OrderEvent::new(
            hold.order_id,
            OrderEventKind::ReservationCreated,
            Some(actor.user_id),
            hold.shares,
            now,
        )
        .with_hold(hold_id)
        .with_reservation(reservation.id);
        self.store.audit.append(vec![AuditEntry::Order(event)]).await?;
        self.store
            .reservations
            .insert_new(reservation.id, reservation.clone())
            .await;
        hold.commit();
        order.commit();

        tracing::info!(
            hold = %hold_id,
            reservation = %reservation.id,
            amount = %reservation.amount,
            expires_at = %reservation.expires_at,
            "Reservation created"
        );
        let title = self.catalog.title(reservation.property);
        for party in [reservation.buyer, reservation.seller] {
            self.alert(
                party,
                AlertType::ReservationCreated,
                "Reservation created",
                format!(
                    "{} shares of {title} are reserved pending settlement",
                    reservation.shares
                ),
                reservation.property,
            );
        }
        Ok(reservation)
    }

    async fn try_cancel_hold(&self, actor: &Actor, hold_id: HoldId) -> Result<()> {
        let now = self.clock.now();
        let hold = self.store.lock_hold(hold_id).await?;
        actor.require_party(hold.buyer, "cancel this hold")?;
        if hold.status != HoldStatus::Active {
            return Err(FracshareError::HoldNotActive {
                hold: hold_id,
                status: hold.status,
            });
        }
        let order = self.store.lock_order(hold.order_id).await?;
        self.unwind_hold(hold, order, HoldStatus::Cancelled, Some(actor.user_id), now)
            .await
    }

    /// Reverse an open hold: escrow back to available, shares back to the
    /// listing (or out of the park if the listing has closed).
    async fn unwind_hold(
        &self,
        mut hold: RowGuard<Hold>,
        mut order: RowGuard<Order>,
        status: HoldStatus,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut park = self.store.lock_park(order.seller, order.property).await?;
        let mut wallet = self.store.lock_wallet(hold.buyer).await?;

        hold.close(status)?;
        if order.return_held(hold.shares, now)? == ShareReturn::ReleaseToPark {
            park.release(order.id, hold.shares, now)?;
        }
        wallet.release_pending(hold.amount)?;
        wallet.updated_at = now;

        let kind = if status == HoldStatus::Expired {
            OrderEventKind::HoldExpired
        } else {
            OrderEventKind::HoldCancelled
        };
        let entries = vec![
            AuditEntry::Order(
                OrderEvent::new(order.id, kind, actor, hold.shares, now).with_hold(hold.id),
            ),
            AuditEntry::Transaction(
                transaction(hold.buyer, TransactionKind::HoldRelease, wallet.committed(), &wallet, now)
                    .for_trade(order.id, order.property, hold.shares),
            ),
        ];
        self.store.audit.append(entries).await?;
        let (hold_id, buyer, shares, property) = (hold.id, hold.buyer, hold.shares, hold.property);
        let relisted = order.is_active();
        wallet.commit();
        park.commit();
        order.commit();
        hold.commit();

        tracing::info!(hold = %hold_id, buyer = %buyer, status = %status, relisted, "Hold reversed");
        if status == HoldStatus::Expired {
            self.alert(
                buyer,
                AlertType::HoldExpired,
                "Hold expired",
                format!(
                    "Your hold on {shares} shares of {} expired and the funds were released",
                    self.catalog.title(property)
                ),
                property,
            );
        }
        Ok(())
    }
}
