//! Reservation settlement.
//!
//! A reservation is a both-confirmed hold waiting for the off-platform
//! payment to be checked. An admin approves it (escrow pays the seller and
//! the shares move) or rejects it (escrow goes back to the buyer and the
//! shares back to the listing). Unresolved reservations expire like
//! rejected ones.

use chrono::{DateTime, Utc};
use fracshare_ledger::wallet_ledger::transaction;
use fracshare_ledger::RowGuard;
use fracshare_types::{
    Actor, AlertType, AuditEntry, FracshareError, Order, OrderEvent, OrderEventKind, Reservation,
    ReservationId, ReservationStatus, Result, ShareReturn, TradeId, TradeProtocol, TradeResult,
    TransactionKind, UserId,
};

use crate::engine::SettlementEngine;
use crate::transfer::TradeRows;

impl SettlementEngine {
    /// Admin decision on a reservation.
    ///
    /// # Errors
    /// `Forbidden` for non-admins; `ReservationNotActive` if it was already
    /// resolved, or if it had run past its deadline (it is expired first).
    pub async fn admin_settle_reservation(
        &self,
        actor: &Actor,
        reservation_id: ReservationId,
        approve: bool,
    ) -> Result<()> {
        self.retry
            .run("admin_settle_reservation", move || {
                self.try_settle_reservation(actor, reservation_id, approve)
            })
            .await
    }

    /// Reconciler entry point. `Ok(false)` if the reservation was already
    /// resolved or not yet overdue when its lock was taken.
    pub async fn expire_reservation(
        &self,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let reservation = self.store.lock_reservation(reservation_id).await?;
        if reservation.status != ReservationStatus::Active || !reservation.is_past_deadline(now) {
            return Ok(false);
        }
        let order = self.store.lock_order(reservation.order_id).await?;
        self.unwind_reservation(reservation, order, ReservationStatus::Expired, None, now)
            .await?;
        Ok(true)
    }

    async fn try_settle_reservation(
        &self,
        actor: &Actor,
        reservation_id: ReservationId,
        approve: bool,
    ) -> Result<()> {
        actor.require_admin("settle reservations")?;
        let now = self.clock.now();
        let mut reservation = self.store.lock_reservation(reservation_id).await?;
        if reservation.status != ReservationStatus::Active {
            return Err(FracshareError::ReservationNotActive {
                reservation: reservation_id,
                status: reservation.status,
            });
        }
        let mut order = self.store.lock_order(reservation.order_id).await?;

        if reservation.is_past_deadline(now) {
            self.unwind_reservation(reservation, order, ReservationStatus::Expired, None, now)
                .await?;
            return Err(FracshareError::ReservationNotActive {
                reservation: reservation_id,
                status: ReservationStatus::Expired,
            });
        }
        if !approve {
            return self
                .unwind_reservation(
                    reservation,
                    order,
                    ReservationStatus::Cancelled,
                    Some(actor.user_id),
                    now,
                )
                .await;
        }

        let (buyer, seller, property) = (reservation.buyer, reservation.seller, reservation.property);
        let (shares, amount) = (reservation.shares, reservation.amount);
        let mut rows = TradeRows::lock(&self.store, buyer, seller, property).await?;

        rows.buyer_wallet.consume_pending(amount)?;
        rows.seller_wallet.credit(amount)?;
        rows.transfer_shares(property, shares, amount, now)?;
        order.settle_reserved(shares, now)?;
        rows.park.release(order.id, shares, now)?;
        reservation.resolve(ReservationStatus::Settled, now)?;

        let trade = TradeResult {
            trade_id: TradeId::new(),
            protocol: TradeProtocol::Reservation,
            order_id: order.id,
            buyer,
            seller,
            property,
            shares,
            price_per_share: reservation.price_per_share,
            amount,
            order_remaining: order.remaining_shares,
            order_status: order.status,
            executed_at: now,
        };
        let mut entries = vec![AuditEntry::Order(
            OrderEvent::new(
                order.id,
                OrderEventKind::ReservationSettled,
                Some(actor.user_id),
                shares,
                now,
            )
            .with_hold(reservation.hold_id)
            .with_reservation(reservation_id)
            .with_trade(trade.clone()),
        )];
        entries.extend(rows.transactions(
            TransactionKind::ReservationPurchase,
            TransactionKind::ReservationSale,
            order.id,
            property,
            shares,
            now,
        ));
        self.store.audit.append(entries).await?;
        rows.commit();
        order.commit();
        reservation.commit();

        tracing::info!(
            reservation = %reservation_id,
            trade = %trade.trade_id,
            buyer = %buyer,
            seller = %seller,
            shares,
            amount = %amount,
            "Reservation settled"
        );
        let title = self.catalog.title(property);
        for party in [buyer, seller] {
            self.alert(
                party,
                AlertType::ReservationSettled,
                "Reservation settled",
                format!("Settlement of {shares} shares of {title} for {amount} is complete"),
                property,
            );
        }
        Ok(())
    }

    /// Reverse an active reservation: escrow back to the buyer, shares back
    /// to the listing (or out of the park if the listing has closed).
    async fn unwind_reservation(
        &self,
        mut reservation: RowGuard<Reservation>,
        mut order: RowGuard<Order>,
        status: ReservationStatus,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut park = self.store.lock_park(order.seller, order.property).await?;
        let mut wallet = self.store.lock_wallet(reservation.buyer).await?;

        reservation.resolve(status, now)?;
        if order.return_reserved(reservation.shares, now)? == ShareReturn::ReleaseToPark {
            park.release(order.id, reservation.shares, now)?;
        }
        wallet.release_pending(reservation.amount)?;
        wallet.updated_at = now;

        let kind = if status == ReservationStatus::Expired {
            OrderEventKind::ReservationExpired
        } else {
            OrderEventKind::ReservationCancelled
        };
        let entries = vec![
            AuditEntry::Order(
                OrderEvent::new(order.id, kind, actor, reservation.shares, now)
                    .with_hold(reservation.hold_id)
                    .with_reservation(reservation.id),
            ),
            AuditEntry::Transaction(
                transaction(
                    reservation.buyer,
                    TransactionKind::HoldRelease,
                    wallet.committed(),
                    &wallet,
                    now,
                )
                .for_trade(order.id, order.property, reservation.shares),
            ),
        ];
        self.store.audit.append(entries).await?;
        let resolved = (*reservation).clone();
        let relisted = order.is_active();
        wallet.commit();
        park.commit();
        order.commit();
        reservation.commit();

        tracing::info!(
            reservation = %resolved.id,
            buyer = %resolved.buyer,
            status = %status,
            relisted,
            "Reservation reversed"
        );
        let alert_type = if status == ReservationStatus::Expired {
            AlertType::ReservationExpired
        } else {
            AlertType::ReservationCancelled
        };
        let title = self.catalog.title(resolved.property);
        for party in [resolved.buyer, resolved.seller] {
            self.alert(
                party,
                alert_type,
                "Reservation closed",
                format!(
                    "The reservation of {} shares of {title} was {} and the escrow released",
                    resolved.shares,
                    status.to_string().to_lowercase()
                ),
                resolved.property,
            );
        }
        Ok(())
    }
}
