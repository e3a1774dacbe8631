//! Order book: listing lifecycle and the share park.
//!
//! A listing parks the shares it offers in the seller's [`ParkAccount`] for
//! `(seller, property)`. Because every listing of that pair serializes on
//! the same park row, two concurrent listings can never promise the same
//! shares. Parked shares leave the park when they are sold, or when the
//! listing closes with shares still unsold.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fracshare_types::{
    order::{listing_amount, validate_listing}, Actor, Alert, AlertType, AuditEntry, FracshareError, Holding,
    LedgerTransaction, Order, OrderEvent, OrderEventKind, OrderId, PropertyId, Result,
    TransactionKind, UserId,
};
use rust_decimal::Decimal;

use crate::catalog::PropertyCatalog;
use crate::clock::Clock;
use crate::notify::NotificationSink;
use crate::store::{RowGuard, Store};

pub struct OrderBook {
    store: Arc<Store>,
    catalog: Arc<dyn PropertyCatalog>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    order_ttl: chrono::Duration,
}

impl OrderBook {
    pub fn new(
        store: Arc<Store>,
        catalog: Arc<dyn PropertyCatalog>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        order_ttl: chrono::Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            sink,
            clock,
            order_ttl,
        }
    }

    /// List `shares` of the actor's holding in `property` at a fixed price.
    ///
    /// # Errors
    /// `InvalidShares` / `InvalidPrice` for bad inputs, `TradingDisabled` if
    /// the property is not tradable, `InsufficientFreeShares` if the seller
    /// does not own enough unlisted shares.
    pub async fn create_order(
        &self,
        actor: &Actor,
        property: PropertyId,
        shares: u64,
        price_per_share: Decimal,
    ) -> Result<Order> {
        validate_listing(shares, price_per_share)?;
        self.catalog.ensure_tradable(property)?;
        let seller = actor.user_id;
        if !self.store.wallets.contains(&seller).await {
            tracing::error!(seller = %seller, "Listing from a user without a wallet");
            return Err(FracshareError::WalletNotFound(seller));
        }

        let now = self.clock.now();
        let mut park = self.store.lock_park(seller, property).await?;
        let holding = self.store.lock_holding((seller, property)).await?;
        let owned = holding.as_ref().map_or(0, |h| h.shares_owned);

        let order = Order::new(seller, property, shares, price_per_share, now, now + self.order_ttl);
        if let Err(e) = park.park(order.id, owned, shares, now) {
            tracing::debug!(seller = %seller, property = %property, shares, owned, error = %e, "Listing rejected");
            return Err(e);
        }

        let event = OrderEvent::new(order.id, OrderEventKind::OrderCreated, Some(seller), shares, now);
        self.store.audit.append(vec![AuditEntry::Order(event)]).await?;
        self.store.orders.insert_new(order.id, order.clone()).await;
        park.commit();
        drop(holding);

        tracing::info!(
            order = %order.id,
            seller = %seller,
            property = %property,
            shares,
            price = %price_per_share,
            "Order created"
        );
        Ok(order)
    }

    /// Withdraw a listing. Unsold shares leave the park; shares committed to
    /// open holds stay parked until those holds resolve.
    ///
    /// # Errors
    /// `Forbidden` unless seller or admin, `OrderNotActive` if already
    /// closed, `HasConfirmedHolds` while a reservation awaits settlement.
    pub async fn cancel_order(&self, actor: &Actor, order_id: OrderId) -> Result<()> {
        let now = self.clock.now();
        let mut order = self.store.lock_order(order_id).await?;
        actor.require_owner_or_admin(order.seller, "cancel this order")?;
        order.ensure_active()?;
        if order.reserved_shares > 0 {
            return Err(FracshareError::HasConfirmedHolds(order_id));
        }

        let released = order.cancel(now)?;
        let mut park = self.store.lock_park(order.seller, order.property).await?;
        park.release(order_id, released, now)?;

        let event = OrderEvent::new(
            order_id,
            OrderEventKind::OrderCancelled,
            Some(actor.user_id),
            released,
            now,
        );
        self.store.audit.append(vec![AuditEntry::Order(event)]).await?;
        park.commit();
        order.commit();

        tracing::info!(order = %order_id, actor = %actor.user_id, released, "Order cancelled");
        Ok(())
    }

    /// Expire a listing whose deadline has passed. Returns `false` if there
    /// was nothing to do.
    pub async fn expire_order(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<bool> {
        let order = self.store.lock_order(order_id).await?;
        if !order.is_active() || !order.is_past_deadline(now) {
            return Ok(false);
        }
        self.close_expired(order, now).await?;
        Ok(true)
    }

    /// Transition an already locked, overdue listing to expired.
    ///
    /// Takes the order guard so callers that discovered the deadline while
    /// holding the order lock keep the lock order intact.
    pub async fn close_expired(&self, mut order: RowGuard<Order>, now: DateTime<Utc>) -> Result<()> {
        let released = order.expire(now)?;
        let mut park = self.store.lock_park(order.seller, order.property).await?;
        park.release(order.id, released, now)?;

        let event = OrderEvent::new(order.id, OrderEventKind::OrderExpired, None, released, now);
        self.store.audit.append(vec![AuditEntry::Order(event)]).await?;
        let (id, seller, property) = (order.id, order.seller, order.property);
        park.commit();
        order.commit();

        tracing::info!(order = %id, seller = %seller, released, "Order expired");
        self.sink.notify(Alert::new(
            seller,
            AlertType::OrderExpired,
            "Listing expired",
            format!(
                "Your listing for {} expired; {released} unsold shares are available again",
                self.catalog.title(property)
            ),
            property,
        ));
        Ok(())
    }

    /// Primary issuance: credit `shares` of `property` to `user` at a cost
    /// of `price_per_share` each.
    pub async fn grant_holding(
        &self,
        actor: &Actor,
        user: UserId,
        property: PropertyId,
        shares: u64,
        price_per_share: Decimal,
    ) -> Result<Holding> {
        actor.require_admin("grant shares")?;
        validate_listing(shares, price_per_share)?;
        let now = self.clock.now();
        let amount = listing_amount(shares, price_per_share)?;

        let mut wallet = self.store.lock_wallet(user).await?;
        let mut slot = self.store.lock_holding((user, property)).await?;
        match slot.as_mut() {
            Some(holding) => holding.acquire(shares, amount, now),
            None => *slot = Some(Holding::open(user, property, shares, amount, now)),
        }
        wallet.total_invested += amount;
        wallet.updated_at = now;

        let mut tx = LedgerTransaction::new(user, TransactionKind::ShareGrant, Decimal::ZERO, Decimal::ZERO, now);
        tx.property = Some(property);
        tx.shares = shares;
        self.store.audit.append(vec![AuditEntry::Transaction(tx)]).await?;

        let holding = slot.clone().ok_or_else(|| FracshareError::Internal("granted holding vanished".into()))?;
        slot.commit();
        wallet.commit();

        tracing::info!(user = %user, property = %property, shares, "Shares granted");
        Ok(holding)
    }

    pub async fn order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .orders
            .get(&order_id, self.store.lock_timeout())
            .await?
            .ok_or(FracshareError::OrderNotFound(order_id))
    }
}
