//! The settlement engine facade.
//!
//! [`SettlementEngine`] owns the store and wires the wallet ledger, the
//! order book, the collaborators and the replay guard together. The trade
//! protocols live in [`crate::instant_match`], [`crate::hold`] and
//! [`crate::reservation`] as further `impl` blocks on this type.
//!
//! Every client operation runs as one transaction inside the retry policy:
//! it either commits completely or leaves every row as it was.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fracshare_ledger::{Clock, NotificationSink, OrderBook, PropertyCatalog, Store, WalletLedger};
use fracshare_types::{
    Actor, Alert, AlertType, AuditRecord, EngineConfig, FracshareError, Hold, HoldId, Holding,
    IdempotencyToken, Order, OrderId, PropertyId, Reservation, ReservationId, Result,
    TradeProtocol, UserId, Wallet,
};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::conservation::{ConservationChecker, ConservationReport};
use crate::idempotency::{IdempotencyGuard, Outcome};
use crate::retry::RetryPolicy;

pub struct SettlementEngine {
    pub(crate) config: EngineConfig,
    pub(crate) store: Arc<Store>,
    pub(crate) ledger: WalletLedger,
    pub(crate) book: OrderBook,
    pub(crate) catalog: Arc<dyn PropertyCatalog>,
    pub(crate) sink: Arc<dyn NotificationSink>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) idempotency: Mutex<IdempotencyGuard>,
    pub(crate) retry: RetryPolicy,
}

impl SettlementEngine {
    /// # Errors
    /// `Configuration` if `config` does not validate.
    pub fn new(
        config: EngineConfig,
        catalog: Arc<dyn PropertyCatalog>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(Store::new(config.lock_timeout()));
        let ledger = WalletLedger::new(store.clone(), clock.clone());
        let book = OrderBook::new(
            store.clone(),
            catalog.clone(),
            sink.clone(),
            clock.clone(),
            config.order_ttl(),
        );
        Ok(Self {
            idempotency: Mutex::new(IdempotencyGuard::new(config.idempotency_cache_size)),
            retry: RetryPolicy::new(&config.retry),
            config,
            store,
            ledger,
            book,
            catalog,
            sink,
            clock,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ----- wallets and issuance -----

    pub async fn open_wallet(&self, user: UserId) -> Result<Wallet> {
        self.ledger.open_wallet(user).await
    }

    pub async fn fund_wallet(&self, actor: &Actor, user: UserId, amount: Decimal) -> Result<Wallet> {
        self.retry
            .run("fund_wallet", move || self.ledger.fund_wallet(actor, user, amount))
            .await
    }

    pub async fn withdraw_wallet(
        &self,
        actor: &Actor,
        user: UserId,
        amount: Decimal,
    ) -> Result<Wallet> {
        self.retry
            .run("withdraw_wallet", move || {
                self.ledger.withdraw_wallet(actor, user, amount)
            })
            .await
    }

    pub async fn grant_holding(
        &self,
        actor: &Actor,
        user: UserId,
        property: PropertyId,
        shares: u64,
        price_per_share: Decimal,
    ) -> Result<Holding> {
        self.retry
            .run("grant_holding", move || {
                self.book
                    .grant_holding(actor, user, property, shares, price_per_share)
            })
            .await
    }

    // ----- listings -----

    pub async fn create_order(
        &self,
        actor: &Actor,
        property: PropertyId,
        shares: u64,
        price_per_share: Decimal,
    ) -> Result<Order> {
        self.retry
            .run("create_order", move || {
                self.book.create_order(actor, property, shares, price_per_share)
            })
            .await
    }

    pub async fn cancel_order(&self, actor: &Actor, order_id: OrderId) -> Result<()> {
        self.retry
            .run("cancel_order", move || self.book.cancel_order(actor, order_id))
            .await
    }

    /// Reconciler entry point. `Ok(false)` if the order was not overdue.
    pub async fn expire_order(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<bool> {
        self.book.expire_order(order_id, now).await
    }

    // ----- snapshots -----

    pub async fn wallet(&self, user: UserId) -> Result<Wallet> {
        self.ledger.wallet(user).await
    }

    pub async fn holding(&self, user: UserId, property: PropertyId) -> Result<Option<Holding>> {
        self.store.holding(user, property).await
    }

    pub async fn order(&self, order_id: OrderId) -> Result<Order> {
        self.book.order(order_id).await
    }

    pub async fn hold(&self, hold_id: HoldId) -> Result<Hold> {
        self.store
            .holds
            .get(&hold_id, self.store.lock_timeout())
            .await?
            .ok_or(FracshareError::HoldNotFound(hold_id))
    }

    pub async fn reservation(&self, reservation_id: ReservationId) -> Result<Reservation> {
        self.store
            .reservations
            .get(&reservation_id, self.store.lock_timeout())
            .await?
            .ok_or(FracshareError::ReservationNotFound(reservation_id))
    }

    pub async fn audit_log(&self) -> Vec<AuditRecord> {
        self.store.audit.records().await
    }

    /// Audit chain plus every conservation invariant. Only meaningful while
    /// no transaction is in flight.
    pub async fn verify_conservation(&self) -> Result<ConservationReport> {
        ConservationChecker::verify(&self.store).await
    }

    // ----- shared helpers -----

    pub(crate) fn ensure_protocol(&self, protocol: TradeProtocol) -> Result<()> {
        let enabled = match protocol {
            TradeProtocol::InstantMatch => self.config.protocols.instant_match,
            TradeProtocol::Reservation => self.config.protocols.hold_reservation,
        };
        if enabled {
            Ok(())
        } else {
            Err(FracshareError::ProtocolDisabled(protocol.to_string()))
        }
    }

    /// Outcome of an earlier committed request with the same `(order, token)`.
    ///
    /// Served from the in-memory cache, falling back to the audit log's
    /// token index (and re-warming the cache on a hit there).
    pub(crate) async fn prior_outcome(
        &self,
        order_id: OrderId,
        token: &IdempotencyToken,
    ) -> Option<Outcome> {
        let key = (order_id, token.clone());
        if let Some(outcome) = self.idempotency.lock().await.lookup(&key) {
            return Some(outcome.clone());
        }
        let event = self.store.audit.event_for_token(order_id, token).await?;
        let outcome = match (event.trade, event.hold_id) {
            (Some(trade), _) => Outcome::Trade(trade),
            (None, Some(hold)) => Outcome::Hold(hold),
            (None, None) => return None,
        };
        self.idempotency.lock().await.record(key, outcome.clone());
        Some(outcome)
    }

    pub(crate) async fn remember(&self, order_id: OrderId, token: IdempotencyToken, outcome: Outcome) {
        self.idempotency
            .lock()
            .await
            .record((order_id, token), outcome);
    }

    pub(crate) fn alert(
        &self,
        user: UserId,
        alert_type: AlertType,
        title: &str,
        message: String,
        property: PropertyId,
    ) {
        self.sink
            .notify(Alert::new(user, alert_type, title, message, property));
    }
}

/// A token replays only for the buyer that first used it, asking for the
/// same quantity.
pub(crate) fn ensure_same_request(
    actor: &Actor,
    token: &IdempotencyToken,
    original_buyer: UserId,
    shares: u64,
    original_shares: u64,
) -> Result<()> {
    if actor.user_id != original_buyer {
        tracing::warn!(token = %token, actor = %actor.user_id, "Token reused by another user");
        return Err(FracshareError::InvalidToken {
            reason: "token already used by another user".to_string(),
        });
    }
    if shares != original_shares {
        return Err(FracshareError::InvalidToken {
            reason: format!("token already used for {original_shares} shares, not {shares}"),
        });
    }
    Ok(())
}
