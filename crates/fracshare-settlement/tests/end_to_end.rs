//! End-to-end tests across the ledger and both settlement protocols.
//!
//! Each test builds a small market: one property, a seller holding 100
//! shares (granted at 40 each), a buyer with 10 000 in cash and an admin.
//! Time is driven by a `ManualClock`; alerts are captured by a
//! `RecordingSink`.

use std::sync::Arc;

use chrono::Utc;
use fracshare_ledger::{InMemoryCatalog, ManualClock, RecordingSink};
use fracshare_settlement::{ExpiryReconciler, SettlementEngine};
use fracshare_types::*;
use rust_decimal::Decimal;

struct Market {
    engine: Arc<SettlementEngine>,
    clock: Arc<ManualClock>,
    sink: Arc<RecordingSink>,
    catalog: Arc<InMemoryCatalog>,
    admin: Actor,
    property: PropertyId,
    seller: UserId,
    buyer: UserId,
}

fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

fn token(raw: &str) -> IdempotencyToken {
    IdempotencyToken::parse(raw).unwrap()
}

impl Market {
    async fn new() -> Self {
        Self::with_config(EngineConfig::default()).await
    }

    async fn with_config(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let sink = Arc::new(RecordingSink::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let property = catalog.add("Harbour Lofts");
        let engine = Arc::new(
            SettlementEngine::new(config, catalog.clone(), sink.clone(), clock.clone()).unwrap(),
        );

        let admin = Actor::admin(UserId::new());
        let seller = UserId::new();
        let buyer = UserId::new();
        for user in [seller, buyer] {
            engine.open_wallet(user).await.unwrap();
        }
        engine
            .grant_holding(&admin, seller, property, 100, dec(40))
            .await
            .unwrap();
        engine.fund_wallet(&admin, buyer, dec(10_000)).await.unwrap();

        Self {
            engine,
            clock,
            sink,
            catalog,
            admin,
            property,
            seller,
            buyer,
        }
    }

    fn as_seller(&self) -> Actor {
        Actor::user(self.seller)
    }

    fn as_buyer(&self) -> Actor {
        Actor::user(self.buyer)
    }

    async fn list(&self, shares: u64, price: i64) -> Order {
        self.engine
            .create_order(&self.as_seller(), self.property, shares, dec(price))
            .await
            .unwrap()
    }

    async fn shares_of(&self, user: UserId) -> u64 {
        self.engine
            .holding(user, self.property)
            .await
            .unwrap()
            .map_or(0, |h| h.shares_owned)
    }

    async fn available(&self, user: UserId) -> Decimal {
        self.engine.wallet(user).await.unwrap().available_balance
    }

    async fn pending(&self, user: UserId) -> Decimal {
        self.engine.wallet(user).await.unwrap().pending_balance
    }

    /// Hold → buyer confirm → seller confirm.
    async fn reserve(&self, order: OrderId, shares: u64) -> Reservation {
        let hold = self
            .engine
            .create_hold(&self.as_buyer(), order, shares, IdempotencyToken::generate())
            .await
            .unwrap();
        self.engine
            .buyer_confirm_hold(&self.as_buyer(), hold.id)
            .await
            .unwrap();
        self.engine
            .seller_confirm_hold(&self.as_seller(), hold.id)
            .await
            .unwrap()
    }
}

// =============================================================================
// Instant match
// =============================================================================

#[tokio::test]
async fn e2e_instant_match_moves_cash_and_shares() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;

    let trade = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 20, token("buy-1"))
        .await
        .unwrap();

    assert_eq!(trade.protocol, TradeProtocol::InstantMatch);
    assert_eq!(trade.amount, dec(1_000));
    assert_eq!(trade.order_remaining, 80);
    assert_eq!(trade.order_status, OrderStatus::Active);

    assert_eq!(m.available(m.buyer).await, dec(9_000));
    assert_eq!(m.available(m.seller).await, dec(1_000));
    assert_eq!(m.shares_of(m.buyer).await, 20);
    assert_eq!(m.shares_of(m.seller).await, 80);

    let buyer_holding = m.engine.holding(m.buyer, m.property).await.unwrap().unwrap();
    assert_eq!(buyer_holding.price_per_share, dec(50));
    assert_eq!(m.engine.wallet(m.buyer).await.unwrap().total_invested, dec(1_000));
    // 20 of 100 shares carried 800 of the seller's 4 000 cost basis.
    assert_eq!(m.engine.wallet(m.seller).await.unwrap().total_invested, dec(3_200));

    let order = m.engine.order(order.id).await.unwrap();
    assert_eq!(order.remaining_shares, 80);
    assert_eq!(order.filled_shares(), 20);

    assert_eq!(m.sink.count(m.buyer, AlertType::PurchaseCompleted), 1);
    assert_eq!(m.sink.count(m.seller, AlertType::SaleCompleted), 1);
    m.engine.verify_conservation().await.unwrap();
}

#[tokio::test]
async fn e2e_insufficient_funds_changes_nothing() {
    let m = Market::new().await;
    let order = m.list(100, 600).await;
    let audit_before = m.engine.audit_log().await.len();

    let err = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 20, token("too-big"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FracshareError::InsufficientFunds { required, available }
            if required == dec(12_000) && available == dec(10_000)
    ));
    assert_eq!(err.kind(), ErrorKind::Resource);

    assert_eq!(m.available(m.buyer).await, dec(10_000));
    assert_eq!(m.available(m.seller).await, dec(0));
    assert_eq!(m.shares_of(m.buyer).await, 0);
    assert_eq!(m.shares_of(m.seller).await, 100);
    assert_eq!(m.engine.order(order.id).await.unwrap().remaining_shares, 100);
    assert_eq!(m.engine.audit_log().await.len(), audit_before);
    m.engine.verify_conservation().await.unwrap();
}

#[tokio::test]
async fn e2e_replayed_token_returns_original_trade() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;

    let first = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 10, token("retry-me"))
        .await
        .unwrap();
    let again = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 10, token("retry-me"))
        .await
        .unwrap();

    assert_eq!(first, again);
    assert_eq!(m.available(m.buyer).await, dec(9_500));
    assert_eq!(m.engine.order(order.id).await.unwrap().remaining_shares, 90);
    let matched = m
        .engine
        .store()
        .audit
        .events_for_order(order.id)
        .await
        .into_iter()
        .filter(|e| e.kind == OrderEventKind::InstantMatched)
        .count();
    assert_eq!(matched, 1);
}

#[tokio::test]
async fn e2e_replay_survives_cache_eviction() {
    let config = EngineConfig {
        idempotency_cache_size: 1,
        ..EngineConfig::default()
    };
    let m = Market::with_config(config).await;
    let order = m.list(100, 50).await;

    let first = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 5, token("t1"))
        .await
        .unwrap();
    m.engine
        .instant_match(&m.as_buyer(), order.id, 5, token("t2"))
        .await
        .unwrap();

    // t1 has been evicted from memory; the audit log answers instead.
    let replay = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 5, token("t1"))
        .await
        .unwrap();
    assert_eq!(replay.trade_id, first.trade_id);
    assert_eq!(m.shares_of(m.buyer).await, 10);
}

#[tokio::test]
async fn e2e_full_fill_completes_order_and_removes_seller_holding() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;

    let trade = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 100, token("all"))
        .await
        .unwrap();

    assert_eq!(trade.order_status, OrderStatus::Completed);
    assert!(m.engine.holding(m.seller, m.property).await.unwrap().is_none());
    assert_eq!(m.engine.wallet(m.seller).await.unwrap().total_invested, dec(0));

    let err = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 1, token("late"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FracshareError::OrderNotActive { status: OrderStatus::Completed, .. }
    ));
    m.engine.verify_conservation().await.unwrap();
}

#[tokio::test]
async fn e2e_business_rules_reject_bad_trades() {
    let m = Market::new().await;
    let order = m.list(10, 50).await;

    let err = m
        .engine
        .instant_match(&m.as_seller(), order.id, 1, token("self"))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::SelfTrade));

    let err = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 11, token("too-many"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FracshareError::InsufficientRemainingShares { requested: 11, remaining: 10 }
    ));

    let err = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 0, token("zero"))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::InvalidShares { .. }));

    m.catalog.set_sellable(m.property, false);
    let err = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 1, token("frozen"))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::TradingDisabled(_)));

    let err = m
        .engine
        .instant_match(&m.as_buyer(), OrderId::new(), 1, token("ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::OrderNotFound(_)));
}

#[tokio::test]
async fn e2e_overdue_order_expires_on_touch() {
    let m = Market::new().await;
    let order = m.list(40, 50).await;
    m.clock.advance(chrono::Duration::days(31));

    let err = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 1, token("stale"))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::OrderExpired(_)));
    assert_eq!(m.engine.order(order.id).await.unwrap().status, OrderStatus::Expired);
    assert_eq!(m.sink.count(m.seller, AlertType::OrderExpired), 1);

    // The parked 40 shares are free again.
    m.list(100, 50).await;
}

#[tokio::test]
async fn e2e_disabled_protocol_is_refused() {
    let mut config = EngineConfig::default();
    config.protocols.instant_match = false;
    let m = Market::with_config(config).await;
    let order = m.list(10, 50).await;

    let err = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 1, token("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::ProtocolDisabled(_)));
    m.engine
        .create_hold(&m.as_buyer(), order.id, 1, token("y"))
        .await
        .unwrap();
}

// =============================================================================
// Listings
// =============================================================================

#[tokio::test]
async fn e2e_duplicate_cancel_is_rejected() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;

    m.engine.cancel_order(&m.as_seller(), order.id).await.unwrap();
    let err = m
        .engine
        .cancel_order(&m.as_seller(), order.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FracshareError::OrderNotActive { status: OrderStatus::Cancelled, .. }
    ));

    // All 100 shares can be listed again, exactly once.
    m.list(100, 55).await;
    let err = m
        .engine
        .create_order(&m.as_seller(), m.property, 1, dec(55))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::InsufficientFreeShares { requested: 1, free: 0 }));
    m.engine.verify_conservation().await.unwrap();
}

// =============================================================================
// Hold / reservation
// =============================================================================

#[tokio::test]
async fn e2e_hold_expires_after_61_minutes() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;

    let hold = m
        .engine
        .create_hold(&m.as_buyer(), order.id, 10, token("hold-1"))
        .await
        .unwrap();
    assert_eq!(hold.amount, dec(500));
    assert_eq!(m.available(m.buyer).await, dec(9_500));
    assert_eq!(m.pending(m.buyer).await, dec(500));
    let o = m.engine.order(order.id).await.unwrap();
    assert_eq!((o.remaining_shares, o.held_shares), (90, 10));

    let reconciler = ExpiryReconciler::new(m.engine.clone());
    m.clock.advance(chrono::Duration::minutes(59));
    assert_eq!(reconciler.sweep_once().await.holds_expired, 0);

    m.clock.advance(chrono::Duration::minutes(2));
    let report = reconciler.sweep_once().await;
    assert_eq!(report.holds_expired, 1);
    assert_eq!(report.failures, 0);

    assert_eq!(m.engine.hold(hold.id).await.unwrap().status, HoldStatus::Expired);
    assert_eq!(m.available(m.buyer).await, dec(10_000));
    assert_eq!(m.pending(m.buyer).await, dec(0));
    let o = m.engine.order(order.id).await.unwrap();
    assert_eq!((o.remaining_shares, o.held_shares), (100, 0));
    assert_eq!(m.sink.count(m.buyer, AlertType::HoldExpired), 1);

    // A second sweep finds nothing.
    assert_eq!(reconciler.sweep_once().await.total_expired(), 0);
    m.engine.verify_conservation().await.unwrap();
}

#[tokio::test]
async fn e2e_late_buyer_confirmation_expires_the_hold() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;
    let hold = m
        .engine
        .create_hold(&m.as_buyer(), order.id, 10, token("hold"))
        .await
        .unwrap();

    m.clock.advance(chrono::Duration::minutes(61));
    let err = m
        .engine
        .buyer_confirm_hold(&m.as_buyer(), hold.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::HoldExpired(_)));
    assert_eq!(m.engine.hold(hold.id).await.unwrap().status, HoldStatus::Expired);
    assert_eq!(m.pending(m.buyer).await, dec(0));
    assert_eq!(m.engine.order(order.id).await.unwrap().remaining_shares, 100);
}

#[tokio::test]
async fn e2e_confirmation_rules() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;
    let hold = m
        .engine
        .create_hold(&m.as_buyer(), order.id, 10, token("hold"))
        .await
        .unwrap();

    let err = m
        .engine
        .seller_confirm_hold(&m.as_seller(), hold.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::BuyerNotConfirmed(_)));

    let err = m
        .engine
        .buyer_confirm_hold(&m.as_seller(), hold.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::Forbidden { .. }));

    m.engine
        .buyer_confirm_hold(&m.as_buyer(), hold.id)
        .await
        .unwrap();
    let err = m
        .engine
        .buyer_confirm_hold(&m.as_buyer(), hold.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::HoldAlreadyConfirmed(_)));

    // Once the buyer confirmed, withdrawal is no longer possible.
    let err = m.engine.cancel_hold(&m.as_buyer(), hold.id).await.unwrap_err();
    assert!(matches!(
        err,
        FracshareError::HoldNotActive { status: HoldStatus::BuyerConfirmed, .. }
    ));
    assert_eq!(m.sink.count(m.seller, AlertType::HoldAwaitingSeller), 1);
}

#[tokio::test]
async fn e2e_replayed_hold_token_returns_same_hold() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;

    let first = m
        .engine
        .create_hold(&m.as_buyer(), order.id, 10, token("h"))
        .await
        .unwrap();
    let again = m
        .engine
        .create_hold(&m.as_buyer(), order.id, 10, token("h"))
        .await
        .unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(m.pending(m.buyer).await, dec(500));

    let err = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 10, token("h"))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::InvalidToken { .. }));
}

#[tokio::test]
async fn e2e_reservation_approved_settles_trade() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;
    let reservation = m.reserve(order.id, 10).await;

    assert_eq!(reservation.amount, dec(500));
    let hold = m.engine.hold(reservation.hold_id).await.unwrap();
    assert_eq!(hold.status, HoldStatus::BothConfirmed);
    assert_eq!(hold.reservation_id, Some(reservation.id));
    let o = m.engine.order(order.id).await.unwrap();
    assert_eq!((o.remaining_shares, o.held_shares, o.reserved_shares), (90, 0, 10));

    let err = m
        .engine
        .admin_settle_reservation(&m.as_buyer(), reservation.id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::Forbidden { .. }));

    m.engine
        .admin_settle_reservation(&m.admin, reservation.id, true)
        .await
        .unwrap();

    assert_eq!(
        m.engine.reservation(reservation.id).await.unwrap().status,
        ReservationStatus::Settled
    );
    assert_eq!(m.available(m.buyer).await, dec(9_500));
    assert_eq!(m.pending(m.buyer).await, dec(0));
    assert_eq!(m.available(m.seller).await, dec(500));
    assert_eq!(m.shares_of(m.buyer).await, 10);
    assert_eq!(m.shares_of(m.seller).await, 90);
    let o = m.engine.order(order.id).await.unwrap();
    assert_eq!((o.remaining_shares, o.reserved_shares, o.filled_shares()), (90, 0, 10));

    let err = m
        .engine
        .admin_settle_reservation(&m.admin, reservation.id, true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FracshareError::ReservationNotActive { status: ReservationStatus::Settled, .. }
    ));
    assert_eq!(m.sink.count(m.buyer, AlertType::ReservationSettled), 1);
    m.engine.verify_conservation().await.unwrap();
}

#[tokio::test]
async fn e2e_reservation_rejected_relists_shares() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;
    let reservation = m.reserve(order.id, 30).await;

    m.engine
        .admin_settle_reservation(&m.admin, reservation.id, false)
        .await
        .unwrap();

    assert_eq!(
        m.engine.reservation(reservation.id).await.unwrap().status,
        ReservationStatus::Cancelled
    );
    assert_eq!(m.available(m.buyer).await, dec(10_000));
    assert_eq!(m.pending(m.buyer).await, dec(0));
    assert_eq!(m.shares_of(m.seller).await, 100);
    let o = m.engine.order(order.id).await.unwrap();
    assert_eq!((o.remaining_shares, o.reserved_shares), (100, 0));
    assert_eq!(m.sink.count(m.seller, AlertType::ReservationCancelled), 1);
    m.engine.verify_conservation().await.unwrap();
}

#[tokio::test]
async fn e2e_cancel_blocked_while_reservation_pending() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;
    let reservation = m.reserve(order.id, 10).await;

    let err = m
        .engine
        .cancel_order(&m.as_seller(), order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::HasConfirmedHolds(_)));

    m.engine
        .admin_settle_reservation(&m.admin, reservation.id, true)
        .await
        .unwrap();
    m.engine.cancel_order(&m.as_seller(), order.id).await.unwrap();
    assert_eq!(m.engine.order(order.id).await.unwrap().status, OrderStatus::Cancelled);
    m.engine.verify_conservation().await.unwrap();
}

#[tokio::test]
async fn e2e_open_hold_on_cancelled_order_releases_its_slice() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;
    let hold = m
        .engine
        .create_hold(&m.as_buyer(), order.id, 30, token("h"))
        .await
        .unwrap();

    m.engine.cancel_order(&m.as_seller(), order.id).await.unwrap();
    // 70 unsold shares are free; the held 30 stay parked.
    let err = m
        .engine
        .create_order(&m.as_seller(), m.property, 71, dec(50))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::InsufficientFreeShares { free: 70, .. }));

    m.engine.cancel_hold(&m.as_buyer(), hold.id).await.unwrap();
    let o = m.engine.order(order.id).await.unwrap();
    assert_eq!(o.status, OrderStatus::Cancelled);
    assert_eq!((o.remaining_shares, o.held_shares), (0, 0));
    assert_eq!(m.pending(m.buyer).await, dec(0));

    m.list(100, 50).await;
    m.engine.verify_conservation().await.unwrap();
}

#[tokio::test]
async fn e2e_reconciler_expires_reservations_and_orders() {
    let m = Market::new().await;
    let order = m.list(60, 50).await;
    let reservation = m.reserve(order.id, 10).await;
    let reconciler = ExpiryReconciler::new(m.engine.clone());

    m.clock.advance(chrono::Duration::hours(49));
    let report = reconciler.sweep_once().await;
    assert_eq!(report.reservations_expired, 1);
    assert_eq!(report.orders_expired, 0);
    assert_eq!(
        m.engine.reservation(reservation.id).await.unwrap().status,
        ReservationStatus::Expired
    );
    assert_eq!(m.pending(m.buyer).await, dec(0));
    assert_eq!(m.engine.order(order.id).await.unwrap().remaining_shares, 60);

    // A late admin decision is refused.
    let err = m
        .engine
        .admin_settle_reservation(&m.admin, reservation.id, true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FracshareError::ReservationNotActive { status: ReservationStatus::Expired, .. }
    ));

    m.clock.advance(chrono::Duration::days(30));
    let report = reconciler.sweep_once().await;
    assert_eq!(report.orders_expired, 1);
    assert_eq!(m.engine.order(order.id).await.unwrap().status, OrderStatus::Expired);
    m.engine.verify_conservation().await.unwrap();
}

#[tokio::test]
async fn e2e_audit_chain_covers_every_step() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;
    m.engine
        .instant_match(&m.as_buyer(), order.id, 5, token("a"))
        .await
        .unwrap();
    let reservation = m.reserve(order.id, 5).await;
    m.engine
        .admin_settle_reservation(&m.admin, reservation.id, true)
        .await
        .unwrap();

    m.engine.store().audit.verify_chain().await.unwrap();
    let kinds: Vec<OrderEventKind> = m
        .engine
        .store()
        .audit
        .events_for_order(order.id)
        .await
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            OrderEventKind::OrderCreated,
            OrderEventKind::InstantMatched,
            OrderEventKind::HoldPlaced,
            OrderEventKind::HoldBuyerConfirmed,
            OrderEventKind::ReservationCreated,
            OrderEventKind::ReservationSettled,
        ]
    );
    let kinds: Vec<TransactionKind> = m
        .engine
        .store()
        .audit
        .transactions_for(m.buyer)
        .await
        .into_iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::Deposit,
            TransactionKind::Purchase,
            TransactionKind::HoldEscrow,
            TransactionKind::ReservationPurchase,
        ]
    );

    let report = m.engine.verify_conservation().await.unwrap();
    assert_eq!(report.audit_records, m.engine.audit_log().await.len());
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["actual_supply"], "10000");
    assert_eq!(json["pending_total"], "0");
}

// =============================================================================
// Token ownership and arithmetic limits
// =============================================================================

impl Market {
    async fn second_buyer(&self) -> UserId {
        let other = UserId::new();
        self.engine.open_wallet(other).await.unwrap();
        self.engine
            .fund_wallet(&self.admin, other, dec(10_000))
            .await
            .unwrap();
        other
    }
}

#[tokio::test]
async fn e2e_token_is_bound_to_its_buyer() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;
    let other = m.second_buyer().await;

    m.engine
        .instant_match(&m.as_buyer(), order.id, 5, token("shared"))
        .await
        .unwrap();
    let err = m
        .engine
        .instant_match(&Actor::user(other), order.id, 20, token("shared"))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::InvalidToken { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(m.shares_of(other).await, 0);
    assert_eq!(m.available(other).await, dec(10_000));
    assert_eq!(m.engine.order(order.id).await.unwrap().remaining_shares, 95);

    // A fresh token trades normally.
    let trade = m
        .engine
        .instant_match(&Actor::user(other), order.id, 20, token("own"))
        .await
        .unwrap();
    assert_eq!(trade.buyer, other);
    m.engine.verify_conservation().await.unwrap();
}

#[tokio::test]
async fn e2e_token_replay_requires_same_quantity() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;

    m.engine
        .instant_match(&m.as_buyer(), order.id, 5, token("qty"))
        .await
        .unwrap();
    let err = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 6, token("qty"))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::InvalidToken { .. }));
    assert_eq!(m.shares_of(m.buyer).await, 5);
}

#[tokio::test]
async fn e2e_hold_token_is_bound_to_its_buyer_and_quantity() {
    let m = Market::new().await;
    let order = m.list(100, 50).await;
    let other = m.second_buyer().await;

    m.engine
        .create_hold(&m.as_buyer(), order.id, 10, token("h"))
        .await
        .unwrap();

    let err = m
        .engine
        .create_hold(&Actor::user(other), order.id, 10, token("h"))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::InvalidToken { .. }));
    assert_eq!(m.pending(other).await, dec(0));

    let err = m
        .engine
        .create_hold(&m.as_buyer(), order.id, 12, token("h"))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::InvalidToken { .. }));
    assert_eq!(m.pending(m.buyer).await, dec(500));
    m.engine.verify_conservation().await.unwrap();
}

#[tokio::test]
async fn e2e_oversized_price_is_rejected_at_listing() {
    let m = Market::new().await;
    let huge: Decimal = "70000000000000000000000000000".parse().unwrap();

    let err = m
        .engine
        .create_order(&m.as_seller(), m.property, 10, huge)
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::InvalidPrice { .. }));

    let cap = Decimal::from(constants::MAX_PRICE_PER_SHARE);
    let order = m
        .engine
        .create_order(&m.as_seller(), m.property, 10, cap)
        .await
        .unwrap();
    let err = m
        .engine
        .instant_match(&m.as_buyer(), order.id, 10, token("rich"))
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::InsufficientFunds { .. }));
    m.engine.verify_conservation().await.unwrap();
}

#[tokio::test]
async fn e2e_overflowing_deposit_is_rejected() {
    let m = Market::new().await;
    let err = m
        .engine
        .fund_wallet(&m.admin, m.buyer, Decimal::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, FracshareError::InvalidAmount { .. }));
    assert_eq!(m.available(m.buyer).await, dec(10_000));
    m.engine.verify_conservation().await.unwrap();
}
