//! Wallet ledger: single-wallet transactions.
//!
//! Each operation locks one wallet row, applies the [`Wallet`] primitive to
//! the staged copy, records a [`LedgerTransaction`] with the resulting
//! deltas and commits. Multi-wallet trades apply the same primitives to
//! guards they lock themselves through [`Store::lock_wallet_pair`].

use std::sync::Arc;

use fracshare_types::{
    Actor, AuditEntry, FracshareError, LedgerTransaction, Result, TransactionKind, UserId, Wallet,
};
use rust_decimal::Decimal;

use crate::clock::Clock;
use crate::store::Store;

pub struct WalletLedger {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
}

impl WalletLedger {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create an empty wallet for `user`.
    ///
    /// # Errors
    /// `WalletAlreadyExists` if the user already has one.
    pub async fn open_wallet(&self, user: UserId) -> Result<Wallet> {
        let wallet = Wallet::new(user, self.clock.now());
        if !self.store.wallets.insert_new(user, wallet.clone()).await {
            return Err(FracshareError::WalletAlreadyExists(user));
        }
        tracing::info!(user = %user, "Wallet opened");
        Ok(wallet)
    }

    /// Committed snapshot of a wallet.
    pub async fn wallet(&self, user: UserId) -> Result<Wallet> {
        self.store
            .wallets
            .get(&user, self.store.lock_timeout())
            .await?
            .ok_or(FracshareError::WalletNotFound(user))
    }

    /// Admin deposit from the external funding process.
    pub async fn fund_wallet(&self, actor: &Actor, user: UserId, amount: Decimal) -> Result<Wallet> {
        actor.require_admin("fund a wallet")?;
        self.credit(user, amount, TransactionKind::Deposit).await
    }

    /// Admin payout to the external funding process.
    pub async fn withdraw_wallet(
        &self,
        actor: &Actor,
        user: UserId,
        amount: Decimal,
    ) -> Result<Wallet> {
        actor.require_admin("withdraw from a wallet")?;
        self.debit(user, amount, TransactionKind::Withdrawal).await
    }

    pub async fn debit(&self, user: UserId, amount: Decimal, kind: TransactionKind) -> Result<Wallet> {
        self.apply(user, kind, |w| w.debit(amount)).await
    }

    pub async fn credit(&self, user: UserId, amount: Decimal, kind: TransactionKind) -> Result<Wallet> {
        self.apply(user, kind, |w| w.credit(amount)).await
    }

    pub async fn move_to_pending(&self, user: UserId, amount: Decimal) -> Result<Wallet> {
        self.apply(user, TransactionKind::HoldEscrow, |w| w.move_to_pending(amount))
            .await
    }

    pub async fn release_pending(&self, user: UserId, amount: Decimal) -> Result<Wallet> {
        self.apply(user, TransactionKind::HoldRelease, |w| w.release_pending(amount))
            .await
    }

    pub async fn consume_pending(&self, user: UserId, amount: Decimal) -> Result<Wallet> {
        self.apply(user, TransactionKind::ReservationPurchase, |w| {
            w.consume_pending(amount)
        })
        .await
    }

    async fn apply(
        &self,
        user: UserId,
        kind: TransactionKind,
        op: impl FnOnce(&mut Wallet) -> Result<()>,
    ) -> Result<Wallet> {
        let now = self.clock.now();
        let mut wallet = self.store.lock_wallet(user).await.inspect_err(|e| {
            if matches!(e, FracshareError::WalletNotFound(_)) {
                tracing::error!(user = %user, kind = %kind, "Wallet missing for ledger operation");
            }
        })?;

        if let Err(e) = op(&mut wallet) {
            tracing::debug!(user = %user, kind = %kind, error = %e, "Wallet operation rejected");
            return Err(e);
        }
        wallet.updated_at = now;

        let tx = transaction(user, kind, wallet.committed(), &wallet, now);
        self.store.audit.append(vec![AuditEntry::Transaction(tx)]).await?;
        let snapshot = wallet.clone();
        wallet.commit();

        tracing::info!(
            user = %user,
            kind = %kind,
            available = %snapshot.available_balance,
            pending = %snapshot.pending_balance,
            "Wallet updated"
        );
        Ok(snapshot)
    }
}

/// Ledger row describing the change from `before` to `after`.
pub fn transaction(
    user: UserId,
    kind: TransactionKind,
    before: &Wallet,
    after: &Wallet,
    at: chrono::DateTime<chrono::Utc>,
) -> LedgerTransaction {
    LedgerTransaction::new(
        user,
        kind,
        after.available_balance - before.available_balance,
        after.pending_balance - before.pending_balance,
        at,
    )
}
