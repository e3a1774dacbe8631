//! Rows touched when shares change hands, locked and mutated together.
//!
//! Both settlement protocols finish the same way: cash moves between the
//! two wallets, shares move between the two holdings, and the sold slice
//! leaves the seller's park. [`TradeRows`] locks those rows in the global
//! order (park → wallets → holdings) after the caller has locked the order.

use chrono::{DateTime, Utc};
use fracshare_ledger::wallet_ledger::transaction;
use fracshare_ledger::{RowGuard, Store};
use fracshare_types::{
    AuditEntry, FracshareError, Holding, OrderId, ParkAccount, PropertyId, Result,
    TransactionKind, UserId, Wallet,
};
use rust_decimal::Decimal;

pub(crate) struct TradeRows {
    pub park: RowGuard<ParkAccount>,
    pub buyer_wallet: RowGuard<Wallet>,
    pub seller_wallet: RowGuard<Wallet>,
    pub buyer_holding: RowGuard<Option<Holding>>,
    pub seller_holding: RowGuard<Option<Holding>>,
}

impl TradeRows {
    pub async fn lock(
        store: &Store,
        buyer: UserId,
        seller: UserId,
        property: PropertyId,
    ) -> Result<Self> {
        let park = store.lock_park(seller, property).await?;
        let (buyer_wallet, seller_wallet) = store.lock_wallet_pair(buyer, seller).await?;
        let (buyer_holding, seller_holding) = store
            .lock_holding_pair((buyer, property), (seller, property))
            .await?;
        Ok(Self {
            park,
            buyer_wallet,
            seller_wallet,
            buyer_holding,
            seller_holding,
        })
    }

    /// Move `shares` bought for `amount` from the seller's holding to the
    /// buyer's, carrying cost basis into both wallets' invested totals.
    ///
    /// # Errors
    /// `DataIntegrity` if the seller holds fewer shares than the trade needs.
    pub fn transfer_shares(
        &mut self,
        property: PropertyId,
        shares: u64,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let seller = self.seller_wallet.owner;
        let buyer = self.buyer_wallet.owner;

        let holding = self
            .seller_holding
            .as_mut()
            .ok_or_else(|| FracshareError::DataIntegrity {
                reason: format!("seller {seller} holds no shares of {property}, trade needs {shares}"),
            })?;
        let cost_basis = holding.dispose(shares, now)?;
        if holding.is_empty() {
            *self.seller_holding = None;
        }

        match self.buyer_holding.as_mut() {
            Some(holding) => holding.acquire(shares, amount, now),
            None => *self.buyer_holding = Some(Holding::open(buyer, property, shares, amount, now)),
        }

        self.buyer_wallet.total_invested += amount;
        self.seller_wallet.total_invested -= cost_basis;
        self.buyer_wallet.updated_at = now;
        self.seller_wallet.updated_at = now;
        Ok(())
    }

    /// Ledger rows for both wallets' staged changes.
    pub fn transactions(
        &self,
        buyer_kind: TransactionKind,
        seller_kind: TransactionKind,
        order_id: OrderId,
        property: PropertyId,
        shares: u64,
        now: DateTime<Utc>,
    ) -> [AuditEntry; 2] {
        let leg = |wallet: &RowGuard<Wallet>, kind| {
            AuditEntry::Transaction(
                transaction(wallet.owner, kind, wallet.committed(), wallet, now)
                    .for_trade(order_id, property, shares),
            )
        };
        [
            leg(&self.buyer_wallet, buyer_kind),
            leg(&self.seller_wallet, seller_kind),
        ]
    }

    pub fn commit(self) {
        self.seller_holding.commit();
        self.buyer_holding.commit();
        self.seller_wallet.commit();
        self.buyer_wallet.commit();
        self.park.commit();
    }
}
