//! Conservation invariant checker.
//!
//! Invariants that must hold whenever no transaction is in flight:
//! ```text
//! Σ wallets (available + pending)      == Σ deposits − Σ withdrawals
//! Σ wallets pending                    == Σ open holds + Σ active reservations (amount)
//! ∀ (seller, property): Σ parked outstanding ≤ shares owned
//! ∀ order: parked outstanding          == remaining + held + reserved
//! ```
//!
//! Trades only move cash between wallets and shares between holdings, so a
//! broken invariant means a bookkeeping bug. Violations are reported as
//! `ConservationViolation` integrity errors.

use std::collections::HashMap;

use fracshare_ledger::Store;
use fracshare_types::{
    AuditEntry, AuditRecord, FracshareError, OrderId, ReservationStatus, Result, TransactionKind,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cash that entered and left the system through the funding process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplyConservation {
    deposits: Decimal,
    withdrawals: Decimal,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay deposit and withdrawal transactions from the audit trail.
    #[must_use]
    pub fn from_audit(records: &[AuditRecord]) -> Self {
        let mut supply = Self::new();
        for record in records {
            if let AuditEntry::Transaction(tx) = &record.entry {
                match tx.kind {
                    TransactionKind::Deposit => supply.record_deposit(tx.available_delta),
                    TransactionKind::Withdrawal => supply.record_withdrawal(-tx.available_delta),
                    _ => {}
                }
            }
        }
        supply
    }

    pub fn record_deposit(&mut self, amount: Decimal) {
        self.deposits += amount;
    }

    pub fn record_withdrawal(&mut self, amount: Decimal) {
        self.withdrawals += amount;
    }

    /// Deposits − withdrawals.
    #[must_use]
    pub fn expected_supply(&self) -> Decimal {
        self.deposits - self.withdrawals
    }

    /// # Errors
    /// `ConservationViolation` if `actual_supply` differs from the expected supply.
    pub fn verify(&self, actual_supply: Decimal) -> Result<()> {
        let expected = self.expected_supply();
        if actual_supply != expected {
            return Err(FracshareError::ConservationViolation {
                reason: format!(
                    "actual supply {actual_supply} != expected {expected} \
                     (deposits={}, withdrawals={})",
                    self.deposits, self.withdrawals
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservationReport {
    pub expected_supply: Decimal,
    pub actual_supply: Decimal,
    pub pending_total: Decimal,
    pub wallets: usize,
    pub park_accounts: usize,
    pub audit_records: usize,
}

/// Runs every invariant against a quiescent store.
pub struct ConservationChecker;

impl ConservationChecker {
    /// Verify the audit chain and every conservation invariant.
    ///
    /// Rows are read one at a time, so call this only while no transaction
    /// is in flight.
    pub async fn verify(store: &Store) -> Result<ConservationReport> {
        store.audit.verify_chain().await?;
        let report = Self::verify_cash(store).await?;
        Self::verify_no_oversell(store).await?;
        tracing::info!(
            supply = %report.actual_supply,
            pending = %report.pending_total,
            wallets = report.wallets,
            audit_records = report.audit_records,
            "Conservation verified"
        );
        Ok(report)
    }

    /// Supply and escrow invariants.
    pub async fn verify_cash(store: &Store) -> Result<ConservationReport> {
        let timeout = store.lock_timeout();
        let records = store.audit.records().await;
        let supply = SupplyConservation::from_audit(&records);

        let wallets = store.wallets.snapshot(timeout).await?;
        let actual: Decimal = wallets.iter().map(fracshare_types::Wallet::total).sum();
        let pending: Decimal = wallets.iter().map(|w| w.pending_balance).sum();
        supply.verify(actual).inspect_err(|e| {
            tracing::error!(error = %e, "Cash supply not conserved");
        })?;

        let escrowed_holds: Decimal = store
            .holds
            .snapshot(timeout)
            .await?
            .iter()
            .filter(|h| h.status.is_open())
            .map(|h| h.amount)
            .sum();
        let escrowed_reservations: Decimal = store
            .reservations
            .snapshot(timeout)
            .await?
            .iter()
            .filter(|r| r.status == ReservationStatus::Active)
            .map(|r| r.amount)
            .sum();
        if pending != escrowed_holds + escrowed_reservations {
            let err = FracshareError::ConservationViolation {
                reason: format!(
                    "pending balances {pending} != open holds {escrowed_holds} + \
                     active reservations {escrowed_reservations}"
                ),
            };
            tracing::error!(error = %err, "Escrow not conserved");
            return Err(err);
        }

        Ok(ConservationReport {
            expected_supply: supply.expected_supply(),
            actual_supply: actual,
            pending_total: pending,
            wallets: wallets.len(),
            park_accounts: store.parks.len().await,
            audit_records: records.len(),
        })
    }

    /// No seller has promised more shares than they own, and every listing's
    /// park slice matches the shares the listing still accounts for.
    pub async fn verify_no_oversell(store: &Store) -> Result<()> {
        let timeout = store.lock_timeout();
        let orders: HashMap<OrderId, u64> = store
            .orders
            .snapshot(timeout)
            .await?
            .into_iter()
            .map(|o| (o.id, o.remaining_shares + o.held_shares + o.reserved_shares))
            .collect();

        for account in store.parks.snapshot(timeout).await? {
            let owned = store
                .holding(account.seller, account.property)
                .await?
                .map_or(0, |h| h.shares_owned);
            let outstanding = account.outstanding();
            if outstanding > owned {
                let err = FracshareError::ConservationViolation {
                    reason: format!(
                        "{} has {outstanding} shares of {} listed but owns {owned}",
                        account.seller, account.property
                    ),
                };
                tracing::error!(error = %err, "Oversell detected");
                return Err(err);
            }
            for (order_id, park) in &account.parks {
                let committed = orders.get(order_id).copied().unwrap_or(0);
                if park.outstanding() != committed {
                    let err = FracshareError::ConservationViolation {
                        reason: format!(
                            "park for {order_id} holds {} shares, order accounts for {committed}",
                            park.outstanding()
                        ),
                    };
                    tracing::error!(error = %err, "Park out of sync with order");
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}
