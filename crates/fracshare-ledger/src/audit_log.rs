//! Append-only, hash-chained audit log.
//!
//! Each record is sealed as `SHA-256(prev_hash || seq || json(entry))`, so
//! rewriting or dropping any record breaks every hash after it. A
//! transaction appends its whole batch at once: either every record of the
//! batch is sealed and appended, or none is.
//!
//! The log also keeps the `(order, idempotency token)` index used to answer
//! replayed requests after the in-memory outcome cache has evicted them.

use std::collections::HashMap;

use fracshare_types::{
    AuditEntry, AuditRecord, FracshareError, IdempotencyToken, LedgerTransaction, OrderEvent,
    OrderId, Result, UserId,
};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

const GENESIS_HASH: [u8; 32] = [0u8; 32];

#[derive(Default)]
struct AuditState {
    records: Vec<AuditRecord>,
    token_index: HashMap<(OrderId, IdempotencyToken), u64>,
}

impl AuditState {
    fn head(&self) -> [u8; 32] {
        self.records.last().map_or(GENESIS_HASH, |r| r.hash)
    }
}

pub struct AuditLog {
    state: Mutex<AuditState>,
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AuditState::default()),
        }
    }

    /// Seal and append a batch.
    ///
    /// # Errors
    /// `Serialization` if an entry cannot be encoded; nothing is appended.
    pub async fn append(&self, entries: Vec<AuditEntry>) -> Result<()> {
        let mut state = self.state.lock().await;

        let mut prev = state.head();
        let mut seq = state.records.len() as u64;
        let mut sealed = Vec::with_capacity(entries.len());
        for entry in entries {
            let hash = seal(&prev, seq, &entry)?;
            sealed.push(AuditRecord {
                seq,
                prev_hash: prev,
                hash,
                entry,
            });
            prev = hash;
            seq += 1;
        }

        for record in sealed {
            if let AuditEntry::Order(OrderEvent {
                order_id,
                token: Some(token),
                ..
            }) = &record.entry
            {
                state.token_index.insert((*order_id, token.clone()), record.seq);
            }
            state.records.push(record);
        }
        Ok(())
    }

    /// The event recorded for `(order, token)`, if that request ever committed.
    pub async fn event_for_token(
        &self,
        order_id: OrderId,
        token: &IdempotencyToken,
    ) -> Option<OrderEvent> {
        let state = self.state.lock().await;
        let seq = *state.token_index.get(&(order_id, token.clone()))?;
        match &state.records.get(usize::try_from(seq).ok()?)?.entry {
            AuditEntry::Order(event) => Some(event.clone()),
            AuditEntry::Transaction(_) => None,
        }
    }

    /// Recompute every hash from genesis.
    ///
    /// # Errors
    /// `AuditChainBroken` at the first record whose link or hash is wrong.
    pub async fn verify_chain(&self) -> Result<()> {
        let state = self.state.lock().await;
        let mut prev = GENESIS_HASH;
        for (idx, record) in state.records.iter().enumerate() {
            let expected_seq = idx as u64;
            if record.seq != expected_seq
                || record.prev_hash != prev
                || record.hash != seal(&prev, expected_seq, &record.entry)?
            {
                tracing::error!(seq = expected_seq, "Audit chain broken");
                return Err(FracshareError::AuditChainBroken { seq: expected_seq });
            }
            prev = record.hash;
        }
        Ok(())
    }

    /// Copy of every record, oldest first.
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.state.lock().await.records.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.records.is_empty()
    }

    /// Hex digest of the newest record, or of genesis for an empty log.
    pub async fn head_hex(&self) -> String {
        hex::encode(self.state.lock().await.head())
    }

    pub async fn events_for_order(&self, order_id: OrderId) -> Vec<OrderEvent> {
        self.state
            .lock()
            .await
            .records
            .iter()
            .filter_map(|r| match &r.entry {
                AuditEntry::Order(ev) if ev.order_id == order_id => Some(ev.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn transactions_for(&self, user: UserId) -> Vec<LedgerTransaction> {
        self.state
            .lock()
            .await
            .records
            .iter()
            .filter_map(|r| match &r.entry {
                AuditEntry::Transaction(tx) if tx.user == user => Some(tx.clone()),
                _ => None,
            })
            .collect()
    }

    #[cfg(test)]
    async fn tamper(&self, seq: usize, entry: AuditEntry) {
        self.state.lock().await.records[seq].entry = entry;
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

fn seal(prev: &[u8; 32], seq: u64, entry: &AuditEntry) -> Result<[u8; 32]> {
    let body = serde_json::to_vec(entry)?;
    let mut hasher = Sha256::new();
    hasher.update(prev);
    hasher.update(seq.to_be_bytes());
    hasher.update(&body);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Ok(out)
}
