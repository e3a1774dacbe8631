//! Replay guard for financial requests.
//!
//! A request carrying `(order, token)` that already committed must return
//! its original outcome instead of executing twice. The guard keeps the
//! most recent outcomes in a bounded FIFO cache so memory stays predictable
//! in long-running nodes; older tokens are answered from the audit log's
//! token index.

use std::collections::{HashMap, VecDeque};

use fracshare_types::{HoldId, IdempotencyToken, OrderId, TradeResult};

pub type RequestKey = (OrderId, IdempotencyToken);

/// What a committed request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Trade(TradeResult),
    Hold(HoldId),
}

pub struct IdempotencyGuard {
    outcomes: HashMap<RequestKey, Outcome>,
    /// Insertion order for eviction (front = oldest).
    order: VecDeque<RequestKey>,
    max_size: usize,
}

impl IdempotencyGuard {
    /// A `max_size` of zero is treated as one.
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            outcomes: HashMap::with_capacity(max_size.min(1024)),
            order: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    /// Remember the outcome of a committed request. The first outcome for a
    /// key wins; returns `false` if one was already cached.
    pub fn record(&mut self, key: RequestKey, outcome: Outcome) -> bool {
        if self.outcomes.contains_key(&key) {
            return false;
        }
        if self.outcomes.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.outcomes.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.outcomes.insert(key, outcome);
        true
    }

    pub fn lookup(&self, key: &RequestKey) -> Option<&Outcome> {
        self.outcomes.get(key)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
