//! Share park — logical reservation of a seller's shares per listing.
//!
//! A seller may list the same property several times. Each listing parks
//! its shares; the free shares available for a new listing are
//!
//! ```text
//! free = shares_owned − Σ(shares_parked − shares_released) over active parks
//! ```
//!
//! All parks of one (seller, property) pair live in a single
//! [`ParkAccount`] row so that computing free shares and parking new ones
//! happen under one lock.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FracshareError, OrderId, PropertyId, Result, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParkStatus {
    Active,
    Released,
}

impl std::fmt::Display for ParkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Released => write!(f, "RELEASED"),
        }
    }
}

/// Shares parked for one listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Park {
    pub order_id: OrderId,
    pub seller: UserId,
    pub property: PropertyId,
    pub shares_parked: u64,
    pub shares_released: u64,
    pub status: ParkStatus,
    pub updated_at: DateTime<Utc>,
}

impl Park {
    /// Shares still promised by this park.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.shares_parked - self.shares_released
    }
}

/// Every park a seller holds against one property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParkAccount {
    pub seller: UserId,
    pub property: PropertyId,
    pub parks: BTreeMap<OrderId, Park>,
}

impl ParkAccount {
    #[must_use]
    pub fn new(seller: UserId, property: PropertyId) -> Self {
        Self {
            seller,
            property,
            parks: BTreeMap::new(),
        }
    }

    /// Σ outstanding shares over active parks.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.parks
            .values()
            .filter(|p| p.status == ParkStatus::Active)
            .map(Park::outstanding)
            .sum()
    }

    /// Shares of `owned` not promised to any listing.
    #[must_use]
    pub fn free_shares(&self, owned: u64) -> u64 {
        owned.saturating_sub(self.outstanding())
    }

    /// Park `shares` for a new listing.
    ///
    /// # Errors
    /// `InsufficientFreeShares` if fewer than `shares` are free.
    pub fn park(
        &mut self,
        order_id: OrderId,
        owned: u64,
        shares: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let free = self.free_shares(owned);
        if free < shares {
            return Err(FracshareError::InsufficientFreeShares {
                requested: shares,
                free,
            });
        }
        self.parks.insert(
            order_id,
            Park {
                order_id,
                seller: self.seller,
                property: self.property,
                shares_parked: shares,
                shares_released: 0,
                status: ParkStatus::Active,
                updated_at: now,
            },
        );
        Ok(())
    }

    /// Release part of a listing's park. The park turns `Released` once
    /// nothing is outstanding.
    ///
    /// # Errors
    /// `DataIntegrity` if the park is missing or would be over-released.
    pub fn release(&mut self, order_id: OrderId, shares: u64, now: DateTime<Utc>) -> Result<()> {
        if shares == 0 {
            return Ok(());
        }
        let park = self
            .parks
            .get_mut(&order_id)
            .ok_or_else(|| FracshareError::DataIntegrity {
                reason: format!("no park for order {order_id}"),
            })?;
        if park.status != ParkStatus::Active || park.outstanding() < shares {
            return Err(FracshareError::DataIntegrity {
                reason: format!(
                    "park for {order_id} has {} outstanding ({}), cannot release {shares}",
                    park.outstanding(),
                    park.status
                ),
            });
        }
        park.shares_released += shares;
        park.updated_at = now;
        if park.outstanding() == 0 {
            park.status = ParkStatus::Released;
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, order_id: &OrderId) -> Option<&Park> {
        self.parks.get(order_id)
    }
}
