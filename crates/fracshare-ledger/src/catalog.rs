//! Read-only view of the property catalog.
//!
//! The catalog itself is owned by another service; the engine only needs to
//! know whether a property exists, its title for alerts, and whether its
//! shares may currently change hands.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use fracshare_types::{FracshareError, PropertyId, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyListing {
    pub property: PropertyId,
    pub title: String,
    /// Secondary trading switch. Existing listings stay visible but cannot
    /// be traded while this is off.
    pub shares_sellable: bool,
}

pub trait PropertyCatalog: Send + Sync {
    fn listing(&self, property: PropertyId) -> Option<PropertyListing>;

    /// The listing, if its shares may change hands right now.
    ///
    /// # Errors
    /// `TradingDisabled` for unknown properties and for properties whose
    /// secondary trading is switched off.
    fn ensure_tradable(&self, property: PropertyId) -> Result<PropertyListing> {
        match self.listing(property) {
            Some(listing) if listing.shares_sellable => Ok(listing),
            _ => Err(FracshareError::TradingDisabled(property)),
        }
    }

    /// Display title for alerts; falls back to the id.
    fn title(&self, property: PropertyId) -> String {
        self.listing(property)
            .map_or_else(|| property.to_string(), |l| l.title)
    }
}

/// Catalog kept in memory. Used by the node binary and by tests.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    listings: RwLock<HashMap<PropertyId, PropertyListing>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, listing: PropertyListing) {
        self.listings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(listing.property, listing);
    }

    /// Register a sellable property and return its id.
    pub fn add(&self, title: impl Into<String>) -> PropertyId {
        let property = PropertyId::new();
        self.upsert(PropertyListing {
            property,
            title: title.into(),
            shares_sellable: true,
        });
        property
    }

    /// Returns `false` if the property is unknown.
    pub fn set_sellable(&self, property: PropertyId, sellable: bool) -> bool {
        match self
            .listings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&property)
        {
            Some(listing) => {
                listing.shares_sellable = sellable;
                true
            }
            None => false,
        }
    }
}

impl PropertyCatalog for InMemoryCatalog {
    fn listing(&self, property: PropertyId) -> Option<PropertyListing> {
        self.listings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&property)
            .cloned()
    }
}
